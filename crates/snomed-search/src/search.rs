//! Free-text search over description terms.
//!
//! Two modes: autocomplete (per-token prefix/term/fuzzy groups, all tokens
//! required, scores boosted by `1/sqrt(term length)`) and ranked (token
//! queries OR'd, plain BM25, best match first even when some tokens are
//! absent). An empty strict autocomplete pass retries once with the
//! request's fallback fuzziness.

use std::collections::HashSet;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, PhrasePrefixQuery, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{DocId, Score, SegmentReader, TantivyDocument, Term};
use tracing::debug;

use snomed_types::{well_known, SctId};

use crate::ecl::{EclEvaluator, EclExpression};
use crate::error::{SearchError, SearchResult};
use crate::query::{BoxQuery, QueryContext};
use crate::schema::{fields, preferred_term_field, FOLDING_TOKENIZER};

/// How token queries combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Every token must match; scores are length-boosted.
    #[default]
    Autocomplete,
    /// Tokens are OR'd; plain relevance ranking.
    Ranked,
}

/// A search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The free-text input. `None` searches by filters alone.
    pub s: Option<String>,
    /// ECL constraint the matching concepts must satisfy.
    pub constraint: Option<EclExpression>,
    /// Levenshtein distance for token matching (0 = exact/prefix only).
    pub fuzzy: u8,
    /// Fuzziness for the automatic retry when a strict pass returns
    /// nothing.
    pub fallback_fuzzy: u8,
    /// Maximum hits returned.
    pub max_hits: usize,
    /// Required direct attribute values, `(type, value)` pairs.
    pub properties: Vec<(SctId, SctId)>,
    /// Restrict to concepts that are members of any of these refsets.
    pub concept_refsets: Vec<SctId>,
    /// Include descriptions of inactive concepts.
    pub include_inactive_concepts: bool,
    /// Include inactive descriptions.
    pub include_inactive_descriptions: bool,
    /// Include fully specified names.
    pub include_fsn: bool,
    /// Collapse hits with the same concept and term.
    pub remove_duplicates: bool,
    /// Token combination mode.
    pub mode: SearchMode,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            s: None,
            constraint: None,
            fuzzy: 0,
            fallback_fuzzy: 0,
            max_hits: 200,
            properties: Vec::new(),
            concept_refsets: Vec::new(),
            include_inactive_concepts: false,
            include_inactive_descriptions: false,
            include_fsn: false,
            remove_duplicates: false,
            mode: SearchMode::Autocomplete,
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Description id.
    pub id: SctId,
    /// Concept id.
    pub concept_id: SctId,
    /// The matched description term.
    pub term: String,
    /// The concept's preferred synonym under the caller's locale
    /// priority, when resolvable from the index.
    pub preferred_term: Option<String>,
}

/// Executes a search request. `locale_refsets` is the caller's
/// language-refset priority order for preferred-term resolution.
pub fn search(
    ctx: &QueryContext<'_>,
    request: &SearchRequest,
    locale_refsets: &[SctId],
) -> SearchResult<Vec<SearchHit>> {
    let hits = execute(ctx, request, request.fuzzy, locale_refsets)?;
    if hits.is_empty() && request.fuzzy == 0 && request.fallback_fuzzy > 0 {
        debug!(fallback_fuzzy = request.fallback_fuzzy, "strict search empty, retrying fuzzily");
        return execute(ctx, request, request.fallback_fuzzy, locale_refsets);
    }
    Ok(hits)
}

fn execute(
    ctx: &QueryContext<'_>,
    request: &SearchRequest,
    fuzzy: u8,
    locale_refsets: &[SctId],
) -> SearchResult<Vec<SearchHit>> {
    let query = build_query(ctx, request, fuzzy)?;
    let searcher = ctx.index.searcher();
    let limit = request.max_hits.max(1);

    let ranked: Vec<(Score, tantivy::DocAddress)> = match request.mode {
        SearchMode::Autocomplete => {
            let collector = TopDocs::with_limit(limit).tweak_score(
                move |segment_reader: &SegmentReader| {
                    let boost = segment_reader
                        .fast_fields()
                        .f64(fields::LENGTH_BOOST)
                        .expect("length_boost fast field");
                    move |doc: DocId, score: Score| {
                        score * boost.first(doc).unwrap_or(1.0) as f32
                    }
                },
            );
            searcher.search(&query, &collector)?
        }
        SearchMode::Ranked => searcher.search(&query, &TopDocs::with_limit(limit))?,
    };

    let mut seen: HashSet<(SctId, String)> = HashSet::new();
    let mut hits = Vec::with_capacity(ranked.len());
    for (_score, address) in ranked {
        let doc: TantivyDocument = searcher.doc(address)?;
        let fixed = ctx.index.fixed();
        let id = doc
            .get_first(fixed.id)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SearchError::Query("document missing id".to_string()))?;
        let concept_id = doc
            .get_first(fixed.concept_id)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SearchError::Query("document missing concept id".to_string()))?;
        let term = doc
            .get_first(fixed.term)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if request.remove_duplicates && !seen.insert((concept_id, term.clone())) {
            continue;
        }

        let preferred_term = locale_refsets.iter().find_map(|refset_id| {
            let field = ctx.index.dynamic_field(&preferred_term_field(*refset_id))?;
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        });

        hits.push(SearchHit {
            id,
            concept_id,
            term,
            preferred_term,
        });
    }
    Ok(hits)
}

fn build_query(
    ctx: &QueryContext<'_>,
    request: &SearchRequest,
    fuzzy: u8,
) -> SearchResult<BoxQuery> {
    let mut clauses: Vec<(Occur, BoxQuery)> = Vec::new();

    if let Some(text) = request.s.as_deref() {
        let tokens = tokenize(ctx, text)?;
        if tokens.is_empty() {
            return Ok(ctx.q_empty());
        }
        let token_queries: Vec<BoxQuery> = tokens
            .iter()
            .map(|token| token_query(ctx, token, fuzzy))
            .collect();
        let combined = match request.mode {
            SearchMode::Autocomplete => ctx.q_and(token_queries),
            SearchMode::Ranked => ctx.q_or(token_queries),
        };
        clauses.push((Occur::Must, combined));
    }

    let fixed = ctx.index.fixed();
    if !request.include_inactive_descriptions {
        clauses.push((
            Occur::Must,
            Box::new(TermQuery::new(
                Term::from_field_text(fixed.description_active, "true"),
                IndexRecordOption::Basic,
            )),
        ));
    }
    if !request.include_inactive_concepts {
        clauses.push((
            Occur::Must,
            Box::new(TermQuery::new(
                Term::from_field_text(fixed.concept_active, "true"),
                IndexRecordOption::Basic,
            )),
        ));
    }
    if !request.include_fsn {
        clauses.push((
            Occur::MustNot,
            Box::new(TermQuery::new(
                Term::from_field_u64(fixed.type_id, well_known::FULLY_SPECIFIED_NAME),
                IndexRecordOption::Basic,
            )),
        ));
    }
    if let Some(constraint) = &request.constraint {
        let evaluator = EclEvaluator::new(*ctx);
        let compiled = evaluator.compile(constraint)?;
        clauses.push((Occur::Must, compiled.into_query(ctx)));
    }
    if !request.concept_refsets.is_empty() {
        let members = request
            .concept_refsets
            .iter()
            .map(|refset_id| ctx.q_member_of(*refset_id))
            .collect();
        clauses.push((Occur::Must, ctx.q_or(members)));
    }
    for (type_id, value) in &request.properties {
        clauses.push((Occur::Must, ctx.q_attribute_exactly_equal(*type_id, *value)));
    }

    Ok(Box::new(BooleanQuery::new(clauses)))
}

/// Per-token query: prefix OR exact OR (optionally) fuzzy, at least one
/// required.
fn token_query(ctx: &QueryContext<'_>, token: &str, fuzzy: u8) -> BoxQuery {
    let nterm = ctx.index.fixed().nterm;
    let term = Term::from_field_text(nterm, token);
    let mut options: Vec<(Occur, BoxQuery)> = vec![
        (
            Occur::Should,
            Box::new(PhrasePrefixQuery::new(vec![term.clone()])),
        ),
        (
            Occur::Should,
            Box::new(TermQuery::new(term.clone(), IndexRecordOption::Basic)),
        ),
    ];
    if fuzzy > 0 {
        options.push((
            Occur::Should,
            Box::new(FuzzyTermQuery::new(term, fuzzy, true)),
        ));
    }
    Box::new(BooleanQuery::new(options))
}

/// Folds the input through the index analyzer.
fn tokenize(ctx: &QueryContext<'_>, text: &str) -> SearchResult<Vec<String>> {
    let mut analyzer = ctx
        .index
        .index()
        .tokenizers()
        .get(FOLDING_TOKENIZER)
        .ok_or_else(|| SearchError::Query("folding analyzer not registered".to_string()))?;
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    Ok(tokens)
}
