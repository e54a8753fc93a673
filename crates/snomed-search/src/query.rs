//! Query algebra over the description index.
//!
//! Every combinator returns a boxed index query; compound queries are
//! built with the boolean combinators. Combinators that need the concept
//! graph (ancestor-of, top/bottom of set) consult the store's IS-A
//! closure and realize as concept-id set queries.

use std::ops::Bound;

use roaring::RoaringTreemap;
use tantivy::collector::{Collector, SegmentCollector};
use tantivy::columnar::Column;
use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, Occur, Query, RangeQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{DocId, Score, SegmentOrdinal, SegmentReader, Term};

use snomed_store::Store;
use snomed_types::{well_known, SctId};

use crate::ecl::ComparisonOperator;
use crate::error::{SearchError, SearchResult};
use crate::index::SearchIndex;
use crate::schema::{
    count_field, direct_field, fields, numeric_value_field, string_value_field, transitive_field,
};

/// A boxed index query.
pub type BoxQuery = Box<dyn Query>;

/// The substrate the algebra works over: the description index plus the
/// component store for graph-side set computations.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    /// The description index.
    pub index: &'a SearchIndex,
    /// The component store.
    pub store: &'a Store,
}

impl<'a> QueryContext<'a> {
    /// Creates a query context over an index and its store.
    pub fn new(index: &'a SearchIndex, store: &'a Store) -> Self {
        QueryContext { index, store }
    }

    fn term_u64(&self, field: tantivy::schema::Field, value: u64) -> BoxQuery {
        Box::new(TermQuery::new(
            Term::from_field_u64(field, value),
            IndexRecordOption::Basic,
        ))
    }

    /// A term query over a dynamic u64 field; empty when the field was
    /// never registered for this snapshot.
    fn dynamic_term(&self, name: &str, value: u64) -> BoxQuery {
        match self.index.dynamic_field(name) {
            Some(field) => self.term_u64(field, value),
            None => Box::new(EmptyQuery),
        }
    }

    /// Matches every document.
    pub fn q_match_all(&self) -> BoxQuery {
        Box::new(AllQuery)
    }

    /// Matches no document.
    pub fn q_empty(&self) -> BoxQuery {
        Box::new(EmptyQuery)
    }

    /// Documents of the concept itself.
    pub fn q_self(&self, concept_id: SctId) -> BoxQuery {
        self.term_u64(self.index.fixed().concept_id, concept_id)
    }

    /// Documents of any of the given concepts.
    pub fn q_concept_set<I: IntoIterator<Item = SctId>>(&self, concept_ids: I) -> BoxQuery {
        let clauses: Vec<(Occur, BoxQuery)> = concept_ids
            .into_iter()
            .map(|id| (Occur::Should, self.q_self(id)))
            .collect();
        if clauses.is_empty() {
            Box::new(EmptyQuery)
        } else {
            Box::new(BooleanQuery::new(clauses))
        }
    }

    /// Documents of concepts strictly below `concept_id`.
    pub fn q_descendant_of(&self, concept_id: SctId) -> BoxQuery {
        self.dynamic_term(&transitive_field(well_known::IS_A), concept_id)
    }

    /// Documents of `concept_id` and every concept below it.
    pub fn q_descendant_or_self_of(&self, concept_id: SctId) -> BoxQuery {
        self.q_or(vec![self.q_self(concept_id), self.q_descendant_of(concept_id)])
    }

    /// Documents of concepts whose direct IS-A parent is `concept_id`.
    pub fn q_child_of(&self, concept_id: SctId) -> BoxQuery {
        self.dynamic_term(&direct_field(well_known::IS_A), concept_id)
    }

    /// Documents of the direct IS-A parents of `concept_id`.
    pub fn q_parent_of(&self, concept_id: SctId) -> SearchResult<BoxQuery> {
        let parents = self.store.parents_of(concept_id, well_known::IS_A)?;
        Ok(self.q_concept_set(parents))
    }

    /// Documents of concepts strictly above `concept_id`, via the store's
    /// closure.
    pub fn q_ancestor_of(&self, concept_id: SctId) -> SearchResult<BoxQuery> {
        let ancestors = self.store.ancestors_of(concept_id)?;
        Ok(self.q_concept_set(ancestors))
    }

    /// Documents of `concept_id` and every concept above it.
    pub fn q_ancestor_or_self_of(&self, concept_id: SctId) -> SearchResult<BoxQuery> {
        let ancestors = self.store.all_ancestors_of(concept_id)?;
        Ok(self.q_concept_set(ancestors))
    }

    /// Documents of concepts that are members of the given refset.
    pub fn q_member_of(&self, refset_id: SctId) -> BoxQuery {
        self.term_u64(self.index.fixed().concept_refsets, refset_id)
    }

    /// Attribute constraint with value subsumption: the concept has an
    /// attribute of this type whose value is `value` or a descendant.
    pub fn q_attribute_descendant_or_self_of(&self, type_id: SctId, value: SctId) -> BoxQuery {
        self.dynamic_term(&transitive_field(type_id), value)
    }

    /// Attribute constraint with exact value equality.
    pub fn q_attribute_exactly_equal(&self, type_id: SctId, value: SctId) -> BoxQuery {
        self.dynamic_term(&direct_field(type_id), value)
    }

    /// Documents having any attribute of this type.
    pub fn q_attribute_any(&self, type_id: SctId) -> BoxQuery {
        match self.index.dynamic_field(&direct_field(type_id)) {
            Some(field) => Box::new(RangeQuery::new_term_bounds(
                direct_field(type_id),
                Type::U64,
                &Bound::Included(Term::from_field_u64(field, 0)),
                &Bound::Included(Term::from_field_u64(field, u64::MAX)),
            )),
            None => Box::new(EmptyQuery),
        }
    }

    /// Cardinality constraint over the count of direct attributes of a
    /// type. `max = None` means unbounded.
    ///
    /// `[0..*]` matches everything and `[0..0]` matches concepts with no
    /// attribute of the type; `max < min` is a query error.
    pub fn q_attribute_count(
        &self,
        type_id: SctId,
        min: u32,
        max: Option<u32>,
    ) -> SearchResult<BoxQuery> {
        if let Some(max) = max {
            if max < min {
                return Err(SearchError::Query(format!(
                    "invalid cardinality [{min}..{max}]"
                )));
            }
        }
        let field = match self.index.dynamic_field(&count_field(type_id)) {
            Some(field) => field,
            None => {
                // No concept carries this attribute; only [0..n] matches.
                return Ok(if min == 0 {
                    self.q_match_all()
                } else {
                    self.q_empty()
                });
            }
        };
        let range = |lower: u64, upper: Option<u64>| -> BoxQuery {
            let upper = match upper {
                Some(upper) => Bound::Included(Term::from_field_u64(field, upper)),
                None => Bound::Unbounded,
            };
            Box::new(RangeQuery::new_term_bounds(
                count_field(type_id),
                Type::U64,
                &Bound::Included(Term::from_field_u64(field, lower)),
                &upper,
            ))
        };
        Ok(match (min, max) {
            (0, None) => self.q_match_all(),
            (0, Some(0)) => self.q_not(self.q_match_all(), self.q_attribute_any(type_id)),
            // Counts are only indexed when at least one attribute exists,
            // so [0..n] is "not more than n".
            (0, Some(max)) => self.q_not(self.q_match_all(), range(u64::from(max) + 1, None)),
            (min, max) => range(u64::from(min), max.map(u64::from)),
        })
    }

    /// Numeric concrete-value comparison over `v<typeId>`.
    pub fn q_concrete_numeric(
        &self,
        type_id: SctId,
        operator: ComparisonOperator,
        value: f64,
    ) -> BoxQuery {
        let field = match self.index.dynamic_field(&numeric_value_field(type_id)) {
            Some(field) => field,
            None => return Box::new(EmptyQuery),
        };
        let term = |v: f64| Term::from_field_f64(field, v);
        let range = |lower: Bound<Term>, upper: Bound<Term>| -> BoxQuery {
            Box::new(RangeQuery::new_term_bounds(
                numeric_value_field(type_id),
                Type::F64,
                &lower,
                &upper,
            ))
        };
        match operator {
            ComparisonOperator::Equal => {
                range(Bound::Included(term(value)), Bound::Included(term(value)))
            }
            ComparisonOperator::NotEqual => self.q_not(
                range(Bound::Unbounded, Bound::Unbounded),
                range(Bound::Included(term(value)), Bound::Included(term(value))),
            ),
            ComparisonOperator::LessThan => range(Bound::Unbounded, Bound::Excluded(term(value))),
            ComparisonOperator::LessThanOrEqual => {
                range(Bound::Unbounded, Bound::Included(term(value)))
            }
            ComparisonOperator::GreaterThan => {
                range(Bound::Excluded(term(value)), Bound::Unbounded)
            }
            ComparisonOperator::GreaterThanOrEqual => {
                range(Bound::Included(term(value)), Bound::Unbounded)
            }
        }
    }

    /// String or boolean concrete-value equality over `w<typeId>`.
    pub fn q_concrete_string(&self, type_id: SctId, value: &str) -> BoxQuery {
        match self.index.dynamic_field(&string_value_field(type_id)) {
            Some(field) => Box::new(TermQuery::new(
                Term::from_field_text(field, value),
                IndexRecordOption::Basic,
            )),
            None => Box::new(EmptyQuery),
        }
    }

    /// Conjunction.
    pub fn q_and(&self, queries: Vec<BoxQuery>) -> BoxQuery {
        Box::new(BooleanQuery::new(
            queries.into_iter().map(|q| (Occur::Must, q)).collect(),
        ))
    }

    /// Disjunction.
    pub fn q_or(&self, queries: Vec<BoxQuery>) -> BoxQuery {
        Box::new(BooleanQuery::new(
            queries.into_iter().map(|q| (Occur::Should, q)).collect(),
        ))
    }

    /// `include MINUS exclude`.
    pub fn q_not(&self, include: BoxQuery, exclude: BoxQuery) -> BoxQuery {
        Box::new(BooleanQuery::new(vec![
            (Occur::Must, include),
            (Occur::MustNot, exclude),
        ]))
    }

    /// The most general members of a concept set: those with no ancestor
    /// inside the set.
    pub fn top_of_set(&self, set: &RoaringTreemap) -> SearchResult<RoaringTreemap> {
        let mut top = RoaringTreemap::new();
        for concept_id in set {
            let ancestors = self.store.ancestors_of(concept_id)?;
            if !ancestors.iter().any(|a| set.contains(*a)) {
                top.insert(concept_id);
            }
        }
        Ok(top)
    }

    /// The most specific members of a concept set: those that are not an
    /// ancestor of any other member.
    pub fn bottom_of_set(&self, set: &RoaringTreemap) -> SearchResult<RoaringTreemap> {
        let mut ancestors_in_set = RoaringTreemap::new();
        for concept_id in set {
            for ancestor in self.store.ancestors_of(concept_id)? {
                if set.contains(ancestor) {
                    ancestors_in_set.insert(ancestor);
                }
            }
        }
        Ok(set - &ancestors_in_set)
    }

    /// Executes a query and materializes the distinct concept ids of the
    /// matching documents.
    pub fn realize(&self, query: &dyn Query) -> SearchResult<RoaringTreemap> {
        let searcher = self.index.searcher();
        Ok(searcher.search(query, &ConceptIdCollector)?)
    }
}

/// Collects the distinct `concept_id` fast-field values of matching
/// documents into a bitmap.
struct ConceptIdCollector;

struct ConceptIdSegmentCollector {
    column: Column<u64>,
    ids: RoaringTreemap,
}

impl Collector for ConceptIdCollector {
    type Fruit = RoaringTreemap;
    type Child = ConceptIdSegmentCollector;

    fn for_segment(
        &self,
        _segment_ord: SegmentOrdinal,
        segment: &SegmentReader,
    ) -> tantivy::Result<Self::Child> {
        let column = segment.fast_fields().u64(fields::CONCEPT_ID)?;
        Ok(ConceptIdSegmentCollector {
            column,
            ids: RoaringTreemap::new(),
        })
    }

    fn requires_scoring(&self) -> bool {
        false
    }

    fn merge_fruits(&self, fruits: Vec<RoaringTreemap>) -> tantivy::Result<RoaringTreemap> {
        let mut merged = RoaringTreemap::new();
        for fruit in fruits {
            merged |= fruit;
        }
        Ok(merged)
    }
}

impl SegmentCollector for ConceptIdSegmentCollector {
    type Fruit = RoaringTreemap;

    fn collect(&mut self, doc: DocId, _score: Score) {
        if let Some(concept_id) = self.column.first(doc) {
            self.ids.insert(concept_id);
        }
    }

    fn harvest(self) -> RoaringTreemap {
        self.ids
    }
}
