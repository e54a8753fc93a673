//! Search index document schema.
//!
//! One document per description. Fixed fields cover the description and
//! its concept's activity; dynamic fields are registered per relationship
//! type and per installed language refset at schema build time — the index
//! is always created after ingestion, so the field set is known.
//!
//! Dynamic field naming:
//!
//! | Field | Content |
//! |---|---|
//! | `<typeId>` | transitive parents of the concept by relationship type |
//! | `d<typeId>` | direct parents by relationship type |
//! | `c<typeId>` | count of direct parents of this type |
//! | `v<typeId>` | numeric concrete value for the attribute |
//! | `w<typeId>` | string/boolean concrete value for the attribute |
//! | `<refsetId>` | stored preferred synonym in that language refset |

use std::collections::BTreeSet;

use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED,
    STRING,
};
use tantivy::tokenizer::{AsciiFoldingFilter, LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::Index;

use snomed_types::SctId;

/// Name of the registered folding analyzer used by [`fields::NTERM`].
pub const FOLDING_TOKENIZER: &str = "folding";

/// Fixed field names.
pub mod fields {
    /// Raw description term (stored only).
    pub const TERM: &str = "term";
    /// Folded tokens for matching (indexed, not stored).
    pub const NTERM: &str = "nterm";
    /// `1/sqrt(term length)` score boost (fast).
    pub const LENGTH_BOOST: &str = "length_boost";
    /// Description id (stored).
    pub const ID: &str = "id";
    /// Description id (indexed point).
    pub const DESCRIPTION_ID: &str = "description_id";
    /// Concept id (stored + indexed + fast).
    pub const CONCEPT_ID: &str = "concept_id";
    /// Description module id.
    pub const MODULE_ID: &str = "module_id";
    /// Description type id (FSN / synonym / definition).
    pub const TYPE_ID: &str = "type_id";
    /// `"true"`/`"false"` concept activity.
    pub const CONCEPT_ACTIVE: &str = "concept_active";
    /// `"true"`/`"false"` description activity.
    pub const DESCRIPTION_ACTIVE: &str = "description_active";
    /// Language refsets in which this description is preferred.
    pub const PREFERRED_IN: &str = "preferred_in";
    /// Language refsets in which this description is acceptable.
    pub const ACCEPTABLE_IN: &str = "acceptable_in";
    /// Refsets the concept is a member of.
    pub const CONCEPT_REFSETS: &str = "concept_refsets";
    /// Refsets the description is a member of.
    pub const DESCRIPTION_REFSETS: &str = "description_refsets";
}

/// Field name carrying the transitive parents for a relationship type.
pub fn transitive_field(type_id: SctId) -> String {
    type_id.to_string()
}

/// Field name carrying the direct parents for a relationship type.
pub fn direct_field(type_id: SctId) -> String {
    format!("d{type_id}")
}

/// Field name carrying the direct-parent count for a relationship type.
pub fn count_field(type_id: SctId) -> String {
    format!("c{type_id}")
}

/// Field name carrying numeric concrete values for a relationship type.
pub fn numeric_value_field(type_id: SctId) -> String {
    format!("v{type_id}")
}

/// Field name carrying string concrete values for a relationship type.
pub fn string_value_field(type_id: SctId) -> String {
    format!("w{type_id}")
}

/// Field name storing the preferred synonym for a language refset.
pub fn preferred_term_field(refset_id: SctId) -> String {
    refset_id.to_string()
}

/// Builds the document schema for the given relationship types and
/// installed language refsets.
pub fn build_schema(
    relationship_types: &BTreeSet<SctId>,
    language_refsets: &BTreeSet<SctId>,
) -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::TERM, STORED);

    let nterm_options = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(FOLDING_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    builder.add_text_field(fields::NTERM, nterm_options);

    builder.add_f64_field(fields::LENGTH_BOOST, FAST);
    builder.add_u64_field(fields::ID, STORED);
    builder.add_u64_field(fields::DESCRIPTION_ID, INDEXED);
    builder.add_u64_field(fields::CONCEPT_ID, STORED | INDEXED | FAST);
    builder.add_u64_field(fields::MODULE_ID, INDEXED);
    builder.add_u64_field(fields::TYPE_ID, INDEXED);
    builder.add_text_field(fields::CONCEPT_ACTIVE, STRING);
    builder.add_text_field(fields::DESCRIPTION_ACTIVE, STRING);
    builder.add_u64_field(fields::PREFERRED_IN, INDEXED);
    builder.add_u64_field(fields::ACCEPTABLE_IN, INDEXED);
    builder.add_u64_field(fields::CONCEPT_REFSETS, INDEXED);
    builder.add_u64_field(fields::DESCRIPTION_REFSETS, INDEXED);

    for type_id in relationship_types {
        builder.add_u64_field(&transitive_field(*type_id), INDEXED);
        builder.add_u64_field(&direct_field(*type_id), INDEXED);
        builder.add_u64_field(&count_field(*type_id), INDEXED);
        builder.add_f64_field(&numeric_value_field(*type_id), INDEXED);
        builder.add_text_field(&string_value_field(*type_id), STRING);
    }

    for refset_id in language_refsets {
        builder.add_text_field(&preferred_term_field(*refset_id), STORED);
    }

    builder.build()
}

/// Registers the folding analyzer on an index: simple tokenization, long
/// token cut, lowercasing and diacritic folding.
pub fn register_tokenizers(index: &Index) {
    let folding = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(AsciiFoldingFilter)
        .build();
    index.tokenizers().register(FOLDING_TOKENIZER, folding);
}

/// `1/sqrt(len)` — penalizes overlong terms when ranking.
pub fn length_boost(term: &str) -> f64 {
    let len = term.chars().count().max(1);
    1.0 / (len as f64).sqrt()
}

/// Resolved handles for the fixed fields.
#[derive(Clone, Copy)]
pub struct FixedFields {
    /// See [`fields::TERM`].
    pub term: Field,
    /// See [`fields::NTERM`].
    pub nterm: Field,
    /// See [`fields::LENGTH_BOOST`].
    pub length_boost: Field,
    /// See [`fields::ID`].
    pub id: Field,
    /// See [`fields::DESCRIPTION_ID`].
    pub description_id: Field,
    /// See [`fields::CONCEPT_ID`].
    pub concept_id: Field,
    /// See [`fields::MODULE_ID`].
    pub module_id: Field,
    /// See [`fields::TYPE_ID`].
    pub type_id: Field,
    /// See [`fields::CONCEPT_ACTIVE`].
    pub concept_active: Field,
    /// See [`fields::DESCRIPTION_ACTIVE`].
    pub description_active: Field,
    /// See [`fields::PREFERRED_IN`].
    pub preferred_in: Field,
    /// See [`fields::ACCEPTABLE_IN`].
    pub acceptable_in: Field,
    /// See [`fields::CONCEPT_REFSETS`].
    pub concept_refsets: Field,
    /// See [`fields::DESCRIPTION_REFSETS`].
    pub description_refsets: Field,
}

impl FixedFields {
    /// Resolves the fixed fields against a schema.
    pub fn resolve(schema: &Schema) -> tantivy::Result<Self> {
        Ok(FixedFields {
            term: schema.get_field(fields::TERM)?,
            nterm: schema.get_field(fields::NTERM)?,
            length_boost: schema.get_field(fields::LENGTH_BOOST)?,
            id: schema.get_field(fields::ID)?,
            description_id: schema.get_field(fields::DESCRIPTION_ID)?,
            concept_id: schema.get_field(fields::CONCEPT_ID)?,
            module_id: schema.get_field(fields::MODULE_ID)?,
            type_id: schema.get_field(fields::TYPE_ID)?,
            concept_active: schema.get_field(fields::CONCEPT_ACTIVE)?,
            description_active: schema.get_field(fields::DESCRIPTION_ACTIVE)?,
            preferred_in: schema.get_field(fields::PREFERRED_IN)?,
            acceptable_in: schema.get_field(fields::ACCEPTABLE_IN)?,
            concept_refsets: schema.get_field(fields::CONCEPT_REFSETS)?,
            description_refsets: schema.get_field(fields::DESCRIPTION_REFSETS)?,
        })
    }
}
