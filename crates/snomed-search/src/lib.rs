//! # snomed-search
//!
//! Full-text and expression-constraint search over a SNOMED CT snapshot.
//!
//! The index holds one document per description, carrying the concept's
//! transitive and direct parents per relationship type, concrete values,
//! refset memberships and per-dialect preferred terms. On top of it sit a
//! query algebra ([`QueryContext`]), an ECL evaluator ([`EclEvaluator`])
//! compiling expression trees into index queries, and a free-text ranker
//! ([`search`]).
//!
//! ## Example
//!
//! ```ignore
//! use snomed_search::{search, EclEvaluator, QueryContext, SearchIndex, SearchRequest};
//!
//! let index = SearchIndex::build(&store, "/var/lib/snomed/search.idx")?;
//! let ctx = QueryContext::new(&index, &store);
//!
//! // ECL: descendants of multiple sclerosis
//! let evaluator = EclEvaluator::new(ctx);
//! let concepts = evaluator.realize(&ast)?;
//!
//! // Autocomplete
//! let hits = search(&ctx, &SearchRequest {
//!     s: Some("mult scl".into()),
//!     max_hits: 10,
//!     ..Default::default()
//! }, &locale_refsets)?;
//! ```

#![warn(missing_docs)]

mod ecl;
mod error;
mod index;
mod query;
mod schema;
mod search;

pub use ecl::{
    AttributeConstraint, AttributeGroup, AttributeValue, Cardinality, ComparisonOperator,
    CompiledQuery, ConcreteComparand, EclEvaluator, EclExpression, Refinement,
};
pub use error::{SearchError, SearchResult};
pub use index::SearchIndex;
pub use query::{BoxQuery, QueryContext};
pub use search::{search, SearchHit, SearchMode, SearchRequest};
