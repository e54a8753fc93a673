//! # snomed-types
//!
//! Core data types for SNOMED CT components as distributed in RF2 release
//! files: concepts, descriptions, relationships, concrete relationships and
//! the family of reference set member shapes.
//!
//! All records carry their identifier, effective time (YYYYMMDD as `u32`),
//! active flag and module, mirroring the RF2 column layout. Derived artifacts
//! (the extended concept view, search documents) are built elsewhere; this
//! crate is the vocabulary shared by the ingestion, store and search crates.
//!
//! ## Example
//!
//! ```
//! use snomed_types::{Concept, well_known};
//!
//! let concept = Concept {
//!     id: 73211009,
//!     effective_time: 20020131,
//!     active: true,
//!     module_id: well_known::CORE_MODULE,
//!     definition_status_id: well_known::PRIMITIVE,
//! };
//!
//! assert!(concept.is_primitive());
//! ```

#![warn(missing_docs)]

mod component;
mod identifier;
mod refset;
pub mod well_known;

pub use component::{
    Concept, ConcreteRelationship, ConcreteValue, Description, Relationship,
};
pub use identifier::{partition_kind, verhoeff_check_digit, verhoeff_valid, ComponentKind};
pub use refset::{Acceptability, RefsetBody, RefsetField, RefsetItem, RefsetKind};

/// SNOMED CT Identifier type (64-bit unsigned integer).
pub type SctId = u64;
