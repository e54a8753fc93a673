//! # snomed-rf2
//!
//! Ingestion of SNOMED CT RF2 release files: file name classification, row
//! parsing, reference set reification and a batched parallel import
//! pipeline writing into a [`snomed_store::Store`].
//!
//! ## Usage
//!
//! ```ignore
//! use snomed_rf2::import_rf2;
//! use snomed_store::Store;
//!
//! let store = Store::open("/var/lib/snomed/store.db")?;
//! let summary = import_rf2(&store, "/data/SnomedCT_InternationalRF2")?;
//! println!(
//!     "{} rows from {} files ({} parse errors)",
//!     summary.rows, summary.files, summary.parse_errors
//! );
//!
//! // Derived artifacts are rebuilt in a second phase.
//! store.build_closure()?;
//! ```
//!
//! Import is lenient: rows that fail to parse are dropped and counted,
//! identifiers with bad check digits are admitted with a warning, and the
//! whole pipeline is idempotent thanks to the store's max-effective-time
//! merge.

#![warn(missing_docs)]

mod error;
mod filename;
mod import;
mod reify;
mod row;

pub use error::{Rf2Error, Rf2Result};
pub use filename::{parse_filename, ComponentFile, ReleaseType, Rf2Filename};
pub use import::{import_rf2, ImportSummary};
pub use reify::{kind_for_prefix, reify};
pub use row::{
    parse_concept, parse_concrete_relationship, parse_description, parse_refset_row,
    parse_relationship, unparse_concept, unparse_concrete_relationship, unparse_description,
    unparse_relationship, RefsetRow,
};
