//! # snomed-store
//!
//! Persistent, read-optimized storage for SNOMED CT components over an
//! embedded RocksDB database.
//!
//! The store holds the four component record families (concepts,
//! descriptions, relationships, refset members) plus the derived artifacts
//! the query layer needs: reverse indices realized as ordered keyspaces,
//! the IS-A transitive closure, and locale resolution from BCP-47 priority
//! lists to language reference sets.
//!
//! Writes are idempotent under the max-effective-time rule, so ingestion
//! batches may arrive in any order and partial imports are safe to re-run.
//!
//! ## Example
//!
//! ```ignore
//! use snomed_store::Store;
//!
//! let store = Store::open("/var/lib/snomed/store.db")?;
//! let concept = store.concept(73211009)?.expect("diabetes mellitus");
//! let ancestors = store.ancestors_of(73211009)?;
//! ```

#![warn(missing_docs)]

mod closure;
mod error;
mod extended;
mod keys;
mod locale;
mod store;

pub use closure::ClosureStats;
pub use error::{StoreError, StoreResult};
pub use extended::ExtendedConcept;
pub use locale::LanguageMatcher;
pub use store::{Store, ALL_CFS};

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for store tests.

    use snomed_types::{
        well_known, Concept, Description, RefsetBody, RefsetItem, Relationship, SctId,
    };
    use uuid::Uuid;

    use crate::store::Store;

    pub fn empty_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Store::open(dir.path().join("store.db")).expect("open store");
        (dir, store)
    }

    pub fn concept(id: SctId, effective_time: u32, active: bool) -> Concept {
        Concept {
            id,
            effective_time,
            active,
            module_id: well_known::CORE_MODULE,
            definition_status_id: well_known::PRIMITIVE,
        }
    }

    pub fn is_a(
        id: SctId,
        source_id: SctId,
        destination_id: SctId,
        effective_time: u32,
        active: bool,
    ) -> Relationship {
        relationship(id, source_id, well_known::IS_A, destination_id, effective_time, active)
    }

    pub fn relationship(
        id: SctId,
        source_id: SctId,
        type_id: SctId,
        destination_id: SctId,
        effective_time: u32,
        active: bool,
    ) -> Relationship {
        Relationship {
            id,
            effective_time,
            active,
            module_id: well_known::CORE_MODULE,
            source_id,
            destination_id,
            relationship_group: 0,
            type_id,
            characteristic_type_id: well_known::INFERRED_RELATIONSHIP,
            modifier_id: well_known::EXISTENTIAL_MODIFIER,
        }
    }

    pub fn synonym(id: SctId, concept_id: SctId, term: &str) -> Description {
        description(id, concept_id, well_known::SYNONYM, term)
    }

    pub fn fsn(id: SctId, concept_id: SctId, term: &str) -> Description {
        description(id, concept_id, well_known::FULLY_SPECIFIED_NAME, term)
    }

    pub fn description(id: SctId, concept_id: SctId, type_id: SctId, term: &str) -> Description {
        Description {
            id,
            effective_time: 20020131,
            active: true,
            module_id: well_known::CORE_MODULE,
            concept_id,
            language_code: "en".to_string(),
            type_id,
            term: term.to_string(),
            case_significance_id: well_known::INITIAL_CHARACTER_CASE_INSENSITIVE,
        }
    }

    pub fn language_member(
        seq: u128,
        description_id: SctId,
        refset_id: SctId,
        acceptability_id: SctId,
    ) -> RefsetItem {
        RefsetItem {
            id: Uuid::from_u128(seq),
            effective_time: 20200101,
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id,
            referenced_component_id: description_id,
            body: RefsetBody::Language { acceptability_id },
        }
    }

    pub fn simple_member(seq: u128, concept_id: SctId, refset_id: SctId) -> RefsetItem {
        RefsetItem {
            id: Uuid::from_u128(seq),
            effective_time: 20200101,
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id,
            referenced_component_id: concept_id,
            body: RefsetBody::Simple,
        }
    }

    pub fn simple_map_member(
        seq: u128,
        concept_id: SctId,
        refset_id: SctId,
        target: &str,
    ) -> RefsetItem {
        RefsetItem {
            id: Uuid::from_u128(seq),
            effective_time: 20200101,
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id,
            referenced_component_id: concept_id,
            body: RefsetBody::SimpleMap {
                map_target: target.to_string(),
            },
        }
    }

    pub fn association_member(
        seq: u128,
        component_id: SctId,
        refset_id: SctId,
        target_component_id: SctId,
    ) -> RefsetItem {
        RefsetItem {
            id: Uuid::from_u128(seq),
            effective_time: 20200101,
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id,
            referenced_component_id: component_id,
            body: RefsetBody::Association { target_component_id },
        }
    }

    pub fn descriptor_member(
        seq: u128,
        described_refset_id: SctId,
        attribute_description_id: SctId,
        attribute_order: i64,
    ) -> RefsetItem {
        RefsetItem {
            id: Uuid::from_u128(seq),
            effective_time: 20200101,
            active: true,
            module_id: well_known::MODEL_MODULE,
            refset_id: well_known::REFSET_DESCRIPTOR_REFSET,
            referenced_component_id: described_refset_id,
            body: RefsetBody::RefsetDescriptor {
                attribute_description_id,
                attribute_type_id: attribute_description_id,
                attribute_order,
            },
        }
    }
}
