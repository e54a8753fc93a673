//! Transitive closure over the IS-A hierarchy.
//!
//! The closure is rebuilt after each ingestion: a breadth-first walk up the
//! active IS-A relationships of every concept, persisted into the
//! `ancestors` keyspace. Only IS-A is materialized; other relationship
//! types are expanded on demand against this closure.

use std::collections::{BTreeSet, VecDeque};

use tracing::info;

use snomed_types::{well_known, SctId};

use crate::error::StoreResult;
use crate::store::Store;

/// Summary of a closure build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureStats {
    /// Concepts visited.
    pub concept_count: usize,
    /// Total ancestor rows written.
    pub ancestor_rows: usize,
}

impl Store {
    /// Computes the set of IS-A ancestors of a concept by walking the
    /// parent index breadth-first. Does not include the concept itself.
    pub fn compute_ancestors(&self, concept_id: SctId) -> StoreResult<BTreeSet<SctId>> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        for parent in self.parents_of(concept_id, well_known::IS_A)? {
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
        while let Some(current) = queue.pop_front() {
            for parent in self.parents_of(current, well_known::IS_A)? {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(visited)
    }

    /// Computes the set of IS-A descendants of a concept. Does not include
    /// the concept itself.
    pub fn compute_descendants(&self, concept_id: SctId) -> StoreResult<BTreeSet<SctId>> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        for child in self.children_of(concept_id, well_known::IS_A)? {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current, well_known::IS_A)? {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        Ok(visited)
    }

    /// Rebuilds the persisted IS-A ancestor closure for every concept.
    ///
    /// Must run after all relationship writes (hard barrier); the previous
    /// closure is discarded first so re-ingestion never leaves stale rows.
    pub fn build_closure(&self) -> StoreResult<ClosureStats> {
        self.clear_ancestors()?;

        let concept_ids = self.concept_ids()?;
        let concept_count = concept_ids.len();
        let mut ancestor_rows = 0usize;

        for concept_id in concept_ids {
            let ancestors = self.compute_ancestors(concept_id)?;
            if !ancestors.is_empty() {
                ancestor_rows += ancestors.len();
                self.write_ancestors(concept_id, &ancestors)?;
            }
        }

        info!(concept_count, ancestor_rows, "rebuilt IS-A transitive closure");
        Ok(ClosureStats {
            concept_count,
            ancestor_rows,
        })
    }
}
