//! Denormalized concept views and locale-aware description lookup.
//!
//! The extended concept gathers everything the search indexer and API
//! callers need in one read: the concept, its descriptions, direct and
//! transitive parents per relationship type, concrete values and refset
//! memberships.

use std::collections::{BTreeMap, BTreeSet};

use snomed_types::{well_known, Concept, ConcreteRelationship, Description, SctId};

use crate::error::StoreResult;
use crate::store::Store;

/// A concept denormalized with its descriptions, parents, concrete values
/// and refset memberships.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedConcept {
    /// The concept record.
    pub concept: Concept,
    /// All descriptions of the concept, active and inactive.
    pub descriptions: Vec<Description>,
    /// Direct parents per relationship type (active relationships only).
    pub direct_parent_relationships: BTreeMap<SctId, BTreeSet<SctId>>,
    /// Transitive parents per relationship type: each destination together
    /// with its IS-A ancestors. For IS-A this is exactly the concept's
    /// ancestor set.
    pub parent_relationships: BTreeMap<SctId, BTreeSet<SctId>>,
    /// Active concrete values by relationship type.
    pub concrete_values: Vec<ConcreteRelationship>,
    /// Refsets the concept is an active member of.
    pub refset_ids: BTreeSet<SctId>,
}

impl Store {
    /// Assembles the extended view of a concept, or `None` if the concept
    /// id is not present.
    ///
    /// The IS-A closure must be built first; transitive parent sets are
    /// derived from it.
    pub fn extended_concept(&self, concept_id: SctId) -> StoreResult<Option<ExtendedConcept>> {
        let concept = match self.concept(concept_id)? {
            Some(concept) => concept,
            None => return Ok(None),
        };

        let descriptions = self.concept_descriptions(concept_id)?;

        let mut direct: BTreeMap<SctId, BTreeSet<SctId>> = BTreeMap::new();
        for rel in self.parent_relationships(concept_id)? {
            if rel.active {
                direct.entry(rel.type_id).or_default().insert(rel.destination_id);
            }
        }

        let mut transitive: BTreeMap<SctId, BTreeSet<SctId>> = BTreeMap::new();
        for (type_id, destinations) in &direct {
            let expanded = transitive.entry(*type_id).or_default();
            for destination in destinations {
                expanded.extend(self.all_ancestors_of(*destination)?);
            }
        }

        let concrete_values = self.concrete_values(concept_id)?;
        let refset_ids = self.component_refset_ids(concept_id)?;

        Ok(Some(ExtendedConcept {
            concept,
            descriptions,
            direct_parent_relationships: direct,
            parent_relationships: transitive,
            concrete_values,
            refset_ids,
        }))
    }

    /// Returns the preferred synonym of a concept under the given
    /// language-refset priority list.
    ///
    /// The first active synonym marked Preferred in the first matching
    /// refset wins; absent any match, falls back to any active synonym.
    pub fn preferred_synonym(
        &self,
        concept_id: SctId,
        refset_priority: &[SctId],
    ) -> StoreResult<Option<Description>> {
        self.preferred_description(concept_id, well_known::SYNONYM, refset_priority)
    }

    /// Returns the fully specified name of a concept, preferring the FSN
    /// marked Preferred under the given priority list.
    pub fn fully_specified_name(
        &self,
        concept_id: SctId,
        refset_priority: &[SctId],
    ) -> StoreResult<Option<Description>> {
        self.preferred_description(concept_id, well_known::FULLY_SPECIFIED_NAME, refset_priority)
    }

    fn preferred_description(
        &self,
        concept_id: SctId,
        type_id: SctId,
        refset_priority: &[SctId],
    ) -> StoreResult<Option<Description>> {
        let mut candidates: Vec<Description> = self
            .concept_descriptions(concept_id)?
            .into_iter()
            .filter(|d| d.active && d.type_id == type_id)
            .collect();
        candidates.sort_by_key(|d| d.id);

        for refset_id in refset_priority {
            for description in &candidates {
                let preferred = self
                    .component_refset_items(description.id, *refset_id)?
                    .iter()
                    .any(|item| item.active && item.is_preferred());
                if preferred {
                    return Ok(Some(description.clone()));
                }
            }
        }
        Ok(candidates.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    /// Demyelinating disease (6118003) <- Multiple sclerosis (24700007),
    /// with a finding-site attribute and a concrete strength value.
    fn fixture() -> (tempfile::TempDir, Store) {
        let (dir, store) = testing::empty_store();
        for id in [138875005, 6118003, 24700007, 39057004] {
            store.write_concepts(&[testing::concept(id, 20020131, true)]).unwrap();
        }
        store
            .write_relationships(&[
                testing::is_a(1, 6118003, 138875005, 20020131, true),
                testing::is_a(2, 24700007, 6118003, 20020131, true),
                testing::relationship(3, 24700007, 363698007, 39057004, 20020131, true),
            ])
            .unwrap();
        store.build_closure().unwrap();
        (dir, store)
    }

    #[test]
    fn test_extended_concept_parents() {
        let (_dir, store) = fixture();
        let extended = store.extended_concept(24700007).unwrap().unwrap();

        let direct_is_a = &extended.direct_parent_relationships[&well_known::IS_A];
        assert_eq!(direct_is_a.iter().copied().collect::<Vec<_>>(), vec![6118003]);

        // Transitive IS-A parents equal the concept's ancestors.
        let transitive_is_a = &extended.parent_relationships[&well_known::IS_A];
        assert!(transitive_is_a.contains(&6118003));
        assert!(transitive_is_a.contains(&138875005));
    }

    #[test]
    fn test_extended_concept_absent() {
        let (_dir, store) = fixture();
        assert!(store.extended_concept(999999999).unwrap().is_none());
    }

    #[test]
    fn test_preferred_synonym_by_refset_priority() {
        let (_dir, store) = fixture();
        let appendicectomy = testing::synonym(201, 80146002, "Appendicectomy");
        let appendectomy = testing::synonym(202, 80146002, "Appendectomy");
        store.write_concepts(&[testing::concept(80146002, 20020131, true)]).unwrap();
        store
            .write_descriptions(&[appendicectomy.clone(), appendectomy.clone()])
            .unwrap();
        store
            .write_refset_items(&[
                testing::language_member(1, 201, well_known::GB_ENGLISH, well_known::PREFERRED),
                testing::language_member(2, 202, well_known::US_ENGLISH, well_known::PREFERRED),
                testing::language_member(3, 201, well_known::US_ENGLISH, well_known::ACCEPTABLE),
            ])
            .unwrap();

        let gb = store
            .preferred_synonym(80146002, &[well_known::GB_ENGLISH])
            .unwrap()
            .unwrap();
        assert_eq!(gb.term, "Appendicectomy");

        let us = store
            .preferred_synonym(80146002, &[well_known::US_ENGLISH])
            .unwrap()
            .unwrap();
        assert_eq!(us.term, "Appendectomy");
    }

    #[test]
    fn test_preferred_synonym_falls_back_to_any_synonym() {
        let (_dir, store) = fixture();
        store.write_concepts(&[testing::concept(80146002, 20020131, true)]).unwrap();
        store
            .write_descriptions(&[testing::synonym(201, 80146002, "Appendicectomy")])
            .unwrap();

        let fallback = store
            .preferred_synonym(80146002, &[well_known::GB_ENGLISH])
            .unwrap()
            .unwrap();
        assert_eq!(fallback.term, "Appendicectomy");
    }

    #[test]
    fn test_fsn_ignores_synonyms() {
        let (_dir, store) = fixture();
        store.write_concepts(&[testing::concept(73211009, 20020131, true)]).unwrap();
        store
            .write_descriptions(&[
                testing::synonym(201, 73211009, "Diabetes"),
                testing::fsn(202, 73211009, "Diabetes mellitus (disorder)"),
            ])
            .unwrap();

        let fsn = store.fully_specified_name(73211009, &[]).unwrap().unwrap();
        assert_eq!(fsn.term, "Diabetes mellitus (disorder)");
    }
}
