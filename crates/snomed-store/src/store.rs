//! RocksDB-backed component store.
//!
//! One column family per logical keyspace. Component records are bincode
//! values keyed by identifier; the remaining keyspaces are pure indices
//! whose information lives in the key bytes (see [`crate::keys`]).
//!
//! Writes apply the max-effective-time rule: for a given component id the
//! record with the greatest `effective_time` is retained, and on equal
//! dates the incoming write wins. Index rows follow the winning record.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;
use uuid::Uuid;

use snomed_types::{
    well_known, Concept, ConcreteRelationship, Description, RefsetBody, RefsetItem, RefsetKind,
    Relationship, SctId,
};

use crate::error::{StoreError, StoreResult};
use crate::keys;

// =============================================================================
// Keyspaces
// =============================================================================

/// Concept records keyed by concept id.
pub const CF_CONCEPTS: &str = "concepts";
/// Description records keyed by description id.
pub const CF_DESCRIPTIONS: &str = "descriptions";
/// Relationship records keyed by relationship id.
pub const CF_RELATIONSHIPS: &str = "relationships";
/// Concrete relationship records keyed by relationship id.
pub const CF_CONCRETE_RELATIONSHIPS: &str = "concrete-relationships";
/// Refset member records keyed by member UUID.
pub const CF_REFSET_ITEMS: &str = "refset-items";
/// Index: (concept id, description id) -> ().
pub const CF_CONCEPT_DESCRIPTIONS: &str = "concept-descriptions";
/// Index: (source id, type id, destination id) -> relationship id.
pub const CF_CONCEPT_PARENTS: &str = "concept-parents";
/// Index: (destination id, type id, source id) -> relationship id.
pub const CF_CONCEPT_CHILDREN: &str = "concept-children";
/// Index: (source id, type id, relationship id) -> ().
pub const CF_CONCEPT_CONCRETE: &str = "concept-concrete";
/// Index: (referenced component id, refset id, uuid) -> ().
pub const CF_COMPONENT_REFSET_ITEMS: &str = "component-refset-items";
/// Index: (refset id, referenced component id, uuid) -> ().
pub const CF_REFSET_MEMBERS: &str = "refset-members";
/// Index: (refset id, map target, uuid) -> ().
pub const CF_MAP_TARGETS: &str = "map-targets";
/// Installed refset ids -> member kind tag.
pub const CF_INSTALLED_REFSETS: &str = "installed-refsets";
/// IS-A transitive closure: (concept id, ancestor id) -> ().
pub const CF_ANCESTORS: &str = "ancestors";

/// All column families, in open order.
pub const ALL_CFS: &[&str] = &[
    CF_CONCEPTS,
    CF_DESCRIPTIONS,
    CF_RELATIONSHIPS,
    CF_CONCRETE_RELATIONSHIPS,
    CF_REFSET_ITEMS,
    CF_CONCEPT_DESCRIPTIONS,
    CF_CONCEPT_PARENTS,
    CF_CONCEPT_CHILDREN,
    CF_CONCEPT_CONCRETE,
    CF_COMPONENT_REFSET_ITEMS,
    CF_REFSET_MEMBERS,
    CF_MAP_TARGETS,
    CF_INSTALLED_REFSETS,
    CF_ANCESTORS,
];

fn kind_tag(kind: RefsetKind) -> u8 {
    match kind {
        RefsetKind::Simple => 0,
        RefsetKind::Association => 1,
        RefsetKind::Language => 2,
        RefsetKind::SimpleMap => 3,
        RefsetKind::ComplexMap => 4,
        RefsetKind::ExtendedMap => 5,
        RefsetKind::AttributeValue => 6,
        RefsetKind::OwlExpression => 7,
        RefsetKind::ModuleDependency => 8,
        RefsetKind::RefsetDescriptor => 9,
        RefsetKind::Other => 255,
    }
}

/// The persistent SNOMED CT component store.
///
/// Safe for concurrent readers; writers serialize through RocksDB. Opened
/// handles release their file locks on drop.
pub struct Store {
    db: DB,
}

impl Store {
    /// Opens (or creates) a store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        Ok(Store { db })
    }

    fn cf(&self, name: &'static str) -> StoreResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or(StoreError::MissingKeyspace(name))
    }

    fn get_record<T: DeserializeOwned>(
        &self,
        keyspace: &'static str,
        key: &[u8],
    ) -> StoreResult<Option<T>> {
        let cf = self.cf(keyspace)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::corrupt(keyspace, e)),
            None => Ok(None),
        }
    }

    fn encode<T: Serialize>(keyspace: &'static str, value: &T) -> StoreResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| StoreError::corrupt(keyspace, e))
    }

    /// Collects the keys under `prefix` in a keyspace.
    fn scan_keys(&self, keyspace: &'static str, prefix: &[u8]) -> StoreResult<Vec<Box<[u8]>>> {
        let cf = self.cf(keyspace)?;
        let mut out = Vec::new();
        for entry in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(key);
        }
        Ok(out)
    }

    /// Collects `(key, value)` pairs under `prefix` in a keyspace.
    fn scan(
        &self,
        keyspace: &'static str,
        prefix: &[u8],
    ) -> StoreResult<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(keyspace)?;
        let mut out = Vec::new();
        for entry in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    // =========================================================================
    // Component writes
    // =========================================================================

    /// Writes a batch of concepts, retaining the latest record per id.
    pub fn write_concepts(&self, concepts: &[Concept]) -> StoreResult<()> {
        let cf = self.cf(CF_CONCEPTS)?;
        let mut batch = WriteBatch::default();
        for concept in concepts {
            if let Some(existing) = self.concept(concept.id)? {
                if existing.effective_time > concept.effective_time {
                    continue;
                }
            }
            batch.put_cf(cf, keys::id(concept.id), Self::encode(CF_CONCEPTS, concept)?);
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Writes a batch of descriptions and maintains the per-concept index.
    pub fn write_descriptions(&self, descriptions: &[Description]) -> StoreResult<()> {
        let cf = self.cf(CF_DESCRIPTIONS)?;
        let cf_index = self.cf(CF_CONCEPT_DESCRIPTIONS)?;
        let mut batch = WriteBatch::default();
        for description in descriptions {
            if let Some(existing) = self.description(description.id)? {
                if existing.effective_time > description.effective_time {
                    continue;
                }
                if existing.concept_id != description.concept_id {
                    batch.delete_cf(cf_index, keys::pair(existing.concept_id, existing.id));
                }
            }
            batch.put_cf(
                cf,
                keys::id(description.id),
                Self::encode(CF_DESCRIPTIONS, description)?,
            );
            batch.put_cf(cf_index, keys::pair(description.concept_id, description.id), b"");
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Writes a batch of relationships, maintaining the parent and child
    /// indices for active records.
    pub fn write_relationships(&self, relationships: &[Relationship]) -> StoreResult<()> {
        let cf = self.cf(CF_RELATIONSHIPS)?;
        let cf_parents = self.cf(CF_CONCEPT_PARENTS)?;
        let cf_children = self.cf(CF_CONCEPT_CHILDREN)?;
        let mut batch = WriteBatch::default();
        for rel in relationships {
            if let Some(existing) = self.relationship(rel.id)? {
                if existing.effective_time > rel.effective_time {
                    continue;
                }
                batch.delete_cf(
                    cf_parents,
                    keys::triple(existing.source_id, existing.type_id, existing.destination_id),
                );
                batch.delete_cf(
                    cf_children,
                    keys::triple(existing.destination_id, existing.type_id, existing.source_id),
                );
            }
            batch.put_cf(cf, keys::id(rel.id), Self::encode(CF_RELATIONSHIPS, rel)?);
            if rel.active {
                let rel_id = keys::id(rel.id);
                batch.put_cf(
                    cf_parents,
                    keys::triple(rel.source_id, rel.type_id, rel.destination_id),
                    rel_id,
                );
                batch.put_cf(
                    cf_children,
                    keys::triple(rel.destination_id, rel.type_id, rel.source_id),
                    rel_id,
                );
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Writes a batch of concrete relationships with their source index.
    pub fn write_concrete_relationships(
        &self,
        relationships: &[ConcreteRelationship],
    ) -> StoreResult<()> {
        let cf = self.cf(CF_CONCRETE_RELATIONSHIPS)?;
        let cf_index = self.cf(CF_CONCEPT_CONCRETE)?;
        let mut batch = WriteBatch::default();
        for rel in relationships {
            if let Some(existing) = self.concrete_relationship(rel.id)? {
                if existing.effective_time > rel.effective_time {
                    continue;
                }
                batch.delete_cf(
                    cf_index,
                    keys::triple(existing.source_id, existing.type_id, existing.id),
                );
            }
            batch.put_cf(
                cf,
                keys::id(rel.id),
                Self::encode(CF_CONCRETE_RELATIONSHIPS, rel)?,
            );
            if rel.active {
                batch.put_cf(cf_index, keys::triple(rel.source_id, rel.type_id, rel.id), b"");
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Writes a batch of refset members, maintaining the component, refset,
    /// map-target and installed-refset indices.
    pub fn write_refset_items(&self, items: &[RefsetItem]) -> StoreResult<()> {
        let cf = self.cf(CF_REFSET_ITEMS)?;
        let cf_component = self.cf(CF_COMPONENT_REFSET_ITEMS)?;
        let cf_members = self.cf(CF_REFSET_MEMBERS)?;
        let cf_targets = self.cf(CF_MAP_TARGETS)?;
        let cf_installed = self.cf(CF_INSTALLED_REFSETS)?;
        let mut batch = WriteBatch::default();
        for item in items {
            if let Some(existing) = self.refset_item(item.id)? {
                if existing.effective_time > item.effective_time {
                    continue;
                }
                batch.delete_cf(
                    cf_component,
                    keys::pair_uuid(existing.referenced_component_id, existing.refset_id, existing.id),
                );
                batch.delete_cf(
                    cf_members,
                    keys::pair_uuid(existing.refset_id, existing.referenced_component_id, existing.id),
                );
                if let Some(target) = existing.body.map_target() {
                    batch.delete_cf(cf_targets, keys::map_target(existing.refset_id, target, existing.id));
                }
            }
            batch.put_cf(
                cf,
                item.id.as_bytes(),
                Self::encode(CF_REFSET_ITEMS, item)?,
            );
            batch.put_cf(
                cf_component,
                keys::pair_uuid(item.referenced_component_id, item.refset_id, item.id),
                [],
            );
            batch.put_cf(
                cf_members,
                keys::pair_uuid(item.refset_id, item.referenced_component_id, item.id),
                [],
            );
            if let Some(target) = item.body.map_target() {
                batch.put_cf(cf_targets, keys::map_target(item.refset_id, target, item.id), b"");
            }
            batch.put_cf(
                cf_installed,
                keys::id(item.refset_id),
                [kind_tag(item.body.kind())],
            );
        }
        self.db.write(batch)?;
        Ok(())
    }

    // =========================================================================
    // Component reads
    // =========================================================================

    /// Fetches a concept by id.
    pub fn concept(&self, id: SctId) -> StoreResult<Option<Concept>> {
        self.get_record(CF_CONCEPTS, &keys::id(id))
    }

    /// Fetches a description by id.
    pub fn description(&self, id: SctId) -> StoreResult<Option<Description>> {
        self.get_record(CF_DESCRIPTIONS, &keys::id(id))
    }

    /// Fetches a relationship by id.
    pub fn relationship(&self, id: SctId) -> StoreResult<Option<Relationship>> {
        self.get_record(CF_RELATIONSHIPS, &keys::id(id))
    }

    /// Fetches a concrete relationship by id.
    pub fn concrete_relationship(&self, id: SctId) -> StoreResult<Option<ConcreteRelationship>> {
        self.get_record(CF_CONCRETE_RELATIONSHIPS, &keys::id(id))
    }

    /// Fetches a refset member by UUID.
    pub fn refset_item(&self, id: Uuid) -> StoreResult<Option<RefsetItem>> {
        self.get_record(CF_REFSET_ITEMS, id.as_bytes())
    }

    /// Returns all descriptions of a concept, active or not.
    pub fn concept_descriptions(&self, concept_id: SctId) -> StoreResult<Vec<Description>> {
        let mut out = Vec::new();
        for key in self.scan_keys(CF_CONCEPT_DESCRIPTIONS, &keys::id(concept_id))? {
            let description_id = keys::second(&key);
            if let Some(description) = self.description(description_id)? {
                out.push(description);
            }
        }
        Ok(out)
    }

    /// Returns the active outbound relationships of a concept.
    pub fn parent_relationships(&self, source_id: SctId) -> StoreResult<Vec<Relationship>> {
        let mut out = Vec::new();
        for (_, value) in self.scan(CF_CONCEPT_PARENTS, &keys::id(source_id))? {
            let rel_id = u64::from_be_bytes(value.as_ref().try_into().map_err(|_| {
                StoreError::Corrupt {
                    keyspace: CF_CONCEPT_PARENTS,
                    reason: "index value is not a relationship id".into(),
                }
            })?);
            if let Some(rel) = self.relationship(rel_id)? {
                out.push(rel);
            }
        }
        Ok(out)
    }

    /// Returns the active outbound relationships of a concept with the given
    /// type.
    pub fn parent_relationships_of_type(
        &self,
        source_id: SctId,
        type_id: SctId,
    ) -> StoreResult<Vec<Relationship>> {
        Ok(self
            .parent_relationships(source_id)?
            .into_iter()
            .filter(|r| r.type_id == type_id)
            .collect())
    }

    /// Returns the destination ids of a concept's active relationships of
    /// the given type.
    pub fn parents_of(&self, source_id: SctId, type_id: SctId) -> StoreResult<Vec<SctId>> {
        Ok(self
            .scan_keys(CF_CONCEPT_PARENTS, &keys::pair(source_id, type_id))?
            .iter()
            .map(|key| keys::third(key))
            .collect())
    }

    /// Returns the source ids of active relationships of the given type
    /// pointing at `destination_id`.
    pub fn children_of(&self, destination_id: SctId, type_id: SctId) -> StoreResult<Vec<SctId>> {
        Ok(self
            .scan_keys(CF_CONCEPT_CHILDREN, &keys::pair(destination_id, type_id))?
            .iter()
            .map(|key| keys::third(key))
            .collect())
    }

    /// Returns the active concrete relationships of a concept.
    pub fn concrete_values(&self, source_id: SctId) -> StoreResult<Vec<ConcreteRelationship>> {
        let mut out = Vec::new();
        for key in self.scan_keys(CF_CONCEPT_CONCRETE, &keys::id(source_id))? {
            if let Some(rel) = self.concrete_relationship(keys::third(&key))? {
                out.push(rel);
            }
        }
        Ok(out)
    }

    /// Returns the refset members referencing a component. A `refset_id` of
    /// zero means "any refset".
    pub fn component_refset_items(
        &self,
        component_id: SctId,
        refset_id: SctId,
    ) -> StoreResult<Vec<RefsetItem>> {
        let prefix: Vec<u8> = if refset_id == 0 {
            keys::id(component_id).to_vec()
        } else {
            keys::pair(component_id, refset_id).to_vec()
        };
        let mut out = Vec::new();
        for key in self.scan_keys(CF_COMPONENT_REFSET_ITEMS, &prefix)? {
            if let Some(item) = self.refset_item(keys::trailing_uuid(&key))? {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Returns the refsets a component is an active member of.
    pub fn component_refset_ids(&self, component_id: SctId) -> StoreResult<BTreeSet<SctId>> {
        Ok(self
            .component_refset_items(component_id, 0)?
            .into_iter()
            .filter(|item| item.active)
            .map(|item| item.refset_id)
            .collect())
    }

    /// Returns the ids of concepts that are active members of a refset.
    pub fn refset_member_ids(&self, refset_id: SctId) -> StoreResult<Vec<SctId>> {
        let mut out = Vec::new();
        let mut last = None;
        for key in self.scan_keys(CF_REFSET_MEMBERS, &keys::id(refset_id))? {
            let component_id = keys::second(&key);
            if last == Some(component_id) {
                continue;
            }
            let item = self.refset_item(keys::trailing_uuid(&key))?;
            if item.map(|i| i.active).unwrap_or(false) {
                out.push(component_id);
                last = Some(component_id);
            }
        }
        Ok(out)
    }

    /// Returns all installed refset ids.
    pub fn installed_refsets(&self) -> StoreResult<BTreeSet<SctId>> {
        let cf = self.cf(CF_INSTALLED_REFSETS)?;
        let mut out = BTreeSet::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = entry?;
            out.insert(u64::from_be_bytes(key.as_ref().try_into().map_err(|_| {
                StoreError::Corrupt {
                    keyspace: CF_INSTALLED_REFSETS,
                    reason: "key is not an id".into(),
                }
            })?));
        }
        Ok(out)
    }

    /// Returns the installed refsets whose members are language members.
    pub fn language_refset_ids(&self) -> StoreResult<BTreeSet<SctId>> {
        let cf = self.cf(CF_INSTALLED_REFSETS)?;
        let mut out = BTreeSet::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = entry?;
            if value.first() == Some(&kind_tag(RefsetKind::Language)) {
                out.insert(u64::from_be_bytes(key.as_ref().try_into().map_err(
                    |_| StoreError::Corrupt {
                        keyspace: CF_INSTALLED_REFSETS,
                        reason: "key is not an id".into(),
                    },
                )?));
            }
        }
        Ok(out)
    }

    /// Returns the ordered attribute-description prefix for a refset, from
    /// its RefsetDescriptor members. Empty when no descriptor is loaded.
    pub fn refset_descriptor_prefix(&self, refset_id: SctId) -> StoreResult<Vec<SctId>> {
        let mut entries = Vec::new();
        for key in self.scan_keys(
            CF_REFSET_MEMBERS,
            &keys::pair(well_known::REFSET_DESCRIPTOR_REFSET, refset_id),
        )? {
            if let Some(item) = self.refset_item(keys::trailing_uuid(&key))? {
                if let RefsetBody::RefsetDescriptor {
                    attribute_description_id,
                    attribute_order,
                    ..
                } = item.body
                {
                    if item.active {
                        entries.push((attribute_order, attribute_description_id));
                    }
                }
            }
        }
        entries.sort_unstable();
        Ok(entries.into_iter().map(|(_, id)| id).collect())
    }

    // =========================================================================
    // Closure and enumeration
    // =========================================================================

    /// Returns the stored IS-A ancestors of a concept (ancestor-only).
    pub fn ancestors_of(&self, concept_id: SctId) -> StoreResult<BTreeSet<SctId>> {
        Ok(self
            .scan_keys(CF_ANCESTORS, &keys::id(concept_id))?
            .iter()
            .map(|key| keys::second(key))
            .collect())
    }

    /// Returns the reflexive closure: the concept and its IS-A ancestors.
    pub fn all_ancestors_of(&self, concept_id: SctId) -> StoreResult<BTreeSet<SctId>> {
        let mut out = self.ancestors_of(concept_id)?;
        out.insert(concept_id);
        Ok(out)
    }

    /// Returns all concept ids in the store.
    pub fn concept_ids(&self) -> StoreResult<Vec<SctId>> {
        let cf = self.cf(CF_CONCEPTS)?;
        let mut out = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = entry?;
            out.push(u64::from_be_bytes(key.as_ref().try_into().map_err(
                |_| StoreError::Corrupt {
                    keyspace: CF_CONCEPTS,
                    reason: "key is not an id".into(),
                },
            )?));
        }
        Ok(out)
    }

    /// Returns the distinct relationship type ids present in the store,
    /// covering both concept-valued and concrete relationships.
    pub fn relationship_type_ids(&self) -> StoreResult<BTreeSet<SctId>> {
        let mut out = BTreeSet::new();
        let cf = self.cf(CF_RELATIONSHIPS)?;
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = entry?;
            let rel: Relationship = bincode::deserialize(&value)
                .map_err(|e| StoreError::corrupt(CF_RELATIONSHIPS, e))?;
            out.insert(rel.type_id);
        }
        let cf = self.cf(CF_CONCRETE_RELATIONSHIPS)?;
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = entry?;
            let rel: ConcreteRelationship = bincode::deserialize(&value)
                .map_err(|e| StoreError::corrupt(CF_CONCRETE_RELATIONSHIPS, e))?;
            out.insert(rel.type_id);
        }
        Ok(out)
    }

    pub(crate) fn clear_ancestors(&self) -> StoreResult<()> {
        let cf = self.cf(CF_ANCESTORS)?;
        self.db
            .delete_range_cf(cf, [0u8; 16].as_slice(), [0xffu8; 17].as_slice())?;
        Ok(())
    }

    pub(crate) fn write_ancestors(
        &self,
        concept_id: SctId,
        ancestors: &BTreeSet<SctId>,
    ) -> StoreResult<()> {
        let cf = self.cf(CF_ANCESTORS)?;
        let mut batch = WriteBatch::default();
        for ancestor in ancestors {
            batch.put_cf(cf, keys::pair(concept_id, *ancestor), b"");
        }
        self.db.write(batch)?;
        Ok(())
    }

    // =========================================================================
    // Maps and history
    // =========================================================================

    /// Returns the active map members of `refset_id` whose target code is
    /// exactly `target`, e.g. for reverse ICD-10 or CTV3 lookups.
    pub fn reverse_map(&self, refset_id: SctId, target: &str) -> StoreResult<Vec<RefsetItem>> {
        let mut out = Vec::new();
        for key in self.scan_keys(CF_MAP_TARGETS, &keys::map_target_prefix(refset_id, target))? {
            if let Some(item) = self.refset_item(keys::trailing_uuid(&key))? {
                if item.active {
                    out.push(item);
                }
            }
        }
        Ok(out)
    }

    /// Returns the active historical-association members referencing a
    /// component, grouped by association refset.
    pub fn history(&self, component_id: SctId) -> StoreResult<BTreeMap<SctId, Vec<RefsetItem>>> {
        let mut out: BTreeMap<SctId, Vec<RefsetItem>> = BTreeMap::new();
        for item in self.component_refset_items(component_id, 0)? {
            if item.active && item.is_historical_association() {
                out.entry(item.refset_id).or_default().push(item);
            }
        }
        Ok(out)
    }

    /// Logs a one-line summary of the store's contents.
    pub fn log_counts(&self) -> StoreResult<()> {
        let concepts = self.count(CF_CONCEPTS)?;
        let descriptions = self.count(CF_DESCRIPTIONS)?;
        let relationships = self.count(CF_RELATIONSHIPS)?;
        let refset_items = self.count(CF_REFSET_ITEMS)?;
        info!(concepts, descriptions, relationships, refset_items, "store contents");
        Ok(())
    }

    fn count(&self, keyspace: &'static str) -> StoreResult<usize> {
        let cf = self.cf(keyspace)?;
        let mut n = 0;
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            entry?;
            n += 1;
        }
        Ok(n)
    }

    /// Non-IS-A transitive parents: the destinations of the concept's active
    /// relationships whose type is `type_id` or any descendant of it.
    ///
    /// Attribute subsumption over the relationship-type hierarchy uses the
    /// IS-A closure, so the closure must be built first.
    pub fn parent_relationships_expanded(
        &self,
        source_id: SctId,
        type_id: SctId,
    ) -> StoreResult<BTreeSet<SctId>> {
        let mut out = BTreeSet::new();
        let mut matching_types: HashSet<SctId> = HashSet::new();
        let mut rejected_types: HashSet<SctId> = HashSet::new();
        for rel in self.parent_relationships(source_id)? {
            if !rel.active || rejected_types.contains(&rel.type_id) {
                continue;
            }
            if !matching_types.contains(&rel.type_id) {
                if rel.type_id == type_id || self.ancestors_of(rel.type_id)?.contains(&type_id) {
                    matching_types.insert(rel.type_id);
                } else {
                    rejected_types.insert(rel.type_id);
                    continue;
                }
            }
            out.insert(rel.destination_id);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_max_effective_time_wins() {
        let (_dir, store) = testing::empty_store();

        let older = testing::concept(73211009, 20020131, true);
        let newer = testing::concept(73211009, 20230101, false);

        store.write_concepts(&[newer.clone()]).unwrap();
        store.write_concepts(&[older]).unwrap();

        // The older record must not overwrite the newer one.
        assert_eq!(store.concept(73211009).unwrap(), Some(newer));
    }

    #[test]
    fn test_equal_effective_time_incoming_wins() {
        let (_dir, store) = testing::empty_store();

        let first = testing::concept(73211009, 20230101, true);
        let second = testing::concept(73211009, 20230101, false);

        store.write_concepts(&[first]).unwrap();
        store.write_concepts(&[second.clone()]).unwrap();

        assert_eq!(store.concept(73211009).unwrap(), Some(second));
    }

    #[test]
    fn test_relationship_replacement_moves_index_rows() {
        let (_dir, store) = testing::empty_store();

        let active = testing::is_a(1, 24700007, 6118003, 20020131, true);
        store.write_relationships(&[active]).unwrap();
        assert_eq!(
            store.parents_of(24700007, well_known::IS_A).unwrap(),
            vec![6118003]
        );
        assert_eq!(
            store.children_of(6118003, well_known::IS_A).unwrap(),
            vec![24700007]
        );

        // Inactivation removes the index rows but keeps the record.
        let retired = testing::is_a(1, 24700007, 6118003, 20230101, false);
        store.write_relationships(&[retired]).unwrap();
        assert!(store.parents_of(24700007, well_known::IS_A).unwrap().is_empty());
        assert!(store.children_of(6118003, well_known::IS_A).unwrap().is_empty());
        assert!(store.relationship(1).unwrap().is_some());
    }

    #[test]
    fn test_concept_descriptions_round_trip() {
        let (_dir, store) = testing::empty_store();
        let description = testing::synonym(101, 73211009, "Diabetes");
        store.write_descriptions(&[description.clone()]).unwrap();

        assert_eq!(store.description(101).unwrap(), Some(description.clone()));
        assert_eq!(store.concept_descriptions(73211009).unwrap(), vec![description]);
    }

    #[test]
    fn test_component_refset_items_filters_by_refset() {
        let (_dir, store) = testing::empty_store();
        let gb = testing::language_member(1, 101, well_known::GB_ENGLISH, well_known::PREFERRED);
        let us = testing::language_member(2, 101, well_known::US_ENGLISH, well_known::ACCEPTABLE);
        store.write_refset_items(&[gb, us]).unwrap();

        assert_eq!(store.component_refset_items(101, 0).unwrap().len(), 2);
        assert_eq!(
            store
                .component_refset_items(101, well_known::GB_ENGLISH)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            store.component_refset_ids(101).unwrap(),
            [well_known::GB_ENGLISH, well_known::US_ENGLISH].into_iter().collect()
        );
    }

    #[test]
    fn test_installed_and_language_refsets() {
        let (_dir, store) = testing::empty_store();
        let language =
            testing::language_member(1, 101, well_known::GB_ENGLISH, well_known::PREFERRED);
        let simple = testing::simple_member(2, 73211009, 723264001);
        store.write_refset_items(&[language, simple]).unwrap();

        let installed = store.installed_refsets().unwrap();
        assert!(installed.contains(&well_known::GB_ENGLISH));
        assert!(installed.contains(&723264001));

        let languages = store.language_refset_ids().unwrap();
        assert!(languages.contains(&well_known::GB_ENGLISH));
        assert!(!languages.contains(&723264001));
    }

    #[test]
    fn test_refset_item_shapes_round_trip_storage() {
        let (_dir, store) = testing::empty_store();
        let items = vec![
            RefsetItem {
                id: Uuid::from_u128(1),
                effective_time: 20230731,
                active: true,
                module_id: well_known::CORE_MODULE,
                refset_id: 447562003,
                referenced_component_id: 24700007,
                body: RefsetBody::ExtendedMap {
                    map_group: 1,
                    map_priority: 1,
                    map_rule: "TRUE".into(),
                    map_advice: "ALWAYS G35.9".into(),
                    map_target: "G35.9".into(),
                    correlation_id: 447561005,
                    map_category_id: 447637006,
                },
            },
            RefsetItem {
                id: Uuid::from_u128(2),
                effective_time: 20230731,
                active: true,
                module_id: well_known::CORE_MODULE,
                refset_id: 733073007,
                referenced_component_id: 73211009,
                body: RefsetBody::OwlExpression {
                    owl_expression: "SubClassOf(:73211009 :64572001)".into(),
                },
            },
            RefsetItem {
                id: Uuid::from_u128(3),
                effective_time: 20230731,
                active: true,
                module_id: well_known::CORE_MODULE,
                refset_id: well_known::MODULE_DEPENDENCY_REFSET,
                referenced_component_id: well_known::MODEL_MODULE,
                body: RefsetBody::ModuleDependency {
                    source_effective_time: 20230731,
                    target_effective_time: 20230131,
                },
            },
            RefsetItem {
                id: Uuid::from_u128(4),
                effective_time: 20230731,
                active: true,
                module_id: well_known::CORE_MODULE,
                refset_id: 900000000000490003,
                referenced_component_id: 73211009,
                body: RefsetBody::AttributeValue {
                    value_id: 900000000000495008,
                },
            },
        ];
        store.write_refset_items(&items).unwrap();

        for item in items {
            assert_eq!(store.refset_item(item.id).unwrap(), Some(item));
        }
    }

    #[test]
    fn test_reverse_map_exact_target() {
        let (_dir, store) = testing::empty_store();
        let a = testing::simple_map_member(1, 24700007, 447562003, "G35");
        let b = testing::simple_map_member(2, 73211009, 447562003, "G35.9");
        store.write_refset_items(&[a, b]).unwrap();

        let hits = store.reverse_map(447562003, "G35").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].referenced_component_id, 24700007);
    }

    #[test]
    fn test_history_groups_by_refset() {
        let (_dir, store) = testing::empty_store();
        let replaced =
            testing::association_member(1, 100, well_known::REPLACED_BY, 200);
        let same_as = testing::association_member(2, 100, well_known::SAME_AS, 300);
        store.write_refset_items(&[replaced, same_as]).unwrap();

        let history = store.history(100).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[&well_known::REPLACED_BY].len(), 1);
        assert_eq!(history[&well_known::SAME_AS].len(), 1);
    }

    #[test]
    fn test_refset_member_ids_deduplicated() {
        let (_dir, store) = testing::empty_store();
        // Two memberships for the same concept collapse to one id.
        store
            .write_refset_items(&[
                testing::simple_member(1, 24700007, 723264001),
                testing::simple_member(2, 24700007, 723264001),
                testing::simple_member(3, 73211009, 723264001),
            ])
            .unwrap();

        assert_eq!(
            store.refset_member_ids(723264001).unwrap(),
            vec![24700007, 73211009]
        );
        assert!(store.refset_member_ids(42).unwrap().is_empty());
    }

    #[test]
    fn test_parent_relationships_expanded_subsumes_types() {
        let (_dir, store) = testing::empty_store();
        // Laterality (272741003) is a subtype of a broader attribute; a
        // query for the supertype must surface laterality values too.
        let attribute = 246061005; // "attribute"
        let laterality = 272741003;
        for id in [attribute, laterality, 100, 7771000] {
            store.write_concepts(&[testing::concept(id, 20230101, true)]).unwrap();
        }
        store
            .write_relationships(&[
                testing::is_a(1, laterality, attribute, 20230101, true),
                testing::relationship(2, 100, laterality, 7771000, 20230101, true),
            ])
            .unwrap();
        store.build_closure().unwrap();

        let expanded = store.parent_relationships_expanded(100, attribute).unwrap();
        assert_eq!(expanded.iter().copied().collect::<Vec<_>>(), vec![7771000]);

        // The exact type still matches itself.
        let exact = store.parent_relationships_expanded(100, laterality).unwrap();
        assert_eq!(exact.iter().copied().collect::<Vec<_>>(), vec![7771000]);

        // An unrelated type matches nothing.
        assert!(store
            .parent_relationships_expanded(100, well_known::IS_A)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_refset_descriptor_prefix_ordering() {
        let (_dir, store) = testing::empty_store();
        // Descriptor rows arrive unordered; the prefix must come back sorted
        // by attribute order.
        let second = testing::descriptor_member(1, well_known::GB_ENGLISH, well_known::ACCEPTABILITY_ATTRIBUTE, 1);
        let first = testing::descriptor_member(2, well_known::GB_ENGLISH, well_known::REFERENCED_COMPONENT, 0);
        store.write_refset_items(&[second, first]).unwrap();

        assert_eq!(
            store.refset_descriptor_prefix(well_known::GB_ENGLISH).unwrap(),
            vec![well_known::REFERENCED_COMPONENT, well_known::ACCEPTABILITY_ATTRIBUTE]
        );
    }
}
