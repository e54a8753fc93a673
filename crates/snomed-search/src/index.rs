//! Index construction and access.
//!
//! The index is built in a second phase after ingestion completes: a
//! producer streams concepts into a bounded channel and a pool of workers
//! assembles extended concepts and emits one document per description.
//! The index writer serializes appends internally, so workers share it.
//! After the final commit the segments are merged into one.

use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::{Arc, Mutex};

use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument};
use tracing::info;

use snomed_store::{ExtendedConcept, Store};
use snomed_types::{Concept, RefsetBody, SctId};

use crate::error::{SearchError, SearchResult};
use crate::schema::{
    build_schema, count_field, direct_field, length_boost, numeric_value_field,
    preferred_term_field, register_tokenizers, string_value_field, transitive_field, FixedFields,
};

/// Queue depth for the concept stream feeding the index workers.
const CHANNEL_CAPACITY: usize = 50;
/// Index writer memory budget, in bytes.
const WRITER_MEMORY_BUDGET: usize = 256 * 1024 * 1024;

/// A searchable description index over a built snapshot.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    schema: Schema,
    fixed: FixedFields,
}

impl SearchIndex {
    /// Opens an existing index directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> SearchResult<Self> {
        let mmap = tantivy::directory::MmapDirectory::open(dir.as_ref())
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = Index::open(mmap)?;
        Self::from_index(index)
    }

    /// Builds a fresh index from the store's contents into `dir`. Any
    /// previous index in `dir` is discarded first; build into a new
    /// directory and swap afterwards if the old index must survive a
    /// crash mid-build.
    pub fn build<P: AsRef<Path>>(store: &Store, dir: P) -> SearchResult<Self> {
        let dir = dir.as_ref();
        if dir.exists() {
            std::fs::remove_dir_all(dir)
                .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        }
        std::fs::create_dir_all(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;

        let schema = schema_for(store)?;
        let mmap = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = Index::create(mmap, schema, tantivy::IndexSettings::default())?;
        populate(&index, store)?;
        Self::from_index(index)
    }

    /// Builds an in-memory index; used by tests.
    pub fn build_in_ram(store: &Store) -> SearchResult<Self> {
        let schema = schema_for(store)?;
        let index = Index::create_in_ram(schema);
        populate(&index, store)?;
        Self::from_index(index)
    }

    fn from_index(index: Index) -> SearchResult<Self> {
        register_tokenizers(&index);
        let schema = index.schema();
        let fixed = FixedFields::resolve(&schema)?;
        let reader = index.reader()?;
        Ok(SearchIndex {
            index,
            reader,
            schema,
            fixed,
        })
    }

    /// The underlying index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// A fresh searcher over the committed index state.
    pub fn searcher(&self) -> tantivy::Searcher {
        self.reader.searcher()
    }

    /// The document schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Resolved fixed-field handles.
    pub fn fixed(&self) -> &FixedFields {
        &self.fixed
    }

    /// Resolves a dynamic field by name, `None` when the snapshot never
    /// produced it (e.g. a relationship type absent from the release).
    pub fn dynamic_field(&self, name: &str) -> Option<tantivy::schema::Field> {
        self.schema.get_field(name).ok()
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn schema_for(store: &Store) -> SearchResult<Schema> {
    let relationship_types = store.relationship_type_ids()?;
    let language_refsets = store.language_refset_ids()?;
    Ok(build_schema(&relationship_types, &language_refsets))
}

/// Streams every concept through a worker pool writing description
/// documents, then commits and merges to a single segment.
fn populate(index: &Index, store: &Store) -> SearchResult<()> {
    register_tokenizers(index);
    let mut writer: IndexWriter = index.writer(WRITER_MEMORY_BUDGET)?;
    let language_refsets: Vec<SctId> = store.language_refset_ids()?.into_iter().collect();

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let concept_ids = store.concept_ids()?;
    let total = concept_ids.len();

    std::thread::scope(|scope| -> SearchResult<()> {
        let (tx, rx) = sync_channel::<Concept>(CHANNEL_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let writer_ref = &writer;
        let language_refsets = &language_refsets;
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = Arc::clone(&rx);
                scope.spawn(move || index_worker(store, index, writer_ref, language_refsets, rx))
            })
            .collect();

        for concept_id in concept_ids {
            if let Some(concept) = store.concept(concept_id)? {
                if tx.send(concept).is_err() {
                    break;
                }
            }
        }
        drop(tx);

        for handle in handles {
            handle.join().expect("index worker panicked")?;
        }
        Ok(())
    })?;

    writer.commit()?;
    let segment_ids = index.searchable_segment_ids()?;
    if segment_ids.len() > 1 {
        writer.merge(&segment_ids).wait()?;
    }
    writer.wait_merging_threads()?;
    info!(concepts = total, "search index built");
    Ok(())
}

fn index_worker(
    store: &Store,
    index: &Index,
    writer: &IndexWriter,
    language_refsets: &[SctId],
    rx: Arc<Mutex<Receiver<Concept>>>,
) -> SearchResult<()> {
    loop {
        let concept = match rx.lock().expect("index channel poisoned").recv() {
            Ok(concept) => concept,
            Err(_) => return Ok(()),
        };
        if let Some(extended) = store.extended_concept(concept.id)? {
            index_extended_concept(store, index, writer, language_refsets, &extended)?;
        }
    }
}

/// Emits one document per description of the concept.
fn index_extended_concept(
    store: &Store,
    index: &Index,
    writer: &IndexWriter,
    language_refsets: &[SctId],
    extended: &ExtendedConcept,
) -> SearchResult<()> {
    let schema = index.schema();
    let fixed = FixedFields::resolve(&schema)?;
    let field = |name: &str| {
        schema
            .get_field(name)
            .map_err(|_| SearchError::Query(format!("schema is missing field {name}")))
    };

    // Preferred synonym per installed language refset, stored on every
    // document of the concept.
    let mut preferred_terms = Vec::with_capacity(language_refsets.len());
    for refset_id in language_refsets {
        if let Some(description) = store.preferred_synonym(extended.concept.id, &[*refset_id])? {
            preferred_terms.push((field(&preferred_term_field(*refset_id))?, description.term));
        }
    }

    for description in &extended.descriptions {
        let mut doc = TantivyDocument::new();
        doc.add_text(fixed.term, &description.term);
        doc.add_text(fixed.nterm, &description.term);
        doc.add_f64(fixed.length_boost, length_boost(&description.term));
        doc.add_u64(fixed.id, description.id);
        doc.add_u64(fixed.description_id, description.id);
        doc.add_u64(fixed.concept_id, extended.concept.id);
        doc.add_u64(fixed.module_id, description.module_id);
        doc.add_u64(fixed.type_id, description.type_id);
        doc.add_text(fixed.concept_active, bool_token(extended.concept.active));
        doc.add_text(fixed.description_active, bool_token(description.active));

        for (type_id, ancestors) in &extended.parent_relationships {
            let transitive = field(&transitive_field(*type_id))?;
            for ancestor in ancestors {
                doc.add_u64(transitive, *ancestor);
            }
        }
        for (type_id, parents) in &extended.direct_parent_relationships {
            let direct = field(&direct_field(*type_id))?;
            for parent in parents {
                doc.add_u64(direct, *parent);
            }
            doc.add_u64(field(&count_field(*type_id))?, parents.len() as u64);
        }
        for concrete in &extended.concrete_values {
            match &concrete.value {
                snomed_types::ConcreteValue::Decimal(n) => {
                    doc.add_f64(field(&numeric_value_field(concrete.type_id))?, *n);
                }
                snomed_types::ConcreteValue::String(s) => {
                    doc.add_text(field(&string_value_field(concrete.type_id))?, s);
                }
                snomed_types::ConcreteValue::Boolean(b) => {
                    doc.add_text(field(&string_value_field(concrete.type_id))?, b.to_string());
                }
            }
        }

        for item in store.component_refset_items(description.id, 0)? {
            if !item.active {
                continue;
            }
            doc.add_u64(fixed.description_refsets, item.refset_id);
            if let RefsetBody::Language { acceptability_id } = item.body {
                if acceptability_id == snomed_types::well_known::PREFERRED {
                    doc.add_u64(fixed.preferred_in, item.refset_id);
                } else {
                    doc.add_u64(fixed.acceptable_in, item.refset_id);
                }
            }
        }
        for refset_id in &extended.refset_ids {
            doc.add_u64(fixed.concept_refsets, *refset_id);
        }
        for (preferred_field, term) in &preferred_terms {
            doc.add_text(*preferred_field, term);
        }

        writer.add_document(doc)?;
    }
    Ok(())
}

fn bool_token(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}
