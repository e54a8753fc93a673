//! Batched, parallel import of an RF2 release directory.
//!
//! A single producer walks the release tree, classifies each file and
//! streams batches of raw rows into a bounded channel. A pool of workers
//! (one per CPU) parses the rows and writes them to the store. The store's
//! max-effective-time merge is commutative per component id, so batch order
//! across workers does not matter, and a cancelled or crashed import can
//! simply be re-run.
//!
//! Refset descriptor files are imported before other reference sets so
//! that reification can prefer descriptor prefixes over file-name hints.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use snomed_store::Store;
use snomed_types::{verhoeff_valid, RefsetKind, SctId};

use crate::error::{Rf2Error, Rf2Result};
use crate::filename::{parse_filename, ComponentFile};
use crate::reify::{kind_for_prefix, reify};
use crate::row;

/// Rows per work item.
const BATCH_SIZE: usize = 5_000;
/// Bounded channel depth, in batches.
const CHANNEL_CAPACITY: usize = 50;

/// Counts accumulated over one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Release files ingested.
    pub files: usize,
    /// Data rows seen (excluding headers).
    pub rows: usize,
    /// Concept rows written.
    pub concepts: usize,
    /// Description and text definition rows written.
    pub descriptions: usize,
    /// Relationship rows written (inferred and stated).
    pub relationships: usize,
    /// Concrete relationship rows written.
    pub concrete_relationships: usize,
    /// Reference set member rows written.
    pub refset_items: usize,
    /// Rows dropped with parse errors.
    pub parse_errors: usize,
    /// Identifiers that failed Verhoeff validation (rows still admitted).
    pub verhoeff_failures: usize,
}

impl ImportSummary {
    fn merge(&mut self, other: &ImportSummary) {
        self.files += other.files;
        self.rows += other.rows;
        self.concepts += other.concepts;
        self.descriptions += other.descriptions;
        self.relationships += other.relationships;
        self.concrete_relationships += other.concrete_relationships;
        self.refset_items += other.refset_items;
        self.parse_errors += other.parse_errors;
        self.verhoeff_failures += other.verhoeff_failures;
    }
}

/// Per-file context shared by the work items cut from it.
struct FileContext {
    name: String,
    component: ComponentFile,
}

/// A batch of raw rows from one file.
struct WorkItem {
    file: Arc<FileContext>,
    lines: Vec<String>,
}

/// Imports every RF2 file under `dir` into the store.
///
/// Recoverable row errors are counted and reported in the summary; store
/// failures abort the import. Derived artifacts (closure, search index)
/// are not touched; rebuild them once all imports have completed.
pub fn import_rf2<P: AsRef<Path>>(store: &Store, dir: P) -> Rf2Result<ImportSummary> {
    let mut files = Vec::new();
    discover(dir.as_ref(), &mut files)?;
    // Descriptors first, then other refsets; core components lead.
    files.sort_by_key(|(path, component)| (file_priority(component), path.clone()));

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let mut summary = ImportSummary::default();

    std::thread::scope(|scope| -> Rf2Result<()> {
        let (tx, rx) = sync_channel::<WorkItem>(CHANNEL_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = Arc::clone(&rx);
                scope.spawn(move || worker(store, rx))
            })
            .collect();

        let produced = produce(&mut summary, &files, tx);

        for handle in handles {
            let worker_summary = handle.join().expect("import worker panicked")?;
            summary.merge(&worker_summary);
        }
        produced
    })?;

    info!(
        files = summary.files,
        rows = summary.rows,
        parse_errors = summary.parse_errors,
        verhoeff_failures = summary.verhoeff_failures,
        "RF2 import complete"
    );
    Ok(summary)
}

fn discover(dir: &Path, out: &mut Vec<(PathBuf, ComponentFile)>) -> Rf2Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            discover(&path, out)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match parse_filename(name) {
            Ok(decoded) => match decoded.component {
                ComponentFile::Unknown | ComponentFile::Identifier => {
                    debug!(file = name, "skipping unhandled RF2 file");
                }
                component => out.push((path, component)),
            },
            Err(_) => debug!(file = name, "not an RF2 file"),
        }
    }
    Ok(())
}

fn file_priority(component: &ComponentFile) -> u8 {
    match component {
        ComponentFile::Concept => 0,
        ComponentFile::Description | ComponentFile::TextDefinition => 1,
        ComponentFile::Relationship
        | ComponentFile::StatedRelationship
        | ComponentFile::ConcreteRelationship => 2,
        ComponentFile::Refset { hint, .. } if *hint == RefsetKind::RefsetDescriptor => 3,
        ComponentFile::Refset { .. } => 4,
        ComponentFile::Identifier | ComponentFile::Unknown => 5,
    }
}

/// Reads each file and streams row batches to the workers. The sender is
/// dropped on return (or cancellation), which drains the pool.
fn produce(
    summary: &mut ImportSummary,
    files: &[(PathBuf, ComponentFile)],
    tx: SyncSender<WorkItem>,
) -> Rf2Result<()> {
    for (path, component) in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<non-utf8>")
            .to_string();
        info!(file = %name, "importing");
        let context = Arc::new(FileContext {
            name,
            component: component.clone(),
        });

        let reader = BufReader::new(File::open(path)?);
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            if line_number == 0 || line.is_empty() {
                continue;
            }
            summary.rows += 1;
            batch.push(line);
            if batch.len() == BATCH_SIZE {
                let lines = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
                if tx
                    .send(WorkItem {
                        file: Arc::clone(&context),
                        lines,
                    })
                    .is_err()
                {
                    // A worker died on a store error; it will report it.
                    return Ok(());
                }
            }
        }
        if !batch.is_empty()
            && tx
                .send(WorkItem {
                    file: Arc::clone(&context),
                    lines: batch,
                })
                .is_err()
        {
            return Ok(());
        }
        summary.files += 1;
    }
    Ok(())
}

/// Parses and writes work items until the channel closes.
fn worker(store: &Store, rx: Arc<Mutex<Receiver<WorkItem>>>) -> Rf2Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut descriptor_kinds: std::collections::HashMap<SctId, RefsetKind> =
        std::collections::HashMap::new();

    loop {
        let item = match rx.lock().expect("import channel poisoned").recv() {
            Ok(item) => item,
            Err(_) => return Ok(summary),
        };
        write_batch(store, &item, &mut summary, &mut descriptor_kinds)?;
    }
}

fn write_batch(
    store: &Store,
    item: &WorkItem,
    summary: &mut ImportSummary,
    descriptor_kinds: &mut std::collections::HashMap<SctId, RefsetKind>,
) -> Rf2Result<()> {
    match &item.file.component {
        ComponentFile::Concept => {
            let mut records = Vec::with_capacity(item.lines.len());
            for line in &item.lines {
                match row::parse_concept(line) {
                    Ok(concept) => {
                        check_verhoeff(concept.id, &item.file.name, summary);
                        records.push(concept);
                    }
                    Err(err) => note_parse_error(err, &item.file.name, summary),
                }
            }
            summary.concepts += records.len();
            store.write_concepts(&records)?;
        }
        ComponentFile::Description | ComponentFile::TextDefinition => {
            let mut records = Vec::with_capacity(item.lines.len());
            for line in &item.lines {
                match row::parse_description(line) {
                    Ok(description) => {
                        check_verhoeff(description.id, &item.file.name, summary);
                        records.push(description);
                    }
                    Err(err) => note_parse_error(err, &item.file.name, summary),
                }
            }
            summary.descriptions += records.len();
            store.write_descriptions(&records)?;
        }
        ComponentFile::Relationship | ComponentFile::StatedRelationship => {
            let mut records = Vec::with_capacity(item.lines.len());
            for line in &item.lines {
                match row::parse_relationship(line) {
                    Ok(rel) => {
                        check_verhoeff(rel.id, &item.file.name, summary);
                        records.push(rel);
                    }
                    Err(err) => note_parse_error(err, &item.file.name, summary),
                }
            }
            summary.relationships += records.len();
            store.write_relationships(&records)?;
        }
        ComponentFile::ConcreteRelationship => {
            let mut records = Vec::with_capacity(item.lines.len());
            for line in &item.lines {
                match row::parse_concrete_relationship(line) {
                    Ok(rel) => {
                        check_verhoeff(rel.id, &item.file.name, summary);
                        records.push(rel);
                    }
                    Err(err) => note_parse_error(err, &item.file.name, summary),
                }
            }
            summary.concrete_relationships += records.len();
            store.write_concrete_relationships(&records)?;
        }
        ComponentFile::Refset { pattern, hint } => {
            let mut records = Vec::with_capacity(item.lines.len());
            for line in &item.lines {
                let parsed = match row::parse_refset_row(line, pattern) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        note_parse_error(err, &item.file.name, summary);
                        continue;
                    }
                };
                check_verhoeff(parsed.referenced_component_id, &item.file.name, summary);
                let kind = match descriptor_kinds.get(&parsed.refset_id) {
                    Some(kind) => *kind,
                    None => {
                        let prefix = store.refset_descriptor_prefix(parsed.refset_id)?;
                        let kind = match kind_for_prefix(&prefix) {
                            RefsetKind::Other => *hint,
                            described => described,
                        };
                        descriptor_kinds.insert(parsed.refset_id, kind);
                        kind
                    }
                };
                match reify(parsed, kind) {
                    Ok(record) => records.push(record),
                    Err(err) => note_parse_error(err, &item.file.name, summary),
                }
            }
            summary.refset_items += records.len();
            store.write_refset_items(&records)?;
        }
        ComponentFile::Identifier | ComponentFile::Unknown => {}
    }
    Ok(())
}

fn check_verhoeff(id: SctId, file: &str, summary: &mut ImportSummary) {
    if !verhoeff_valid(id) {
        summary.verhoeff_failures += 1;
        warn!(file, id, "identifier fails Verhoeff validation; row admitted");
    }
}

fn note_parse_error(err: Rf2Error, file: &str, summary: &mut ImportSummary) {
    summary.parse_errors += 1;
    warn!(file, %err, "dropped row");
}
