//! # snomed-service
//!
//! The terminology service facade: one handle owning the component store,
//! the search index and the locale matcher, exposing component lookup,
//! locale-aware description resolution, free-text search and ECL
//! realization.
//!
//! A service is rebuilt in two phases: [`Service::import_rf2`] ingests
//! release files and rebuilds the IS-A closure, then
//! [`Service::build_index`] writes a fresh search index — a hard barrier,
//! since documents denormalize the closure. Queries observe a consistent
//! index view once the build commits.
//!
//! ## Example
//!
//! ```ignore
//! use snomed_service::{Service, SearchRequest};
//!
//! let mut service = Service::open("/var/lib/snomed")?;
//! service.import_rf2("/data/SnomedCT_InternationalRF2")?;
//! service.build_index()?;
//!
//! let appendicectomy = service.get_preferred_synonym(80146002, "en-GB")?;
//! let hits = service.search(&SearchRequest {
//!     s: Some("mult scl".into()),
//!     max_hits: 10,
//!     ..Default::default()
//! }, "en-GB")?;
//! ```

#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use roaring::RoaringTreemap;
use thiserror::Error;
use tracing::info;

use snomed_rf2::{import_rf2, Rf2Error};
use snomed_search::{search as run_search, EclEvaluator, QueryContext, SearchError, SearchIndex};
use snomed_store::{LanguageMatcher, Store, StoreError};
use snomed_types::{Concept, Description, RefsetItem, Relationship, SctId};

pub use snomed_rf2::ImportSummary;
pub use snomed_search::{
    AttributeConstraint, AttributeGroup, AttributeValue, Cardinality, ComparisonOperator,
    ConcreteComparand, EclExpression, Refinement, SearchHit, SearchMode, SearchRequest,
};
pub use snomed_types::well_known;

/// Realized ECL constraints cached per service handle.
const ECL_CACHE_ENTRIES: usize = 512;

/// Errors surfaced by the service facade.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Component store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Ingestion failure.
    #[error(transparent)]
    Rf2(#[from] Rf2Error),

    /// Search or ECL failure.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// A search or ECL operation was attempted before the index was
    /// built.
    #[error("search index not built; run build_index after import")]
    IndexNotBuilt,
}

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// An open terminology service.
///
/// Cheap to share behind an `Arc`; all operations take `&self`. The store
/// and index release their file handles when the service drops.
pub struct Service {
    store: Store,
    index: RwLock<Option<SearchIndex>>,
    matcher: RwLock<LanguageMatcher>,
    ecl_cache: Mutex<LruCache<String, RoaringTreemap>>,
    index_path: PathBuf,
}

impl Service {
    /// Opens a service rooted at `path`. The store lives in `store.db`
    /// and the search index in `search.idx` under that root; the index is
    /// opened when present and left unbuilt otherwise.
    pub fn open<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        let root = path.as_ref();
        let store = Store::open(root.join("store.db"))?;
        let index_path = root.join("search.idx");
        let index = if index_path.exists() {
            Some(SearchIndex::open(&index_path)?)
        } else {
            None
        };
        let matcher = store.language_matcher()?;
        info!(root = %root.display(), index_built = index.is_some(), "opened terminology service");
        Ok(Service {
            store,
            index: RwLock::new(index),
            matcher: RwLock::new(matcher),
            ecl_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(ECL_CACHE_ENTRIES).expect("cache size"),
            )),
            index_path,
        })
    }

    /// Closes the service, releasing store and index handles.
    pub fn close(self) {}

    /// The underlying component store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    // =========================================================================
    // Snapshot lifecycle
    // =========================================================================

    /// Imports an RF2 release directory and rebuilds the IS-A closure and
    /// locale matcher. Call [`Service::build_index`] afterwards.
    pub fn import_rf2<P: AsRef<Path>>(&self, dir: P) -> ServiceResult<ImportSummary> {
        let summary = import_rf2(&self.store, dir)?;
        self.store.build_closure()?;
        self.store.log_counts()?;
        *self.matcher.write() = self.store.language_matcher()?;
        self.ecl_cache.lock().clear();
        Ok(summary)
    }

    /// Rebuilds the search index from the store. Must run after all
    /// imports have completed.
    pub fn build_index(&self) -> ServiceResult<()> {
        let index = SearchIndex::build(&self.store, &self.index_path)?;
        *self.index.write() = Some(index);
        self.ecl_cache.lock().clear();
        Ok(())
    }

    // =========================================================================
    // Component lookup
    // =========================================================================

    /// Fetches a concept; `None` when the id is not present.
    pub fn get_concept(&self, id: SctId) -> ServiceResult<Option<Concept>> {
        Ok(self.store.concept(id)?)
    }

    /// Fetches a description by id.
    pub fn get_description(&self, id: SctId) -> ServiceResult<Option<Description>> {
        Ok(self.store.description(id)?)
    }

    /// All descriptions of a concept.
    pub fn get_concept_descriptions(&self, id: SctId) -> ServiceResult<Vec<Description>> {
        Ok(self.store.concept_descriptions(id)?)
    }

    /// The concept's active outbound relationships.
    pub fn get_parent_relationships(&self, id: SctId) -> ServiceResult<Vec<Relationship>> {
        Ok(self.store.parent_relationships(id)?)
    }

    /// The concept's active outbound relationships of one type.
    pub fn get_parent_relationships_of_type(
        &self,
        id: SctId,
        type_id: SctId,
    ) -> ServiceResult<Vec<Relationship>> {
        Ok(self.store.parent_relationships_of_type(id, type_id)?)
    }

    /// Destination concepts for relationships of the given type or any of
    /// its subtypes (attribute subsumption over the relationship-type
    /// hierarchy).
    pub fn get_parent_relationships_expanded(
        &self,
        id: SctId,
        type_id: SctId,
    ) -> ServiceResult<std::collections::BTreeSet<SctId>> {
        Ok(self.store.parent_relationships_expanded(id, type_id)?)
    }

    /// Refset members referencing a component; a `refset_id` of zero
    /// means any refset.
    pub fn get_component_refset_items(
        &self,
        component_id: SctId,
        refset_id: SctId,
    ) -> ServiceResult<Vec<RefsetItem>> {
        Ok(self.store.component_refset_items(component_id, refset_id)?)
    }

    /// Refsets a component is an active member of.
    pub fn get_component_refset_ids(
        &self,
        component_id: SctId,
    ) -> ServiceResult<std::collections::BTreeSet<SctId>> {
        Ok(self.store.component_refset_ids(component_id)?)
    }

    // =========================================================================
    // Locale-aware descriptions
    // =========================================================================

    /// Resolves a BCP-47 priority list to language-refset ids under the
    /// current snapshot.
    pub fn match_locales(&self, locale: &str) -> Vec<SctId> {
        self.matcher.read().match_locales(locale)
    }

    /// The preferred synonym of a concept under a locale priority list,
    /// e.g. `"en-GB,en;q=0.9"`.
    pub fn get_preferred_synonym(
        &self,
        id: SctId,
        locale: &str,
    ) -> ServiceResult<Option<Description>> {
        let refsets = self.match_locales(locale);
        Ok(self.store.preferred_synonym(id, &refsets)?)
    }

    /// The fully specified name of a concept under a locale priority
    /// list.
    pub fn get_fully_specified_name(
        &self,
        id: SctId,
        locale: &str,
    ) -> ServiceResult<Option<Description>> {
        let refsets = self.match_locales(locale);
        Ok(self.store.fully_specified_name(id, &refsets)?)
    }

    // =========================================================================
    // Search and ECL
    // =========================================================================

    /// Runs a search request; `locale` orders preferred-term resolution.
    pub fn search(&self, request: &SearchRequest, locale: &str) -> ServiceResult<Vec<SearchHit>> {
        let refsets = self.match_locales(locale);
        let guard = self.index.read();
        let index = guard.as_ref().ok_or(ServiceError::IndexNotBuilt)?;
        let ctx = QueryContext::new(index, &self.store);
        Ok(run_search(&ctx, request, &refsets)?)
    }

    /// Realizes an ECL expression into its concept-id set. Results are
    /// cached per normalized expression until the next import or index
    /// build.
    pub fn realize_ecl(&self, expr: &EclExpression) -> ServiceResult<RoaringTreemap> {
        let key = expr.to_string();
        if let Some(cached) = self.ecl_cache.lock().get(&key) {
            return Ok(cached.clone());
        }
        let guard = self.index.read();
        let index = guard.as_ref().ok_or(ServiceError::IndexNotBuilt)?;
        let ctx = QueryContext::new(index, &self.store);
        let realized = EclEvaluator::new(ctx).realize(expr)?;
        self.ecl_cache.lock().put(key, realized.clone());
        Ok(realized)
    }

    // =========================================================================
    // History and maps
    // =========================================================================

    /// Active historical associations referencing a component, grouped by
    /// association refset.
    pub fn historical_associations(
        &self,
        id: SctId,
    ) -> ServiceResult<BTreeMap<SctId, Vec<RefsetItem>>> {
        Ok(self.store.history(id)?)
    }

    /// Map members of `refset_id` whose target code equals `target`.
    pub fn reverse_map(&self, refset_id: SctId, target: &str) -> ServiceResult<Vec<RefsetItem>> {
        Ok(self.store.reverse_map(refset_id, target)?)
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("index_built", &self.index.read().is_some())
            .finish_non_exhaustive()
    }
}
