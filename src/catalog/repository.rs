//! Live technique catalog.
//!
//! The repository owns the only mutable piece of state: the reference to the
//! current [`TechniquesInfo`] snapshot. Readers load that reference without
//! blocking and keep using the snapshot they got even if a reload publishes a
//! new one meanwhile. Reloads run one at a time: the reload lock is held
//! across "read library, publish snapshot, notify subscribers", so two
//! overlapping `update` calls serialize instead of racing to publish.

use crate::catalog::identity::{
    SubCategoryId, TechniqueCategoryId, TechniqueId, TechniqueName, TechniqueVersion, TemplateId,
};
use crate::catalog::model::{TechniqueCategory, TechniquesInfo};
use crate::catalog::notify::{EventActor, TechniquesLibraryUpdateNotification};
use crate::catalog::reader::{ReaderError, TechniqueReader};
use crate::technique::Technique;
use arc_swap::ArcSwap;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures surfaced by [`TechniqueRepository`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The reader failed during `update`; the previous snapshot is still served.
    #[error("technique library reload failed: {0}")]
    Reload(#[from] ReaderError),

    /// Both the initial read and the recovery reload failed.
    #[error("technique library could not be loaded ({first}); recovery reload failed too")]
    Initialization {
        first: ReaderError,
        #[source]
        retry: ReaderError,
    },

    #[error("technique {0} is not in the library")]
    UnknownTechnique(TechniqueId),

    #[error("technique category {0} is not in the library")]
    CategoryNotFound(SubCategoryId),

    #[error("opening template {id}: {source}")]
    Template {
        id: TemplateId,
        #[source]
        source: ReaderError,
    },
}

/// In-memory, reloadable view of the technique library.
pub struct TechniqueRepository {
    reader: Box<dyn TechniqueReader>,
    snapshot: ArcSwap<TechniquesInfo>,
    reload_lock: Mutex<()>,
    callbacks: RwLock<Vec<Arc<dyn TechniquesLibraryUpdateNotification>>>,
}

impl TechniqueRepository {
    /// Build the catalog with a full read of the library.
    ///
    /// A failed first read gets exactly one recovery attempt through the
    /// reload path before construction fails.
    pub fn new<R>(reader: R) -> Result<Self, CatalogError>
    where
        R: TechniqueReader + 'static,
    {
        let initial = match reader.read_techniques() {
            Ok(info) => info,
            Err(first) => {
                warn!(error = %first, "initial technique library read failed; rebuilding");
                match load(&reader, None) {
                    Ok(Some((_, info))) => info,
                    // `load` without a current snapshot always reads.
                    Ok(None) => TechniquesInfo::empty(),
                    Err(retry) => {
                        error!(error = %retry, "technique library rebuild failed");
                        return Err(CatalogError::Initialization { first, retry });
                    }
                }
            }
        };
        info!(techniques = initial.len(), "technique library loaded");

        Ok(Self {
            reader: Box::new(reader),
            snapshot: ArcSwap::from_pointee(initial),
            reload_lock: Mutex::new(()),
            callbacks: RwLock::new(Vec::new()),
        })
    }

    /// Reload the library if the reader reports changes.
    ///
    /// Returns the modified ids, empty when nothing changed (the snapshot is
    /// then left untouched and nobody is notified). On a reader failure the
    /// previous snapshot stays in place.
    pub fn update(
        &self,
        actor: &EventActor,
        reason: Option<&str>,
    ) -> Result<BTreeSet<TechniqueId>, CatalogError> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let current = self.snapshot.load_full();

        match load(self.reader.as_ref(), Some(current.as_ref())) {
            Ok(None) => {
                debug!(%actor, "technique library unchanged; nothing to reload");
                Ok(BTreeSet::new())
            }
            Ok(Some((modified, info))) => {
                let count = info.len();
                self.snapshot.store(Arc::new(info));
                info!(
                    techniques = count,
                    modified = modified.len(),
                    %actor,
                    reason = reason.unwrap_or(""),
                    "technique library reloaded"
                );
                self.notify(&modified, actor, reason);
                Ok(modified)
            }
            Err(err) => {
                error!(error = %err, %actor, "technique library reload failed; keeping previous snapshot");
                Err(CatalogError::Reload(err))
            }
        }
    }

    /// Add a subscriber for future reloads. Duplicates are kept.
    pub fn register_callback(&self, callback: Arc<dyn TechniquesLibraryUpdateNotification>) {
        self.callbacks
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .push(callback);
    }

    /// The snapshot currently served.
    pub fn snapshot(&self) -> Arc<TechniquesInfo> {
        self.snapshot.load_full()
    }

    pub fn get_all(&self) -> BTreeMap<TechniqueId, Arc<Technique>> {
        self.snapshot()
            .iter()
            .map(|technique| (technique.id.clone(), Arc::clone(technique)))
            .collect()
    }

    /// Known versions of `name`, empty when the name is unknown.
    pub fn get_technique_versions(&self, name: &TechniqueName) -> BTreeSet<TechniqueVersion> {
        self.snapshot()
            .versions(name)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve every id, in input order.
    ///
    /// Fails on the first id that is not in the library.
    pub fn get_by_ids(&self, ids: &[TechniqueId]) -> Result<Vec<Arc<Technique>>, CatalogError> {
        let snapshot = self.snapshot();
        ids.iter()
            .map(|id| {
                snapshot
                    .get(id)
                    .cloned()
                    .ok_or_else(|| CatalogError::UnknownTechnique(id.clone()))
            })
            .collect()
    }

    pub fn get(&self, id: &TechniqueId) -> Option<Arc<Technique>> {
        let found = self.snapshot().get(id).cloned();
        if found.is_none() {
            debug!(technique = %id, "technique not found in library");
        }
        found
    }

    /// The highest version of `name`.
    pub fn get_last_technique_by_name(&self, name: &TechniqueName) -> Option<Arc<Technique>> {
        self.snapshot()
            .versions(name)?
            .values()
            .next_back()
            .cloned()
    }

    /// Root of the category tree.
    pub fn get_technique_library(&self) -> TechniqueCategory {
        self.snapshot().root_category().clone()
    }

    pub fn get_technique_category(
        &self,
        id: &TechniqueCategoryId,
    ) -> Result<TechniqueCategory, CatalogError> {
        let snapshot = self.snapshot();
        match id {
            TechniqueCategoryId::Root => Ok(snapshot.root_category().clone()),
            TechniqueCategoryId::Sub(sub) => snapshot
                .sub_categories()
                .get(sub)
                .cloned()
                .ok_or_else(|| CatalogError::CategoryNotFound(sub.clone())),
        }
    }

    /// Category holding technique `id`, if both the technique and its
    /// category are known.
    pub fn get_parent_technique_category_for_technique(
        &self,
        id: &TechniqueId,
    ) -> Option<TechniqueCategory> {
        let snapshot = self.snapshot();
        let category_id = snapshot.techniques_category().get(id)?;
        snapshot.category(category_id).cloned()
    }

    /// Hand the content of a template to `consume`.
    ///
    /// `consume` receives `None` when the template does not exist. The stream
    /// is released when `consume` returns, whether it read everything or not.
    pub fn with_template_content<T, F>(&self, id: &TemplateId, consume: F) -> Result<T, CatalogError>
    where
        F: FnOnce(Option<&mut dyn Read>) -> T,
    {
        let stream = self
            .reader
            .open_template(id)
            .map_err(|source| CatalogError::Template {
                id: id.clone(),
                source,
            })?;
        match stream {
            Some(mut stream) => Ok(consume(Some(stream.as_mut()))),
            None => Ok(consume(None)),
        }
    }

    fn notify(&self, modified: &BTreeSet<TechniqueId>, actor: &EventActor, reason: Option<&str>) {
        // Snapshot the list so a subscriber may register others while running.
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone();

        for callback in callbacks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                callback.updated_techniques(modified, actor, reason)
            }));
            match outcome {
                Ok(Ok(())) => {
                    debug!(subscriber = callback.name(), "subscriber notified of library update");
                }
                Ok(Err(err)) => {
                    error!(
                        subscriber = callback.name(),
                        error = %format!("{err:#}"),
                        "subscriber failed to process technique library update"
                    );
                }
                Err(_) => {
                    error!(
                        subscriber = callback.name(),
                        "subscriber panicked while processing technique library update"
                    );
                }
            }
        }
    }
}

/// Ask the reader for changes and, when needed, a fresh full snapshot.
///
/// Returns `Ok(None)` when a snapshot exists and nothing changed.
fn load(
    reader: &dyn TechniqueReader,
    current: Option<&TechniquesInfo>,
) -> Result<Option<(BTreeSet<TechniqueId>, TechniquesInfo)>, ReaderError> {
    let modified = reader.modified_techniques()?;
    if modified.is_empty() && current.is_some() {
        return Ok(None);
    }
    let info = reader.read_techniques()?;
    Ok(Some((modified, info)))
}
