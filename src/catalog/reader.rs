//! Contract between the catalog and whatever turns durable technique
//! definitions into snapshots.

use crate::catalog::identity::{TechniqueId, TemplateId};
use crate::catalog::model::TechniquesInfo;
use std::collections::BTreeSet;
use std::io::{self, Read};
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading the technique library.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} failed schema validation:\n{details}", path.display())]
    Schema { path: PathBuf, details: String },

    #[error("invalid technique definition {}: {message}", path.display())]
    InvalidDefinition { path: PathBuf, message: String },

    #[error("inconsistent technique library: {0}")]
    Inconsistent(String),
}

/// Source of technique snapshots.
///
/// `read_techniques` is the expensive full read; `modified_techniques` is the
/// cheap staleness check the catalog runs before deciding to reload. Both may
/// block on I/O.
pub trait TechniqueReader: Send + Sync {
    /// Build a complete snapshot of the library.
    fn read_techniques(&self) -> Result<TechniquesInfo, ReaderError>;

    /// Ids whose definition changed, appeared or disappeared since the last
    /// successful [`TechniqueReader::read_techniques`]. Empty means nothing
    /// changed.
    fn modified_techniques(&self) -> Result<BTreeSet<TechniqueId>, ReaderError>;

    /// Open a template resource, or `Ok(None)` when the template does not
    /// exist. The stream is closed when the returned box is dropped.
    fn open_template(&self, id: &TemplateId) -> Result<Option<Box<dyn Read + Send>>, ReaderError>;
}
