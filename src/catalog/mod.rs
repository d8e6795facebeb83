//! Technique catalog.
//!
//! A [`TechniqueReader`] produces immutable [`TechniquesInfo`] snapshots from
//! some backing store (the bundled [`FsTechniqueReader`] reads a directory of
//! JSON descriptors). [`TechniqueRepository`] holds the current snapshot,
//! reloads it on demand when the reader reports changes, and notifies
//! registered [`TechniquesLibraryUpdateNotification`] subscribers.

pub mod descriptor;
pub mod fs_reader;
pub mod identity;
pub mod index;
pub mod model;
pub mod notify;
pub mod reader;
pub mod repository;

pub use fs_reader::{FsReaderOptions, FsTechniqueReader};
pub use identity::{
    SubCategoryId, TechniqueCategoryId, TechniqueId, TechniqueName, TechniqueVersion, TemplateId,
};
pub use index::TechniquesInfoBuilder;
pub use model::{TechniqueCategory, TechniquesInfo};
pub use notify::{EventActor, TechniquesLibraryUpdateNotification};
pub use reader::{ReaderError, TechniqueReader};
pub use repository::{CatalogError, TechniqueRepository};
