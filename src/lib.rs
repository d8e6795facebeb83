//! Technique metadata model and live technique catalog.
//!
//! [`spec`] describes what a technique lets users configure: a tree of
//! sections and variable specifications. [`technique`] bundles that tree with
//! templates and identity. [`catalog`] keeps an atomically swappable snapshot
//! of every known technique, reloads it from a [`catalog::TechniqueReader`]
//! when the backing store changes, and notifies subscribers. [`config`]
//! locates the on-disk library.

pub mod catalog;
pub mod config;
pub mod spec;
pub mod technique;

pub use catalog::{
    CatalogError, EventActor, FsReaderOptions, FsTechniqueReader, ReaderError, SubCategoryId,
    TechniqueCategory, TechniqueCategoryId, TechniqueId, TechniqueName, TechniqueReader,
    TechniqueRepository, TechniqueVersion, TechniquesInfo, TechniquesLibraryUpdateNotification,
    TemplateId,
};
pub use config::find_techniques_root;
pub use spec::{Section, SectionChild, SpecError, SpecNode, Variable, VariableKind, VariableSpec};
pub use technique::{Technique, TemplateRef};
