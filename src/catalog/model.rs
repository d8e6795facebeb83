//! Immutable catalog snapshot: techniques, their categories, and the
//! category tree.
//!
//! A [`TechniquesInfo`] is only produced by
//! [`TechniquesInfoBuilder::build`](crate::catalog::TechniquesInfoBuilder::build),
//! which checks the cross-map invariants once; afterwards the snapshot is
//! shared read-only behind an `Arc`.

use crate::catalog::identity::{
    SubCategoryId, TechniqueCategoryId, TechniqueId, TechniqueName, TechniqueVersion,
};
use crate::technique::Technique;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
/// One node of the category tree.
pub struct TechniqueCategory {
    pub id: TechniqueCategoryId,
    pub name: String,
    pub description: String,
    pub is_system: bool,
    /// `None` only for the root.
    pub parent: Option<TechniqueCategoryId>,
    pub sub_categories: BTreeSet<SubCategoryId>,
    pub techniques: BTreeSet<TechniqueId>,
}

impl TechniqueCategory {
    pub fn root(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: TechniqueCategoryId::Root,
            name: name.into(),
            description: description.into(),
            is_system: false,
            parent: None,
            sub_categories: BTreeSet::new(),
            techniques: BTreeSet::new(),
        }
    }
}

#[derive(Debug)]
/// Everything one full read of the technique library produced.
///
/// Invariant: every technique in `techniques` has exactly one entry in
/// `techniques_category`, and that entry resolves to the root or to a key of
/// `sub_categories`.
pub struct TechniquesInfo {
    pub(crate) root_category: TechniqueCategory,
    pub(crate) techniques: BTreeMap<TechniqueName, BTreeMap<TechniqueVersion, Arc<Technique>>>,
    pub(crate) techniques_category: BTreeMap<TechniqueId, TechniqueCategoryId>,
    pub(crate) sub_categories: BTreeMap<SubCategoryId, TechniqueCategory>,
}

impl TechniquesInfo {
    /// Snapshot holding only an empty root category.
    pub fn empty() -> Self {
        Self {
            root_category: TechniqueCategory::root("Techniques", ""),
            techniques: BTreeMap::new(),
            techniques_category: BTreeMap::new(),
            sub_categories: BTreeMap::new(),
        }
    }

    pub fn root_category(&self) -> &TechniqueCategory {
        &self.root_category
    }

    pub fn techniques(
        &self,
    ) -> &BTreeMap<TechniqueName, BTreeMap<TechniqueVersion, Arc<Technique>>> {
        &self.techniques
    }

    pub fn techniques_category(&self) -> &BTreeMap<TechniqueId, TechniqueCategoryId> {
        &self.techniques_category
    }

    pub fn sub_categories(&self) -> &BTreeMap<SubCategoryId, TechniqueCategory> {
        &self.sub_categories
    }

    /// Number of technique versions in the snapshot.
    pub fn len(&self) -> usize {
        self.techniques_category.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques_category.is_empty()
    }

    pub fn get(&self, id: &TechniqueId) -> Option<&Arc<Technique>> {
        self.techniques.get(&id.name)?.get(&id.version)
    }

    pub fn versions(&self, name: &TechniqueName) -> Option<&BTreeMap<TechniqueVersion, Arc<Technique>>> {
        self.techniques.get(name)
    }

    /// Resolve a category id against the root and the sub-category map.
    pub fn category(&self, id: &TechniqueCategoryId) -> Option<&TechniqueCategory> {
        match id {
            TechniqueCategoryId::Root => Some(&self.root_category),
            TechniqueCategoryId::Sub(sub) => self.sub_categories.get(sub),
        }
    }

    /// Every technique, flattened across names and versions.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Technique>> {
        self.techniques.values().flat_map(|versions| versions.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_only_has_a_root() {
        let info = TechniquesInfo::empty();
        assert!(info.is_empty());
        assert_eq!(info.len(), 0);
        assert_eq!(
            info.category(&TechniqueCategoryId::Root).map(|c| c.name.as_str()),
            Some("Techniques")
        );
        assert!(
            info.category(&TechniqueCategoryId::Sub(SubCategoryId("x".into())))
                .is_none()
        );
        assert_eq!(info.iter().count(), 0);
    }
}
