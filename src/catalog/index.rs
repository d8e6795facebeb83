//! Assembles and checks a [`TechniquesInfo`] snapshot.
//!
//! Readers register categories and techniques in any order; `build` resolves
//! parent links, fills each category's child sets, and rejects anything that
//! would break the snapshot invariant (duplicate ids, dangling categories) so a
//! half-consistent library is never published.

use crate::catalog::identity::{SubCategoryId, TechniqueCategoryId};
use crate::catalog::model::{TechniqueCategory, TechniquesInfo};
use crate::catalog::reader::ReaderError;
use crate::technique::Technique;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug)]
/// Collects the pieces of one snapshot before validation.
pub struct TechniquesInfoBuilder {
    root: TechniqueCategory,
    sub_categories: BTreeMap<SubCategoryId, TechniqueCategory>,
    techniques: Vec<(TechniqueCategoryId, Technique)>,
}

impl TechniquesInfoBuilder {
    pub fn new(root: TechniqueCategory) -> Self {
        Self {
            root,
            sub_categories: BTreeMap::new(),
            techniques: Vec::new(),
        }
    }

    /// Register a sub-category under `parent`.
    ///
    /// Child sets on the node are ignored and rebuilt by [`Self::build`].
    pub fn add_category(&mut self, category: TechniqueCategory) -> Result<&mut Self, ReaderError> {
        let TechniqueCategoryId::Sub(id) = category.id.clone() else {
            return Err(ReaderError::Inconsistent(
                "the root category cannot be registered as a sub-category".to_string(),
            ));
        };
        if category.parent.is_none() {
            return Err(ReaderError::Inconsistent(format!(
                "category {id} has no parent"
            )));
        }
        if self.sub_categories.contains_key(&id) {
            return Err(ReaderError::Inconsistent(format!(
                "duplicate category {id}"
            )));
        }
        self.sub_categories.insert(id, category);
        Ok(self)
    }

    pub fn add_technique(&mut self, category: TechniqueCategoryId, technique: Technique) -> &mut Self {
        self.techniques.push((category, technique));
        self
    }

    pub fn build(self) -> Result<TechniquesInfo, ReaderError> {
        let TechniquesInfoBuilder {
            mut root,
            mut sub_categories,
            techniques,
        } = self;

        root.sub_categories.clear();
        root.techniques.clear();
        for category in sub_categories.values_mut() {
            category.sub_categories.clear();
            category.techniques.clear();
        }

        let known: BTreeSet<SubCategoryId> = sub_categories.keys().cloned().collect();
        let mut links: Vec<(TechniqueCategoryId, SubCategoryId)> = Vec::new();
        for (id, category) in &sub_categories {
            let parent = category
                .parent
                .clone()
                .unwrap_or(TechniqueCategoryId::Root);
            if let TechniqueCategoryId::Sub(parent_id) = &parent {
                if !known.contains(parent_id) {
                    return Err(ReaderError::Inconsistent(format!(
                        "category {id} references unknown parent {parent_id}"
                    )));
                }
            }
            links.push((parent, id.clone()));
        }
        for id in sub_categories.keys() {
            check_reaches_root(id, &sub_categories)?;
        }
        for (parent, child) in links {
            category_mut(&mut root, &mut sub_categories, &parent)
                .sub_categories
                .insert(child);
        }

        let mut by_name = BTreeMap::new();
        let mut techniques_category = BTreeMap::new();
        for (category_id, technique) in techniques {
            let id = technique.id.clone();
            if techniques_category.contains_key(&id) {
                return Err(ReaderError::Inconsistent(format!(
                    "duplicate technique {id}"
                )));
            }
            if let TechniqueCategoryId::Sub(sub) = &category_id {
                if !known.contains(sub) {
                    return Err(ReaderError::Inconsistent(format!(
                        "technique {id} references unknown category {sub}"
                    )));
                }
            }
            category_mut(&mut root, &mut sub_categories, &category_id)
                .techniques
                .insert(id.clone());
            by_name
                .entry(id.name.clone())
                .or_insert_with(BTreeMap::new)
                .insert(id.version.clone(), Arc::new(technique));
            techniques_category.insert(id, category_id);
        }

        Ok(TechniquesInfo {
            root_category: root,
            techniques: by_name,
            techniques_category,
            sub_categories,
        })
    }
}

/// Follow parent links from `id` up to the root, rejecting cycles.
///
/// Every parent is already known to exist.
fn check_reaches_root(
    id: &SubCategoryId,
    subs: &BTreeMap<SubCategoryId, TechniqueCategory>,
) -> Result<(), ReaderError> {
    let mut seen = BTreeSet::new();
    let mut current = id;
    loop {
        if !seen.insert(current) {
            return Err(ReaderError::Inconsistent(format!(
                "category {id} is part of a parent cycle through {current}"
            )));
        }
        match subs.get(current).and_then(|category| category.parent.as_ref()) {
            Some(TechniqueCategoryId::Sub(parent)) => current = parent,
            Some(TechniqueCategoryId::Root) | None => return Ok(()),
        }
    }
}

// Callers check existence first; an unknown sub id falls back to the root.
fn category_mut<'a>(
    root: &'a mut TechniqueCategory,
    subs: &'a mut BTreeMap<SubCategoryId, TechniqueCategory>,
    id: &TechniqueCategoryId,
) -> &'a mut TechniqueCategory {
    match id {
        TechniqueCategoryId::Root => root,
        TechniqueCategoryId::Sub(sub) => match subs.get_mut(sub) {
            Some(category) => category,
            None => root,
        },
    }
}
