//! Sections: the container nodes of the specification tree.
//!
//! Trees are owned and immutable once built. Every transformation returns a
//! fresh tree and leaves the receiver untouched, so a published tree can be
//! shared across threads behind an `Arc` without locking.

use crate::spec::SpecError;
use crate::spec::variable::VariableSpec;
use std::collections::BTreeSet;

/// A child of a section: either a nested section or a variable leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum SectionChild {
    Section(Section),
    Variable(VariableSpec),
}

/// Borrowed view of any node in a tree, as returned by [`Section::filter_by_name`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpecNode<'a> {
    Section(&'a Section),
    Variable(&'a VariableSpec),
}

impl SpecNode<'_> {
    pub fn name(&self) -> &str {
        match self {
            SpecNode::Section(section) => &section.name,
            SpecNode::Variable(variable) => variable.name(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Container node grouping variables and sub-sections.
pub struct Section {
    pub name: String,
    /// The whole block may be repeated within one technique application.
    pub is_multivalued: bool,
    pub is_component: bool,
    pub component_key: Option<String>,
    /// Display hint only.
    pub foldable: bool,
    pub description: String,
    pub children: Vec<SectionChild>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_multivalued: false,
            is_component: false,
            component_key: None,
            foldable: false,
            description: String::new(),
            children: Vec::new(),
        }
    }

    pub fn multivalued(mut self) -> Self {
        self.is_multivalued = true;
        self
    }

    pub fn component(mut self, key: Option<String>) -> Self {
        self.is_component = true;
        self.component_key = key;
        self
    }

    pub fn with_child(mut self, child: impl Into<SectionChild>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SectionChild>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Direct variable children, not descending into sub-sections.
    pub fn get_variables(&self) -> Vec<&VariableSpec> {
        self.children
            .iter()
            .filter_map(|child| match child {
                SectionChild::Variable(variable) => Some(variable),
                SectionChild::Section(_) => None,
            })
            .collect()
    }

    /// This section followed by every descendant section, pre-order.
    pub fn get_all_sections(&self) -> Vec<&Section> {
        let mut acc = Vec::new();
        collect_sections(self, &mut acc);
        acc
    }

    /// Every variable leaf in the subtree, pre-order.
    pub fn get_all_variables(&self) -> Vec<&VariableSpec> {
        let mut acc = Vec::new();
        collect_variables(self, &mut acc);
        acc
    }

    /// Every node named `name`, the receiver included, pre-order.
    pub fn filter_by_name(&self, name: &str) -> Vec<SpecNode<'_>> {
        let mut acc = Vec::new();
        collect_named(self, name, &mut acc);
        acc
    }

    /// Copy of this section keeping only the children accepted by `keep`.
    ///
    /// Kept sub-sections are filtered the same way; a rejected section is
    /// dropped with its whole subtree.
    pub fn filter_children<F>(&self, keep: F) -> Section
    where
        F: Fn(&SectionChild) -> bool,
    {
        filter_section(self, &keep)
    }

    pub fn copy_without_system_vars(&self) -> Section {
        self.filter_children(|child| match child {
            SectionChild::Variable(variable) => !variable.is_system(),
            SectionChild::Section(_) => true,
        })
    }

    /// Copy of this multivalued section where every variable below it is
    /// multivalued.
    ///
    /// # Panics
    ///
    /// When called on a section that is not multivalued.
    pub fn clone_variables_in_multivalued(&self) -> Result<Section, SpecError> {
        assert!(
            self.is_multivalued,
            "clone_variables_in_multivalued called on non-multivalued section '{}'",
            self.name
        );
        clone_multivalued_children(self, &self.name)
    }

    /// Structural checks a freshly parsed tree must pass.
    ///
    /// Rejects sibling sections sharing a name, sibling variables sharing a
    /// name, and multivalued sections nested below another multivalued one.
    pub fn validate(&self) -> Result<(), SpecError> {
        validate_section(self, None)
    }
}

impl SectionChild {
    pub fn name(&self) -> &str {
        match self {
            SectionChild::Section(section) => &section.name,
            SectionChild::Variable(variable) => variable.name(),
        }
    }

    /// A variable yields itself; a section yields its direct variables.
    pub fn get_variables(&self) -> Vec<&VariableSpec> {
        match self {
            SectionChild::Section(section) => section.get_variables(),
            SectionChild::Variable(variable) => vec![variable],
        }
    }

    pub fn get_all_sections(&self) -> Vec<&Section> {
        match self {
            SectionChild::Section(section) => section.get_all_sections(),
            SectionChild::Variable(_) => Vec::new(),
        }
    }

    pub fn get_all_variables(&self) -> Vec<&VariableSpec> {
        match self {
            SectionChild::Section(section) => section.get_all_variables(),
            SectionChild::Variable(variable) => vec![variable],
        }
    }

    pub fn filter_by_name(&self, name: &str) -> Vec<SpecNode<'_>> {
        match self {
            SectionChild::Section(section) => section.filter_by_name(name),
            SectionChild::Variable(variable) if variable.name() == name => {
                vec![SpecNode::Variable(variable)]
            }
            SectionChild::Variable(_) => Vec::new(),
        }
    }
}

impl From<Section> for SectionChild {
    fn from(section: Section) -> Self {
        SectionChild::Section(section)
    }
}

impl From<VariableSpec> for SectionChild {
    fn from(variable: VariableSpec) -> Self {
        SectionChild::Variable(variable)
    }
}

fn collect_sections<'a>(section: &'a Section, acc: &mut Vec<&'a Section>) {
    acc.push(section);
    for child in &section.children {
        if let SectionChild::Section(nested) = child {
            collect_sections(nested, acc);
        }
    }
}

fn collect_variables<'a>(section: &'a Section, acc: &mut Vec<&'a VariableSpec>) {
    for child in &section.children {
        match child {
            SectionChild::Variable(variable) => acc.push(variable),
            SectionChild::Section(nested) => collect_variables(nested, acc),
        }
    }
}

fn collect_named<'a>(section: &'a Section, name: &str, acc: &mut Vec<SpecNode<'a>>) {
    if section.name == name {
        acc.push(SpecNode::Section(section));
    }
    for child in &section.children {
        match child {
            SectionChild::Section(nested) => collect_named(nested, name, acc),
            SectionChild::Variable(variable) if variable.name() == name => {
                acc.push(SpecNode::Variable(variable));
            }
            SectionChild::Variable(_) => {}
        }
    }
}

fn filter_section(section: &Section, keep: &dyn Fn(&SectionChild) -> bool) -> Section {
    let children = section
        .children
        .iter()
        .filter(|child| keep(*child))
        .map(|child| match child {
            SectionChild::Section(nested) => SectionChild::Section(filter_section(nested, keep)),
            SectionChild::Variable(variable) => SectionChild::Variable(variable.clone()),
        })
        .collect();
    Section {
        children,
        ..shallow_copy(section)
    }
}

fn clone_multivalued_children(section: &Section, root: &str) -> Result<Section, SpecError> {
    let mut children = Vec::with_capacity(section.children.len());
    for child in &section.children {
        let cloned = match child {
            SectionChild::Variable(variable) => {
                SectionChild::Variable(variable.clone_set_multivalued())
            }
            SectionChild::Section(nested) if nested.is_multivalued => {
                return Err(SpecError::NestedMultivaluedSection {
                    parent: root.to_string(),
                    nested: nested.name.clone(),
                });
            }
            SectionChild::Section(nested) => {
                SectionChild::Section(clone_multivalued_children(nested, root)?)
            }
        };
        children.push(cloned);
    }
    Ok(Section {
        children,
        ..shallow_copy(section)
    })
}

fn validate_section(section: &Section, multivalued_ancestor: Option<&str>) -> Result<(), SpecError> {
    let mut section_names = BTreeSet::new();
    let mut variable_names = BTreeSet::new();
    for child in &section.children {
        let fresh = match child {
            SectionChild::Section(nested) => section_names.insert(nested.name.as_str()),
            SectionChild::Variable(variable) => variable_names.insert(variable.name()),
        };
        if !fresh {
            return Err(SpecError::DuplicateSibling {
                section: section.name.clone(),
                name: child.name().to_string(),
            });
        }
    }

    let ancestor = if section.is_multivalued {
        if let Some(parent) = multivalued_ancestor {
            return Err(SpecError::NestedMultivaluedSection {
                parent: parent.to_string(),
                nested: section.name.clone(),
            });
        }
        Some(section.name.as_str())
    } else {
        multivalued_ancestor
    };

    for child in &section.children {
        if let SectionChild::Section(nested) = child {
            validate_section(nested, ancestor)?;
        }
    }
    Ok(())
}

fn shallow_copy(section: &Section) -> Section {
    Section {
        name: section.name.clone(),
        is_multivalued: section.is_multivalued,
        is_component: section.is_component,
        component_key: section.component_key.clone(),
        foldable: section.foldable,
        description: section.description.clone(),
        children: Vec::new(),
    }
}
