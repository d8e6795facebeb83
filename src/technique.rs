//! The technique aggregate: one versioned configurable unit.

use crate::catalog::{TechniqueId, TemplateId};
use crate::spec::{Section, VariableSpec};

/// One template resource declared by a technique.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateRef {
    pub id: TemplateId,
    /// Where the rendered file is written, relative to the generated policy.
    pub out_path: String,
    /// Whether the rendered file is part of the policy's entry points.
    pub included: bool,
}

#[derive(Clone, Debug, PartialEq)]
/// Metadata for one technique version, built by a reader and never mutated.
pub struct Technique {
    pub id: TechniqueId,
    /// Human-readable name, distinct from the identity's name.
    pub name: String,
    pub description: String,
    pub root_section: Section,
    pub templates: Vec<TemplateRef>,
    pub system_variable_specs: Vec<VariableSpec>,
    pub tracker_variable_spec: VariableSpec,
    pub is_system: bool,
    pub is_multi_instance: bool,
}

impl Technique {
    /// Technique with an empty tree, no templates and a plain tracker.
    pub fn new(id: TechniqueId, root_section: Section) -> Self {
        Self {
            name: id.name.0.clone(),
            id,
            description: String::new(),
            root_section,
            templates: Vec::new(),
            system_variable_specs: Vec::new(),
            tracker_variable_spec: VariableSpec::tracker(None),
            is_system: false,
            is_multi_instance: false,
        }
    }

    /// Tree variables in pre-order, then system variables, then the tracker.
    pub fn all_variable_specs(&self) -> Vec<&VariableSpec> {
        let mut specs = self.root_section.get_all_variables();
        specs.extend(self.system_variable_specs.iter());
        specs.push(&self.tracker_variable_spec);
        specs
    }

    /// First spec named `name` in [`Technique::all_variable_specs`] order.
    pub fn variable_spec(&self, name: &str) -> Option<&VariableSpec> {
        self.all_variable_specs()
            .into_iter()
            .find(|spec| spec.name() == name)
    }

    pub fn template(&self, path: &str) -> Option<&TemplateRef> {
        self.templates.iter().find(|tpl| tpl.id.path == path)
    }
}
