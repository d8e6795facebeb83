//! Deserializable form of `technique.json` and `category.json`.
//!
//! The structs mirror `schema/technique.schema.json`. They are converted into
//! the immutable domain types right after parsing; nothing outside the
//! filesystem reader sees them.

use crate::catalog::identity::{TechniqueId, TemplateId};
use crate::spec::{
    Constraint, Section, SectionChild, SpecError, ValueLabel, VariableFields, VariableSpec,
};
use crate::technique::{Technique, TemplateRef};
use serde::Deserialize;

/// Name given to the root section of every technique.
pub const ROOT_SECTION_NAME: &str = "sections";

#[derive(Clone, Debug, Deserialize)]
pub struct CategoryDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TechniqueDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub multi_instance: bool,
    #[serde(default)]
    pub tracker: Option<TrackerDescriptor>,
    #[serde(default)]
    pub system_variables: Vec<SystemVariableDescriptor>,
    #[serde(default)]
    pub templates: Vec<TemplateDescriptor>,
    #[serde(default)]
    pub sections: Vec<ChildDescriptor>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackerDescriptor {
    #[serde(default)]
    pub bounding_variable: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SystemVariableDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub multivalued: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TemplateDescriptor {
    pub path: String,
    pub out_path: Option<String>,
    #[serde(default = "default_true")]
    pub included: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildDescriptor {
    Section(SectionDescriptor),
    Variable(VariableDescriptor),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SectionDescriptor {
    pub name: String,
    #[serde(default)]
    pub multivalued: bool,
    #[serde(default)]
    pub component: bool,
    #[serde(default)]
    pub component_key: Option<String>,
    #[serde(default)]
    pub foldable: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub children: Vec<ChildDescriptor>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VariableDescriptor {
    /// `INPUT`, `SELECT` or `SELECT1`.
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub multivalued: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_true")]
    pub checked: bool,
    #[serde(default)]
    pub constraint: Constraint,
    #[serde(default)]
    pub values: Vec<ValueLabel>,
}

fn default_true() -> bool {
    true
}

impl TechniqueDescriptor {
    /// Convert into a [`Technique`], validating the specification tree.
    pub fn into_technique(self, id: TechniqueId) -> Result<Technique, SpecError> {
        let children = self
            .sections
            .into_iter()
            .map(ChildDescriptor::into_child)
            .collect::<Result<Vec<_>, _>>()?;
        let root_section = Section::new(ROOT_SECTION_NAME).with_children(children);
        root_section.validate()?;

        let templates = self
            .templates
            .into_iter()
            .map(|tpl| TemplateRef {
                out_path: tpl.out_path.unwrap_or_else(|| tpl.path.clone()),
                id: TemplateId {
                    technique: id.clone(),
                    path: tpl.path,
                },
                included: tpl.included,
            })
            .collect();

        let system_variable_specs = self
            .system_variables
            .into_iter()
            .map(|var| {
                VariableSpec::system(
                    VariableFields::new(var.name)
                        .described(var.description)
                        .multivalued(var.multivalued),
                )
            })
            .collect();

        let tracker = self.tracker.and_then(|t| t.bounding_variable);

        Ok(Technique {
            id,
            name: self.name,
            description: self.description,
            root_section,
            templates,
            system_variable_specs,
            tracker_variable_spec: VariableSpec::tracker(tracker),
            is_system: self.system,
            is_multi_instance: self.multi_instance,
        })
    }
}

impl ChildDescriptor {
    fn into_child(self) -> Result<SectionChild, SpecError> {
        match self {
            ChildDescriptor::Section(section) => {
                let children = section
                    .children
                    .into_iter()
                    .map(ChildDescriptor::into_child)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SectionChild::Section(Section {
                    name: section.name,
                    is_multivalued: section.multivalued,
                    is_component: section.component,
                    component_key: section.component_key,
                    foldable: section.foldable,
                    description: section.description,
                    children,
                }))
            }
            ChildDescriptor::Variable(var) => {
                let fields = VariableFields {
                    name: var.name,
                    description: var.description,
                    long_description: var.long_description,
                    multivalued: var.multivalued,
                    is_unique_variable: var.unique,
                    checked: var.checked,
                    constraint: var.constraint,
                };
                VariableSpec::from_marker(&var.kind, fields, var.values).map(SectionChild::Variable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::VariableKind;
    use serde_json::json;

    fn descriptor(value: serde_json::Value) -> TechniqueDescriptor {
        serde_json::from_value(value).expect("descriptor parses")
    }

    #[test]
    fn into_technique_builds_tree_templates_and_system_vars() {
        let desc = descriptor(json!({
            "name": "Apache server",
            "multi_instance": true,
            "tracker": {"bounding_variable": "SERVER_NAME"},
            "system_variables": [{"name": "NODE_HOSTNAME"}],
            "templates": [{"path": "vhost.conf.tpl", "out_path": "apache/vhost.conf"}],
            "sections": [
                {"variable": {"kind": "SELECT1", "name": "MODE",
                              "values": [{"value": "on", "label": "On"}]}},
                {"section": {"name": "vhost", "multivalued": true, "children": [
                    {"variable": {"kind": "INPUT", "name": "SERVER_NAME",
                                  "constraint": {"required": true}}}
                ]}}
            ]
        }));
        let technique = desc
            .into_technique(TechniqueId::new("apache", "1.0"))
            .expect("valid technique");

        assert_eq!(technique.name, "Apache server");
        assert!(technique.is_multi_instance);
        assert_eq!(technique.root_section.name, ROOT_SECTION_NAME);
        let names: Vec<&str> = technique
            .root_section
            .get_all_variables()
            .into_iter()
            .map(VariableSpec::name)
            .collect();
        assert_eq!(names, vec!["MODE", "SERVER_NAME"]);
        assert!(matches!(
            technique.variable_spec("MODE").unwrap().kind(),
            VariableKind::SelectOne { .. }
        ));
        assert!(technique.variable_spec("SERVER_NAME").unwrap().constraint().required);
        assert_eq!(technique.templates[0].out_path, "apache/vhost.conf");
        assert!(technique.templates[0].included);
        assert_eq!(
            technique.tracker_variable_spec.kind(),
            &VariableKind::Tracker {
                bounding_variable: Some("SERVER_NAME".to_string())
            }
        );
        assert!(technique.system_variable_specs[0].is_system());
    }

    #[test]
    fn into_technique_rejects_unknown_kind() {
        let desc = descriptor(json!({
            "name": "broken",
            "sections": [{"variable": {"kind": "TEXTAREA", "name": "X"}}]
        }));
        let err = desc
            .into_technique(TechniqueId::new("broken", "1.0"))
            .expect_err("unknown kind");
        assert_eq!(err, SpecError::UnknownVariableKind("TEXTAREA".to_string()));
    }

    #[test]
    fn into_technique_rejects_nested_multivalued_sections() {
        let desc = descriptor(json!({
            "name": "nested",
            "sections": [{"section": {"name": "outer", "multivalued": true, "children": [
                {"section": {"name": "inner", "multivalued": true}}
            ]}}]
        }));
        assert!(matches!(
            desc.into_technique(TechniqueId::new("nested", "1.0")),
            Err(SpecError::NestedMultivaluedSection { .. })
        ));
    }

    #[test]
    fn template_out_path_defaults_to_source_path() {
        let desc = descriptor(json!({
            "name": "motd",
            "templates": [{"path": "motd.tpl", "included": false}]
        }));
        let technique = desc.into_technique(TechniqueId::new("motd", "1.0")).unwrap();
        assert_eq!(technique.templates[0].out_path, "motd.tpl");
        assert!(!technique.templates[0].included);
    }
}
