//! Variable specifications: the leaves of the specification tree.
//!
//! A [`VariableSpec`] describes one configurable field without holding a
//! value. The entry kind is a closed set ([`VariableKind`]); every place that
//! needs to distinguish kinds matches on it exhaustively.

use crate::spec::SpecError;
use crate::spec::constraint::{Constraint, ValueLabel};

/// Name shared by every tracker variable.
pub const TRACKINGKEY: &str = "TRACKINGKEY";

pub const INPUT_MARKER: &str = "INPUT";
pub const SELECT_MARKER: &str = "SELECT";
pub const SELECT_ONE_MARKER: &str = "SELECT1";

/// How values for a variable are entered.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableKind {
    /// Free-form text.
    Input,
    /// Any number of choices from `values_labels`.
    Select { values_labels: Vec<ValueLabel> },
    /// Exactly one choice from `values_labels`.
    SelectOne { values_labels: Vec<ValueLabel> },
    /// Provided by the environment, never entered by a user.
    System,
    /// Binds a policy instance to its generated artifacts.
    Tracker { bounding_variable: Option<String> },
}

impl VariableKind {
    pub fn marker(&self) -> &'static str {
        match self {
            VariableKind::Input => INPUT_MARKER,
            VariableKind::Select { .. } => SELECT_MARKER,
            VariableKind::SelectOne { .. } => SELECT_ONE_MARKER,
            VariableKind::System => "SYSTEM",
            VariableKind::Tracker { .. } => "TRACKER",
        }
    }
}

/// Attributes shared by every variable kind, used to build a [`VariableSpec`].
#[derive(Clone, Debug, PartialEq)]
pub struct VariableFields {
    pub name: String,
    pub description: String,
    pub long_description: String,
    pub multivalued: bool,
    pub is_unique_variable: bool,
    pub checked: bool,
    pub constraint: Constraint,
}

impl VariableFields {
    /// Single-valued, checked, non-unique field with an empty constraint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            long_description: String::new(),
            multivalued: false,
            is_unique_variable: false,
            checked: true,
            constraint: Constraint::default(),
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn multivalued(mut self, multivalued: bool) -> Self {
        self.multivalued = multivalued;
        self
    }

    pub fn constrained(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }
}

/// Metadata for one configurable field.
///
/// Fields are private so the tracker invariants (fixed name, unchecked,
/// always multivalued) cannot be broken after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableSpec {
    fields: VariableFields,
    kind: VariableKind,
}

impl VariableSpec {
    pub fn input(fields: VariableFields) -> Self {
        Self {
            fields,
            kind: VariableKind::Input,
        }
    }

    pub fn select(fields: VariableFields, values_labels: Vec<ValueLabel>) -> Self {
        Self {
            fields,
            kind: VariableKind::Select { values_labels },
        }
    }

    pub fn select_one(fields: VariableFields, values_labels: Vec<ValueLabel>) -> Self {
        Self {
            fields,
            kind: VariableKind::SelectOne { values_labels },
        }
    }

    pub fn system(fields: VariableFields) -> Self {
        Self {
            fields,
            kind: VariableKind::System,
        }
    }

    pub fn tracker(bounding_variable: Option<String>) -> Self {
        Self {
            fields: VariableFields {
                name: TRACKINGKEY.to_string(),
                description: "Variable which keeps track of the policy instance".to_string(),
                long_description: String::new(),
                multivalued: true,
                is_unique_variable: false,
                checked: false,
                constraint: Constraint::default(),
            },
            kind: VariableKind::Tracker { bounding_variable },
        }
    }

    /// Build a user-facing spec from its descriptor marker.
    ///
    /// Only the section-level kinds (`INPUT`, `SELECT`, `SELECT1`) have
    /// markers; anything else is a descriptor bug.
    pub fn from_marker(
        marker: &str,
        fields: VariableFields,
        values_labels: Vec<ValueLabel>,
    ) -> Result<Self, SpecError> {
        match marker.to_ascii_uppercase().as_str() {
            INPUT_MARKER => Ok(Self::input(fields)),
            SELECT_MARKER => Ok(Self::select(fields, values_labels)),
            SELECT_ONE_MARKER => Ok(Self::select_one(fields, values_labels)),
            _ => Err(SpecError::UnknownVariableKind(marker.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn description(&self) -> &str {
        &self.fields.description
    }

    pub fn long_description(&self) -> &str {
        &self.fields.long_description
    }

    pub fn multivalued(&self) -> bool {
        self.fields.multivalued
    }

    pub fn is_unique_variable(&self) -> bool {
        self.fields.is_unique_variable
    }

    pub fn checked(&self) -> bool {
        self.fields.checked
    }

    pub fn constraint(&self) -> &Constraint {
        &self.fields.constraint
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    pub fn is_system(&self) -> bool {
        match self.kind {
            VariableKind::System | VariableKind::Tracker { .. } => true,
            VariableKind::Input | VariableKind::Select { .. } | VariableKind::SelectOne { .. } => {
                false
            }
        }
    }

    /// Choices offered by enumerated kinds; empty for the others.
    pub fn values_labels(&self) -> &[ValueLabel] {
        match &self.kind {
            VariableKind::Select { values_labels } | VariableKind::SelectOne { values_labels } => {
                values_labels
            }
            VariableKind::Input | VariableKind::System | VariableKind::Tracker { .. } => &[],
        }
    }

    /// Copy of this spec that accepts several values.
    pub fn clone_set_multivalued(&self) -> VariableSpec {
        let mut copy = self.clone();
        copy.fields.multivalued = true;
        copy
    }

    /// Concrete variable holding `values` as given; see [`Variable::validate`].
    pub fn to_variable(&self, values: Vec<String>) -> Variable {
        Variable {
            spec: self.clone(),
            values,
        }
    }
}

/// A variable spec together with raw string values.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    spec: VariableSpec,
    values: Vec<String>,
}

impl Variable {
    pub fn spec(&self) -> &VariableSpec {
        &self.spec
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Check cardinality, then every value when the spec is `checked`.
    ///
    /// Enumerated kinds additionally require each value to be one of the
    /// declared choices.
    pub fn validate(&self) -> Result<(), SpecError> {
        if !self.spec.multivalued() && self.values.len() > 1 {
            return Err(SpecError::TooManyValues {
                variable: self.spec.name().to_string(),
                count: self.values.len(),
            });
        }
        if !self.spec.checked() {
            return Ok(());
        }

        let choices = self.spec.values_labels();
        let checker = self.spec.constraint().checker();
        for value in &self.values {
            checker
                .check(value)
                .map_err(|failure| SpecError::ConstraintViolation {
                    variable: self.spec.name().to_string(),
                    value: value.clone(),
                    reason: failure.to_string(),
                })?;
            if !choices.is_empty()
                && !value.is_empty()
                && !choices.iter().any(|choice| &choice.value == value)
            {
                return Err(SpecError::ConstraintViolation {
                    variable: self.spec.name().to_string(),
                    value: value.clone(),
                    reason: "value is not one of the declared choices".to_string(),
                });
            }
        }
        Ok(())
    }
}
