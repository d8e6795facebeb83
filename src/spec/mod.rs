//! Specification tree: the shape of a technique.
//!
//! A tree is a root [`Section`] whose ordered children are nested sections and
//! [`VariableSpec`] leaves. Trees are built once by a reader and never
//! mutated; traversal returns borrowed views and transformations return new
//! trees.

pub mod constraint;
pub mod section;
pub mod variable;

pub use constraint::{Constraint, ConstraintChecker, ConstraintFailure, ValueLabel};
pub use section::{Section, SectionChild, SpecNode};
pub use variable::{
    INPUT_MARKER, SELECT_MARKER, SELECT_ONE_MARKER, TRACKINGKEY, Variable, VariableFields,
    VariableKind, VariableSpec,
};

use thiserror::Error;

/// Structural and validation failures in a specification tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("unknown variable kind marker '{0}'")]
    UnknownVariableKind(String),

    #[error("multivalued section '{nested}' is nested inside multivalued section '{parent}'")]
    NestedMultivaluedSection { parent: String, nested: String },

    #[error("section '{section}' has two children named '{name}' of the same kind")]
    DuplicateSibling { section: String, name: String },

    #[error("value '{value}' of variable '{variable}' is invalid: {reason}")]
    ConstraintViolation {
        variable: String,
        value: String,
        reason: String,
    },

    #[error("variable '{variable}' is not multivalued but got {count} values")]
    TooManyValues { variable: String, count: usize },
}
