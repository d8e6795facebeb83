//! Leaf value objects attached to variable specifications.
//!
//! `Constraint` carries the validation rules a variable's values must satisfy
//! when the owning spec is `checked`; `ValueLabel` pairs a stored value with
//! the label shown for it by enumerated variable kinds.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validity rules for the values of one variable.
///
/// Every rule is optional. An empty constraint accepts anything, including the
/// empty string.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub required: bool,
}

/// Why a single value was rejected by a [`Constraint`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConstraintFailure {
    #[error("a value is required")]
    Missing,

    #[error("value does not match pattern '{0}'")]
    PatternMismatch(String),

    #[error("constraint pattern is not a valid regex: {0}")]
    InvalidPattern(String),

    #[error("value is not a finite number")]
    NotNumeric,

    #[error("value is lower than {0}")]
    BelowMinimum(String),

    #[error("value is greater than {0}")]
    AboveMaximum(String),
}

/// A [`Constraint`] with its pattern compiled, for checking many values.
#[derive(Debug)]
pub struct ConstraintChecker<'a> {
    constraint: &'a Constraint,
    pattern: Option<Result<Regex, ConstraintFailure>>,
}

impl Constraint {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Compile the pattern once for repeated [`ConstraintChecker::check`] calls.
    pub fn checker(&self) -> ConstraintChecker<'_> {
        let pattern = self.pattern.as_ref().map(|pattern| {
            // Anchor so the whole value has to match, not a substring of it.
            Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|err| ConstraintFailure::InvalidPattern(err.to_string()))
        });
        ConstraintChecker {
            constraint: self,
            pattern,
        }
    }

    /// Check one raw value against every rule that is set.
    pub fn check(&self, value: &str) -> Result<(), ConstraintFailure> {
        if value.is_empty() && !self.required {
            return Ok(());
        }
        self.checker().check(value)
    }
}

impl ConstraintChecker<'_> {
    /// An empty value on a non-required constraint is accepted without looking
    /// at the pattern or the range.
    pub fn check(&self, value: &str) -> Result<(), ConstraintFailure> {
        let constraint = self.constraint;
        if value.is_empty() {
            return if constraint.required {
                Err(ConstraintFailure::Missing)
            } else {
                Ok(())
            };
        }

        if let Some(pattern) = &self.pattern {
            let regex = pattern.as_ref().map_err(|err| err.clone())?;
            if !regex.is_match(value) {
                return Err(ConstraintFailure::PatternMismatch(
                    constraint.pattern.clone().unwrap_or_default(),
                ));
            }
        }

        if constraint.min.is_some() || constraint.max.is_some() {
            let number: f64 = value
                .trim()
                .parse()
                .map_err(|_| ConstraintFailure::NotNumeric)?;
            // `NaN` and infinities parse but never fit a range.
            if !number.is_finite() {
                return Err(ConstraintFailure::NotNumeric);
            }
            if let Some(min) = constraint.min {
                if number < min {
                    return Err(ConstraintFailure::BelowMinimum(min.to_string()));
                }
            }
            if let Some(max) = constraint.max {
                if number > max {
                    return Err(ConstraintFailure::AboveMaximum(max.to_string()));
                }
            }
        }

        Ok(())
    }
}

/// A stored value paired with its display label.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ValueLabel {
    pub value: String,
    pub label: String,
}

impl ValueLabel {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Swap value and label.
    pub fn reverse(&self) -> ValueLabel {
        ValueLabel {
            value: self.label.clone(),
            label: self.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_constraint_accepts_anything() {
        let constraint = Constraint::default();
        assert!(constraint.check("").is_ok());
        assert!(constraint.check("whatever value").is_ok());
    }

    #[test]
    fn required_rejects_empty_value() {
        assert_eq!(
            Constraint::required().check(""),
            Err(ConstraintFailure::Missing)
        );
    }

    #[test]
    fn pattern_must_match_whole_value() {
        let constraint = Constraint::default().with_pattern("[a-z]+");
        assert!(constraint.check("apache").is_ok());
        assert!(matches!(
            constraint.check("apache2"),
            Err(ConstraintFailure::PatternMismatch(_))
        ));
    }

    #[test]
    fn broken_pattern_is_reported() {
        let constraint = Constraint::default().with_pattern("(unclosed");
        assert!(matches!(
            constraint.check("x"),
            Err(ConstraintFailure::InvalidPattern(_))
        ));
    }

    #[test]
    fn numeric_range_is_inclusive() {
        let constraint = Constraint::default().with_range(Some(1.0), Some(65535.0));
        assert!(constraint.check("1").is_ok());
        assert!(constraint.check("65535").is_ok());
        assert!(matches!(
            constraint.check("0"),
            Err(ConstraintFailure::BelowMinimum(_))
        ));
        assert!(matches!(
            constraint.check("70000"),
            Err(ConstraintFailure::AboveMaximum(_))
        ));
        assert_eq!(constraint.check("eighty"), Err(ConstraintFailure::NotNumeric));
    }

    #[test]
    fn non_finite_numbers_are_rejected_by_ranges() {
        let constraint = Constraint::default().with_range(Some(1.0), Some(65535.0));
        for raw in ["NaN", "nan", "inf", "-inf", "infinity"] {
            assert_eq!(constraint.check(raw), Err(ConstraintFailure::NotNumeric), "{raw}");
        }
    }

    #[test]
    fn checker_reuses_compiled_pattern_across_values() {
        let constraint = Constraint::required().with_pattern("[0-9]+");
        let checker = constraint.checker();
        assert!(checker.check("80").is_ok());
        assert!(checker.check("443").is_ok());
        assert!(matches!(
            checker.check("http"),
            Err(ConstraintFailure::PatternMismatch(p)) if p == "[0-9]+"
        ));
        assert_eq!(checker.check(""), Err(ConstraintFailure::Missing));

        let broken = Constraint::default().with_pattern("(unclosed");
        let checker = broken.checker();
        assert!(checker.check("").is_ok());
        assert!(matches!(
            checker.check("x"),
            Err(ConstraintFailure::InvalidPattern(_))
        ));
    }

    #[test]
    fn failure_is_usable_as_an_error_source() {
        let err: Box<dyn std::error::Error> = Box::new(ConstraintFailure::NotNumeric);
        assert_eq!(err.to_string(), "value is not a finite number");
    }

    #[test]
    fn value_label_reverse_swaps_fields() {
        let pair = ValueLabel::new("true", "Enabled");
        let reversed = pair.reverse();
        assert_eq!(reversed, ValueLabel::new("Enabled", "true"));
        assert_eq!(reversed.reverse(), pair);
    }
}
