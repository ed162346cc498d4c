/*!
 * Conditions
 * Predicates over an event's attributes and over leaf occurrence counts
 */

use crate::core::errors::PathError;
use crate::event::{EventWhat, Path, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    #[inline]
    pub fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (Operator::Ne, None) => true,
            (_, None) => false,
            (Operator::Eq, Some(o)) => o == Ordering::Equal,
            (Operator::Ne, Some(o)) => o != Ordering::Equal,
            (Operator::Lt, Some(o)) => o == Ordering::Less,
            (Operator::Le, Some(o)) => o != Ordering::Greater,
            (Operator::Gt, Some(o)) => o == Ordering::Greater,
            (Operator::Ge, Some(o)) => o != Ordering::Less,
        }
    }
}

/// Literal operand of an attribute comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Num(f64),
    Str(String),
}

impl Literal {
    fn compare(&self, value: &Value<'_>) -> Option<Ordering> {
        match (self, value) {
            (Literal::Num(rhs), _) => value.as_f64().and_then(|lhs| lhs.partial_cmp(rhs)),
            (Literal::Str(rhs), Value::Str(lhs)) => Some((*lhs).cmp(rhs.as_str())),
            (Literal::Str(rhs), Value::Num(_)) => Some(value.to_string().as_str().cmp(rhs.as_str())),
            (Literal::Str(_), Value::Map(_)) => None,
        }
    }
}

/// Attribute condition tree attached to a message leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
    Exists { path: Path },
    Compare { path: Path, op: Operator, value: Literal },
}

impl Condition {
    pub fn compare(path: Path, op: Operator, value: Literal) -> Self {
        Condition::Compare { path, op, value }
    }

    /// Evaluate against an event payload
    ///
    /// A path that cannot be resolved inside `Compare` is an error; `Exists`
    /// turns it into `false`.
    pub fn evaluate(&self, what: &EventWhat) -> Result<bool, PathError> {
        match self {
            Condition::All { conditions } => {
                for condition in conditions {
                    if !condition.evaluate(what)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { conditions } => {
                for condition in conditions {
                    if condition.evaluate(what)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not { condition } => condition.evaluate(what).map(|holds| !holds),
            Condition::Exists { path } => Ok(what.get_value(path).is_ok()),
            Condition::Compare { path, op, value } => {
                let resolved = what.get_value(path)?;
                Ok(op.holds(value.compare(&resolved)))
            }
        }
    }
}

/// Bound on how many times a leaf has been recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub op: Operator,
    pub value: i64,
}

impl Comparison {
    pub const fn new(op: Operator, value: i64) -> Self {
        Self { op, value }
    }

    #[inline]
    pub fn holds(&self, count: i64) -> bool {
        self.op.holds(Some(count.cmp(&self.value)))
    }
}
