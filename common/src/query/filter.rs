use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::row::Row;
use crate::value::{like_match, Value};

/// Canonical comparison operators a data source must understand. Parser
/// front-ends normalize their native spellings into this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
}

impl FilterOp {
    /// Normalize a raw operator spelling. Accepts both symbolic SQL forms
    /// and the word forms ASTs tend to carry.
    pub fn normalize(raw: &str) -> Option<FilterOp> {
        Some(match raw.to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => FilterOp::Eq,
            "!=" | "<>" | "ne" | "neq" => FilterOp::Ne,
            "<" | "lt" => FilterOp::Lt,
            "<=" | "le" | "lte" => FilterOp::Le,
            ">" | "gt" => FilterOp::Gt,
            ">=" | "ge" | "gte" => FilterOp::Ge,
            "like" => FilterOp::Like,
            "not like" => FilterOp::NotLike,
            "in" => FilterOp::In,
            "not in" => FilterOp::NotIn,
            "between" => FilterOp::Between,
            "not between" => FilterOp::NotBetween,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterLogic {
    And,
    Or,
}

/// One predicate node. A leaf carries `field/op/value(s)`; a group carries
/// `logic` and `children`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
    /// Operand list for In/NotIn (members) and Between/NotBetween (low, high).
    pub values: Vec<Value>,
    pub logic: Option<FilterLogic>,
    pub children: Vec<Filter>,
}

impl Filter {
    pub fn cmp(field: impl Into<String>, op: FilterOp, value: Value) -> Filter {
        Filter {
            field: field.into(),
            op,
            value,
            values: Vec::new(),
            logic: None,
            children: Vec::new(),
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Filter {
        Filter::cmp(field, FilterOp::Eq, value)
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Filter {
        Filter {
            field: field.into(),
            op: FilterOp::In,
            value: Value::Null,
            values,
            logic: None,
            children: Vec::new(),
        }
    }

    pub fn between(field: impl Into<String>, low: Value, high: Value) -> Filter {
        Filter {
            field: field.into(),
            op: FilterOp::Between,
            value: Value::Null,
            values: vec![low, high],
            logic: None,
            children: Vec::new(),
        }
    }

    pub fn and(children: Vec<Filter>) -> Filter {
        Filter::group(FilterLogic::And, children)
    }

    pub fn or(children: Vec<Filter>) -> Filter {
        Filter::group(FilterLogic::Or, children)
    }

    fn group(logic: FilterLogic, children: Vec<Filter>) -> Filter {
        Filter {
            field: String::new(),
            op: FilterOp::Eq,
            value: Value::Null,
            values: Vec::new(),
            logic: Some(logic),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Three-valued evaluation collapsed to a match decision: unknown
    /// (null operand) never matches.
    pub fn matches(&self, row: &Row) -> bool {
        if !self.is_leaf() {
            return match self.logic {
                Some(FilterLogic::Or) => self.children.iter().any(|c| c.matches(row)),
                // a group without explicit logic conjoins
                _ => self.children.iter().all(|c| c.matches(row)),
            };
        }
        let cell = match row.lookup(&self.field) {
            Some(v) => v,
            None => &Value::Null,
        };
        match self.op {
            FilterOp::Eq => cell.compare(&self.value) == Some(Ordering::Equal),
            FilterOp::Ne => matches!(
                cell.compare(&self.value),
                Some(Ordering::Less) | Some(Ordering::Greater)
            ),
            FilterOp::Lt => cell.compare(&self.value) == Some(Ordering::Less),
            FilterOp::Le => matches!(
                cell.compare(&self.value),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            FilterOp::Gt => cell.compare(&self.value) == Some(Ordering::Greater),
            FilterOp::Ge => matches!(
                cell.compare(&self.value),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            FilterOp::Like | FilterOp::NotLike => {
                let hit = match (cell, &self.value) {
                    (Value::String(text), Value::String(pattern)) => like_match(text, pattern),
                    (Value::Null, _) => return false,
                    (text, Value::String(pattern)) => like_match(&text.to_string(), pattern),
                    _ => false,
                };
                if self.op == FilterOp::Like {
                    hit
                } else {
                    !cell.is_null() && !hit
                }
            }
            FilterOp::In => self
                .values
                .iter()
                .any(|v| cell.compare(v) == Some(Ordering::Equal)),
            FilterOp::NotIn => {
                !cell.is_null()
                    && self
                        .values
                        .iter()
                        .all(|v| matches!(cell.compare(v), Some(Ordering::Less) | Some(Ordering::Greater)))
            }
            FilterOp::Between | FilterOp::NotBetween => {
                if self.values.len() != 2 {
                    return false;
                }
                let ge_low = matches!(
                    cell.compare(&self.values[0]),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                );
                let le_high = matches!(
                    cell.compare(&self.values[1]),
                    Some(Ordering::Less) | Some(Ordering::Equal)
                );
                let inside = ge_low && le_high;
                if self.op == FilterOp::Between {
                    inside
                } else {
                    !cell.is_null() && !inside
                }
            }
        }
    }

    /// Every column name referenced anywhere in the tree.
    pub fn referenced_columns(&self, out: &mut HashSet<String>) {
        if self.is_leaf() {
            out.insert(self.field.clone());
        }
        for child in &self.children {
            child.referenced_columns(out);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row() -> Row {
        Row::from_pairs([
            ("age", Value::Int(35)),
            ("name", Value::String("Alice".into())),
            ("city", Value::Null),
        ])
    }

    #[test]
    fn leaf_comparisons() {
        assert!(Filter::cmp("age", FilterOp::Gt, Value::Int(30)).matches(&row()));
        assert!(!Filter::cmp("age", FilterOp::Lt, Value::Int(30)).matches(&row()));
        assert!(Filter::eq("name", Value::String("Alice".into())).matches(&row()));
    }

    #[test]
    fn null_is_unknown() {
        // both x = null and x != null are unknown, never matches
        assert!(!Filter::eq("city", Value::String("NY".into())).matches(&row()));
        assert!(!Filter::cmp("city", FilterOp::Ne, Value::String("NY".into())).matches(&row()));
        assert!(!Filter::cmp("city", FilterOp::NotLike, Value::String("%".into())).matches(&row()));
    }

    #[test]
    fn groups() {
        let f = Filter::and(vec![
            Filter::cmp("age", FilterOp::Ge, Value::Int(30)),
            Filter::or(vec![
                Filter::eq("name", Value::String("Bob".into())),
                Filter::cmp("name", FilterOp::Like, Value::String("A%".into())),
            ]),
        ]);
        assert!(f.matches(&row()));
    }

    #[test]
    fn set_membership() {
        assert!(Filter::in_list("age", vec![Value::Int(34), Value::Int(35)]).matches(&row()));
        assert!(Filter::between("age", Value::Int(35), Value::Int(40)).matches(&row()));
        assert!(!Filter::between("age", Value::Int(36), Value::Int(40)).matches(&row()));
    }

    #[test]
    fn normalize_spellings() {
        assert_eq!(FilterOp::normalize("<>"), Some(FilterOp::Ne));
        assert_eq!(FilterOp::normalize("GT"), Some(FilterOp::Gt));
        assert_eq!(FilterOp::normalize("not like"), Some(FilterOp::NotLike));
        assert_eq!(FilterOp::normalize("~"), None);
    }
}
