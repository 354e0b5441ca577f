use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::value::Value;

/// A single tuple: column name to value, names case sensitive as stored.
/// Column order is carried by the surrounding schema, never by the row.
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct Row {
    cells: HashMap<String, Value>,
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Row");
        let mut names: Vec<&String> = self.cells.keys().collect();
        names.sort();
        for name in names {
            debug.field(name, &self.cells[name]);
        }
        debug.finish()
    }
}

impl Row {
    pub fn new() -> Self {
        Row {
            cells: HashMap::new(),
        }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Row {
            cells: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.cells.insert(column.into(), value);
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.cells.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.get(column)
    }

    /// Cloned cell, null when the column is absent.
    pub fn value(&self, column: &str) -> Value {
        self.cells.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Column resolution for possibly-qualified references: an exact hit
    /// wins, then `t.c` falls back to its `c` suffix, then a bare `c`
    /// matches a single `*.c` key.
    pub fn lookup(&self, column: &str) -> Option<&Value> {
        if let Some(v) = self.cells.get(column) {
            return Some(v);
        }
        if let Some((_, bare)) = column.rsplit_once('.') {
            if let Some(v) = self.cells.get(bare) {
                return Some(v);
            }
        }
        let mut hit = None;
        for (name, v) in &self.cells {
            if let Some((_, bare)) = name.rsplit_once('.') {
                if bare == column {
                    if hit.is_some() {
                        return None; // ambiguous
                    }
                    hit = Some(v);
                }
            }
        }
        hit
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.cells.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.cells.iter()
    }

    /// Keep only the named columns; absent ones materialize as null so the
    /// projected row always carries the declared shape.
    pub fn project(&self, columns: &[String]) -> Row {
        let mut out = Row::new();
        for c in columns {
            out.set(c.clone(), self.lookup(c).cloned().unwrap_or(Value::Null));
        }
        out
    }

    /// Merge `other` in, qualifying colliding names with `prefix.`.
    pub fn merge_qualified(&mut self, prefix: &str, other: &Row) {
        for (name, value) in &other.cells {
            if self.cells.contains_key(name) {
                self.cells.insert(format!("{}.{}", prefix, name), value.clone());
            } else {
                self.cells.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn into_cells(self) -> HashMap<String, Value> {
        self.cells
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Row {
            cells: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn qualified_lookup() {
        let row = Row::from_pairs([("u.id", Value::Int(1)), ("name", Value::String("A".into()))]);
        assert_eq!(row.lookup("u.id"), Some(&Value::Int(1)));
        assert_eq!(row.lookup("id"), Some(&Value::Int(1)));
        assert_eq!(row.lookup("name"), Some(&Value::String("A".into())));
        assert_eq!(row.lookup("missing"), None);
    }

    #[test]
    fn merge_prefixes_collisions() {
        let mut left = Row::from_pairs([("id", Value::Int(1))]);
        let right = Row::from_pairs([("id", Value::Int(9)), ("total", Value::Int(10))]);
        left.merge_qualified("o", &right);
        assert_eq!(left.value("id"), Value::Int(1));
        assert_eq!(left.value("o.id"), Value::Int(9));
        assert_eq!(left.value("total"), Value::Int(10));
    }

    #[test]
    fn projection_fills_missing_with_null() {
        let row = Row::from_pairs([("a", Value::Int(1))]);
        let out = row.project(&["a".to_string(), "b".to_string()]);
        assert_eq!(out.value("a"), Value::Int(1));
        assert_eq!(out.value("b"), Value::Null);
    }
}
