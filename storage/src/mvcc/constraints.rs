use common::err::{CResult, ConstraintKind, EngineError};
use common::row::Row;
use common::schema::TableInfo;
use common::value::Value;

use crate::mvcc::table::TableStore;

/// Shape an incoming row for insert: reject unknown columns, fill defaults,
/// draw auto-increment values, enforce NOT NULL, coerce every cell into the
/// column's declared type.
pub fn prepare_insert_row(store: &TableStore, info: &TableInfo, row: &Row) -> CResult<Row> {
    for name in row.columns() {
        if info.column(name).is_none() {
            return Err(EngineError::ColumnNotFound(format!(
                "{}.{}",
                info.name, name
            )));
        }
    }

    let mut out = Row::new();
    for col in &info.columns {
        let incoming = row.get(&col.name).cloned().unwrap_or(Value::Null);
        let value = if incoming.is_null() {
            if col.auto_increment {
                Value::BigInt(store.next_auto_increment()? as i64)
            } else if let Some(default) = &col.default {
                default.clone()
            } else if !col.nullable {
                return Err(ConstraintKind::NotNull {
                    table: info.name.clone(),
                    column: col.name.clone(),
                }
                .into());
            } else {
                Value::Null
            }
        } else {
            incoming
        };
        let value = value.coerce_to(&col.data_type)?;
        if col.auto_increment {
            if let Some(explicit) = value.as_u64() {
                store.observe_auto_increment(explicit);
            }
        }
        out.set(col.name.clone(), value);
    }
    Ok(out)
}

/// Project the post-update image of a row. Constraint validation runs
/// against the row this returns, never against the partial update map.
pub fn apply_updates(info: &TableInfo, old: &Row, updates: &Row) -> CResult<Row> {
    let mut out = old.clone();
    for (name, value) in updates.iter() {
        let col = info
            .column(name)
            .ok_or_else(|| EngineError::ColumnNotFound(format!("{}.{}", info.name, name)))?;
        if value.is_null() && !col.nullable {
            return Err(ConstraintKind::NotNull {
                table: info.name.clone(),
                column: col.name.clone(),
            }
            .into());
        }
        out.set(name.clone(), value.coerce_to(&col.data_type)?);
    }
    Ok(out)
}
