use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use common::err::{CResult, ConstraintKind};
use common::schema::TableInfo;
use common::value::Value;

use crate::mvcc::version::TupleVersion;

/// Version list and unique index share one lock so their mutation stays
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct TableData {
    pub versions: Vec<Arc<TupleVersion>>,
    /// column → value key → ctid of the live committed tuple holding it.
    pub unique: HashMap<String, HashMap<String, u64>>,
}

impl TableData {
    pub fn unique_holder(&self, column: &str, value: &Value) -> Option<u64> {
        self.unique.get(column).and_then(|m| m.get(&value.key())).copied()
    }

    pub fn unique_insert(&mut self, column: &str, value: &Value, ctid: u64) {
        if let Some(m) = self.unique.get_mut(column) {
            m.insert(value.key(), ctid);
        }
    }

    pub fn unique_remove(&mut self, column: &str, value: &Value) {
        if let Some(m) = self.unique.get_mut(column) {
            m.remove(&value.key());
        }
    }
}

#[derive(Debug)]
pub struct TableStore {
    pub info: RwLock<TableInfo>,
    pub data: RwLock<TableData>,
    auto_inc: AtomicU64,
    next_ctid: AtomicU64,
}

impl TableStore {
    pub fn new(info: TableInfo) -> Self {
        let mut data = TableData::default();
        for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
            data.unique.insert(col.name.clone(), HashMap::new());
        }
        TableStore {
            info: RwLock::new(info),
            data: RwLock::new(data),
            auto_inc: AtomicU64::new(0),
            next_ctid: AtomicU64::new(1),
        }
    }

    pub fn table_name(&self) -> String {
        self.info.read().unwrap().name.clone()
    }

    pub fn next_ctid(&self) -> u64 {
        self.next_ctid.fetch_add(1, Ordering::SeqCst)
    }

    /// Next auto-increment value. The counter survives deletes and is not
    /// wound back on transaction abort.
    pub fn next_auto_increment(&self) -> CResult<u64> {
        let next = self.auto_inc.fetch_add(1, Ordering::SeqCst) + 1;
        if next > i64::MAX as u64 {
            return Err(ConstraintKind::AutoIncrementOverflow {
                table: self.table_name(),
            }
            .into());
        }
        Ok(next)
    }

    /// Explicit inserts into the auto-increment column push the counter
    /// forward so later generated values never collide.
    pub fn observe_auto_increment(&self, value: u64) {
        self.auto_inc.fetch_max(value, Ordering::SeqCst);
    }

    pub fn current_auto_increment(&self) -> u64 {
        self.auto_inc.load(Ordering::SeqCst)
    }

    /// Drop every version and index entry, wind the counter back to zero.
    /// The schema survives.
    pub fn truncate(&self) {
        let mut data = self.data.write().unwrap();
        data.versions.clear();
        for index in data.unique.values_mut() {
            index.clear();
        }
        self.auto_inc.store(0, Ordering::SeqCst);
    }

    /// Live committed row count, the cardinality the cost model sees.
    pub fn live_rows(&self) -> usize {
        self.data
            .read()
            .unwrap()
            .versions
            .iter()
            .filter(|v| v.is_live())
            .count()
    }
}
