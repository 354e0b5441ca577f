use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

use common::datasource::IsolationLevel;
use common::row::Row;

use crate::mvcc::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// Private state of one open transaction. Writes live here until commit;
/// the shared version lists never see an uncommitted tuple.
#[derive(Debug)]
pub struct Transaction {
    pub id: u64,
    pub isolation: IsolationLevel,
    pub state: TxnState,
    /// None under READ UNCOMMITTED.
    pub snapshot: Option<Snapshot>,
    pub start_time: Instant,

    /// table → ctid → staged new tuple. BTreeMap keeps publication order
    /// deterministic.
    pub write_set: HashMap<String, BTreeMap<u64, Row>>,
    /// table → ctids this transaction deletes (including old versions it
    /// supersedes through update).
    pub delete_set: HashMap<String, BTreeSet<u64>>,
    /// Read tracking for serializable validation: exact ctids read, plus a
    /// per-table marker catching phantoms.
    pub read_set: HashMap<String, HashSet<u64>>,
    pub read_tables: HashSet<String>,

    /// REPEATABLE READ caches the filtered committed version list per table
    /// on first read; later statements reuse it.
    pub snapshot_cache: HashMap<String, Vec<(u64, Row)>>,
}

impl Transaction {
    pub fn new(id: u64, isolation: IsolationLevel, snapshot: Option<Snapshot>) -> Self {
        Transaction {
            id,
            isolation,
            state: TxnState::Active,
            snapshot,
            start_time: Instant::now(),
            write_set: HashMap::new(),
            delete_set: HashMap::new(),
            read_set: HashMap::new(),
            read_tables: HashSet::new(),
            snapshot_cache: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }

    pub fn stage_insert(&mut self, table: &str, ctid: u64, row: Row) {
        self.write_set
            .entry(table.to_string())
            .or_default()
            .insert(ctid, row);
    }

    /// Stage a delete. A tuple this transaction itself staged is simply
    /// withdrawn from the write set instead.
    pub fn stage_delete(&mut self, table: &str, ctid: u64) {
        if let Some(staged) = self.write_set.get_mut(table) {
            if staged.remove(&ctid).is_some() {
                return;
            }
        }
        self.delete_set
            .entry(table.to_string())
            .or_default()
            .insert(ctid);
    }

    pub fn has_deleted(&self, table: &str, ctid: u64) -> bool {
        self.delete_set
            .get(table)
            .map(|s| s.contains(&ctid))
            .unwrap_or(false)
    }

    pub fn staged_rows<'a>(&'a self, table: &str) -> impl Iterator<Item = (u64, &'a Row)> {
        self.write_set
            .get(table)
            .into_iter()
            .flat_map(|m| m.iter().map(|(ctid, row)| (*ctid, row)))
    }

    pub fn record_read(&mut self, table: &str, ctids: impl IntoIterator<Item = u64>) {
        self.read_tables.insert(table.to_string());
        self.read_set
            .entry(table.to_string())
            .or_default()
            .extend(ctids);
    }

    pub fn touched_tables(&self) -> BTreeSet<String> {
        self.write_set
            .keys()
            .chain(self.delete_set.keys())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::value::Value;

    #[test]
    fn update_of_own_insert_withdraws_staged_row() {
        let mut txn = Transaction::new(7, IsolationLevel::RepeatableRead, None);
        txn.stage_insert("t", 1, Row::from_pairs([("v", Value::Int(1))]));
        txn.stage_delete("t", 1);
        assert_eq!(txn.staged_rows("t").count(), 0);
        assert!(!txn.has_deleted("t", 1));
    }

    #[test]
    fn touched_tables_sorted() {
        let mut txn = Transaction::new(7, IsolationLevel::RepeatableRead, None);
        txn.stage_insert("zeta", 1, Row::new());
        txn.stage_delete("alpha", 2);
        let tables: Vec<String> = txn.touched_tables().into_iter().collect();
        assert_eq!(tables, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
