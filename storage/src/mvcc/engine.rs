use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use common::config::DataSourceConfig;
use common::datasource::{
    DataSource, IsolationLevel, QueryContext, QueryResult, TransactionalSource,
};
use common::err::{CResult, ConstraintKind, EngineError};
use common::query::{Filter, QueryOptions, SortOrder};
use common::row::Row;
use common::schema::{ForeignKeyRef, ReferentialPolicy, TableInfo};
use common::value::Value;

use crate::mvcc::commit_log::CommitLog;
use crate::mvcc::constraints::{apply_updates, prepare_insert_row};
use crate::mvcc::snapshot::Snapshot;
use crate::mvcc::table::{TableData, TableStore};
use crate::mvcc::transaction::{Transaction, TxnState};
use crate::mvcc::version::{TupleVersion, INFINITY};

const COMMIT_LOCK_ATTEMPTS: usize = 5;
const COMMIT_LOCK_BACKOFF: Duration = Duration::from_millis(10);

/// Snapshot-isolated in-memory table store behind the data-source interface.
pub struct MemoryEngine {
    name: String,
    writable: bool,
    connected: AtomicBool,
    catalog: RwLock<HashMap<String, Arc<TableStore>>>,
    commit_log: Arc<CommitLog>,
    txns: DashMap<u64, Mutex<Transaction>>,
}

impl MemoryEngine {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryEngine {
            name: name.into(),
            writable: true,
            connected: AtomicBool::new(false),
            catalog: RwLock::new(HashMap::new()),
            commit_log: Arc::new(CommitLog::new()),
            txns: DashMap::new(),
        }
    }

    pub fn from_config(config: &DataSourceConfig) -> Arc<MemoryEngine> {
        let mut engine = MemoryEngine::new(config.name.clone());
        engine.writable = config.is_writable();
        Arc::new(engine)
    }

    fn store(&self, table: &str) -> CResult<Arc<TableStore>> {
        self.catalog
            .read()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))
    }

    fn require_writable(&self) -> CResult<()> {
        if !self.writable {
            return Err(EngineError::SourceIo(format!(
                "data source '{}' is read only",
                self.name
            )));
        }
        Ok(())
    }

    /// Committed rows visible to `txn` (or to a fresh instantaneous
    /// snapshot), before the transaction's own staged changes are applied.
    fn committed_view(
        &self,
        store: &TableStore,
        table: &str,
        txn: Option<&mut Transaction>,
    ) -> Vec<(u64, Row)> {
        match txn {
            None => {
                let snapshot = self.commit_log.snapshot();
                let data = store.data.read().unwrap();
                data.versions
                    .iter()
                    .filter(|v| snapshot.sees(v, None))
                    .map(|v| (v.ctid, v.data.clone()))
                    .collect()
            }
            Some(txn) => {
                if txn.isolation == IsolationLevel::ReadUncommitted {
                    // no snapshot: whatever is live right now
                    let data = store.data.read().unwrap();
                    return data
                        .versions
                        .iter()
                        .filter(|v| v.is_live())
                        .map(|v| (v.ctid, v.data.clone()))
                        .collect();
                }
                let cacheable = matches!(
                    txn.isolation,
                    IsolationLevel::RepeatableRead | IsolationLevel::Serializable
                );
                if cacheable {
                    if let Some(cached) = txn.snapshot_cache.get(table) {
                        return cached.clone();
                    }
                }
                let snapshot = match &txn.snapshot {
                    Some(s) => s.clone(),
                    None => self.commit_log.snapshot(),
                };
                let base: Vec<(u64, Row)> = {
                    let data = store.data.read().unwrap();
                    data.versions
                        .iter()
                        .filter(|v| snapshot.sees(v, Some(txn.id)))
                        .map(|v| (v.ctid, v.data.clone()))
                        .collect()
                };
                if txn.isolation == IsolationLevel::Serializable {
                    txn.record_read(table, base.iter().map(|(ctid, _)| *ctid));
                }
                if cacheable {
                    txn.snapshot_cache.insert(table.to_string(), base.clone());
                }
                base
            }
        }
    }

    /// Full read view: committed-visible rows minus the transaction's staged
    /// deletes, plus its staged inserts.
    fn read_view(
        &self,
        store: &TableStore,
        table: &str,
        mut txn: Option<&mut Transaction>,
    ) -> Vec<(u64, Row)> {
        let mut rows = self.committed_view(store, table, txn.as_deref_mut());
        if let Some(txn) = txn {
            rows.retain(|(ctid, _)| !txn.has_deleted(table, *ctid));
            rows.extend(txn.staged_rows(table).map(|(ctid, row)| (ctid, row.clone())));
        }
        rows
    }

    /// Does any row visible to the caller carry `value` in `column`?
    fn visible_match_exists(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        txn: Option<&mut Transaction>,
    ) -> CResult<bool> {
        let store = self.store(table)?;
        let rows = self.read_view(&store, table, txn);
        Ok(rows.iter().any(|(_, row)| {
            row.get(column)
                .map(|v| v.compare(value) == Some(std::cmp::Ordering::Equal))
                .unwrap_or(false)
        }))
    }

    /// Unique enforcement for one prospective row: committed live holders
    /// (unless this transaction deleted them or it is the row being
    /// updated), staged rows of the same transaction, and earlier rows of
    /// the same statement batch.
    fn check_unique(
        &self,
        table: &str,
        data: &TableData,
        info: &TableInfo,
        row: &Row,
        txn: Option<&Transaction>,
        exclude: Option<u64>,
        batch: &[Row],
    ) -> CResult<()> {
        for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
            let value = row.value(&col.name);
            if value.is_null() {
                continue;
            }
            let violation = || {
                EngineError::Constraint(ConstraintKind::Unique {
                    table: info.name.clone(),
                    column: col.name.clone(),
                    value: value.to_string(),
                })
            };
            if let Some(holder) = data.unique_holder(&col.name, &value) {
                let deleted_by_txn = txn.map(|t| t.has_deleted(table, holder)).unwrap_or(false);
                if Some(holder) != exclude && !deleted_by_txn {
                    return Err(violation());
                }
            }
            if let Some(txn) = txn {
                for (ctid, staged) in txn.staged_rows(table) {
                    if Some(ctid) == exclude {
                        continue;
                    }
                    if staged.value(&col.name).compare(&value) == Some(std::cmp::Ordering::Equal) {
                        return Err(violation());
                    }
                }
            }
            for earlier in batch {
                if earlier.value(&col.name).compare(&value) == Some(std::cmp::Ordering::Equal) {
                    return Err(violation());
                }
            }
        }
        Ok(())
    }

    /// The referenced parent row must be visible under the same view the
    /// operation runs with.
    fn check_foreign_keys(
        &self,
        info: &TableInfo,
        row: &Row,
        txn: Option<&mut Transaction>,
    ) -> CResult<()> {
        let mut txn = txn;
        for col in &info.columns {
            let Some(fk) = &col.foreign_key else { continue };
            let value = row.value(&col.name);
            if value.is_null() {
                continue;
            }
            let found =
                self.visible_match_exists(&fk.table, &fk.column, &value, txn.as_deref_mut())?;
            if !found {
                return Err(ConstraintKind::ForeignKey {
                    table: info.name.clone(),
                    column: col.name.clone(),
                    parent: format!("{}.{}", fk.table, fk.column),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Tables whose foreign keys point at `parent`, with the referencing
    /// column pairs.
    fn referencing_tables(&self, parent: &str) -> Vec<(String, String, ForeignKeyRef)> {
        let catalog = self.catalog.read().unwrap();
        let mut out = Vec::new();
        for store in catalog.values() {
            let info = store.info.read().unwrap();
            for col in &info.columns {
                if let Some(fk) = &col.foreign_key {
                    if fk.table == parent {
                        out.push((info.name.clone(), col.name.clone(), fk.clone()));
                    }
                }
            }
        }
        out.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        out
    }

    /// RESTRICT is the only implemented delete policy: refuse when children
    /// still reference any of the victim rows.
    fn check_delete_restrict(
        &self,
        table: &str,
        victims: &[(u64, Row)],
        txn: Option<&mut Transaction>,
    ) -> CResult<()> {
        let mut txn = txn;
        for (child_table, child_column, fk) in self.referencing_tables(table) {
            if fk.on_delete != ReferentialPolicy::Restrict
                && fk.on_delete != ReferentialPolicy::NoAction
            {
                continue;
            }
            for (victim_ctid, victim) in victims {
                let parent_value = victim.value(&fk.column);
                if parent_value.is_null() {
                    continue;
                }
                // the row being deleted referencing itself does not block
                if child_table == table {
                    let child_store = self.store(&child_table)?;
                    let rows = self.read_view(&child_store, &child_table, txn.as_deref_mut());
                    let blocked = rows.iter().any(|(ctid, row)| {
                        ctid != victim_ctid
                            && row.value(&child_column).compare(&parent_value)
                                == Some(std::cmp::Ordering::Equal)
                    });
                    if blocked {
                        return Err(ConstraintKind::ForeignKeyRestrict {
                            table: table.to_string(),
                            child_table: child_table.clone(),
                        }
                        .into());
                    }
                } else if self.visible_match_exists(
                    &child_table,
                    &child_column,
                    &parent_value,
                    txn.as_deref_mut(),
                )? {
                    return Err(ConstraintKind::ForeignKeyRestrict {
                        table: table.to_string(),
                        child_table: child_table.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn matches_all(filters: &[Filter], row: &Row) -> bool {
        filters.iter().all(|f| f.matches(row))
    }

    fn apply_options(rows: &mut Vec<(u64, Row)>, options: &QueryOptions) -> usize {
        rows.retain(|(_, row)| Self::matches_all(&options.filters, row));
        let total = rows.len();
        if let Some(key) = &options.order_by {
            rows.sort_by(|(_, a), (_, b)| {
                let ord = a.value(key).total_cmp(&b.value(key));
                match options.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        let offset = options.offset.unwrap_or(0);
        if offset > 0 {
            *rows = rows.split_off(offset.min(rows.len()));
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        total
    }

    /// Run `op` inside an implicit single-statement transaction: allocate an
    /// id, commit on success, abort on failure.
    fn autocommit<R>(&self, op: impl FnOnce(u64) -> CResult<R>) -> CResult<R> {
        let xid = self.commit_log.allocate();
        match op(xid) {
            Ok(out) => {
                self.commit_log.commit(xid);
                Ok(out)
            }
            Err(err) => {
                self.commit_log.abort(xid);
                Err(err)
            }
        }
    }

    fn insert_rows(
        &self,
        ctx: &QueryContext,
        store: &TableStore,
        table: &str,
        rows: &[Row],
    ) -> CResult<usize> {
        let info = store.info.read().unwrap().clone();

        if let Some(xid) = ctx.txn {
            let entry = self
                .txns
                .get(&xid)
                .ok_or_else(|| EngineError::Internal(format!("unknown transaction {}", xid)))?;
            let mut txn = entry.lock().unwrap();

            // validate the whole batch before staging anything, so a failed
            // statement leaves the table untouched
            let mut prepared = Vec::with_capacity(rows.len());
            for row in rows {
                let shaped = prepare_insert_row(store, &info, row)?;
                {
                    let data = store.data.read().unwrap();
                    self.check_unique(table, &data, &info, &shaped, Some(&*txn), None, &prepared)?;
                }
                self.check_foreign_keys(&info, &shaped, Some(&mut *txn))?;
                prepared.push(shaped);
            }
            for shaped in prepared {
                let ctid = store.next_ctid();
                txn.stage_insert(table, ctid, shaped);
            }
            Ok(rows.len())
        } else {
            self.autocommit(|xid| {
                let mut prepared = Vec::with_capacity(rows.len());
                for row in rows {
                    let shaped = prepare_insert_row(store, &info, row)?;
                    self.check_foreign_keys(&info, &shaped, None)?;
                    prepared.push(shaped);
                }
                let mut data = store.data.write().unwrap();
                for (i, shaped) in prepared.iter().enumerate() {
                    self.check_unique(table, &data, &info, shaped, None, None, &prepared[..i])?;
                }
                for shaped in prepared {
                    let ctid = store.next_ctid();
                    for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
                        let v = shaped.value(&col.name);
                        if !v.is_null() {
                            data.unique_insert(&col.name, &v, ctid);
                        }
                    }
                    data.versions.push(Arc::new(TupleVersion::new(ctid, xid, shaped)));
                }
                Ok(rows.len())
            })
        }
    }
}

impl DataSource for MemoryEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> CResult<()> {
        self.connected.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }

    /// Close aborts every transaction still open on this handle.
    fn close(&self) -> CResult<()> {
        let open: Vec<u64> = self.txns.iter().map(|e| *e.key()).collect();
        for xid in open {
            let _ = self.rollback(xid);
        }
        self.connected.store(false, AtomicOrdering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(AtomicOrdering::SeqCst)
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn get_tables(&self, _ctx: &QueryContext) -> CResult<Vec<String>> {
        let mut names: Vec<String> = self.catalog.read().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn get_table_info(&self, _ctx: &QueryContext, table: &str) -> CResult<TableInfo> {
        Ok(self.store(table)?.info.read().unwrap().clone())
    }

    fn estimated_rows(&self, _ctx: &QueryContext, table: &str) -> usize {
        self.store(table).map(|s| s.live_rows()).unwrap_or(0)
    }

    fn query(
        &self,
        ctx: &QueryContext,
        table: &str,
        options: &QueryOptions,
    ) -> CResult<QueryResult> {
        ctx.ensure_active()?;
        let store = self.store(table)?;

        let mut rows = if let Some(xid) = ctx.txn {
            let entry = self
                .txns
                .get(&xid)
                .ok_or_else(|| EngineError::Internal(format!("unknown transaction {}", xid)))?;
            let mut txn = entry.lock().unwrap();
            self.read_view(&store, table, Some(&mut *txn))
        } else {
            self.read_view(&store, table, None)
        };

        let total = Self::apply_options(&mut rows, options);

        let columns = if options.columns.is_empty() || options.select_all {
            store.info.read().unwrap().column_names()
        } else {
            options.columns.clone()
        };
        let project = !(options.columns.is_empty() || options.select_all);
        let rows = rows
            .into_iter()
            .map(|(_, row)| if project { row.project(&columns) } else { row })
            .collect();

        Ok(QueryResult {
            columns,
            rows,
            total,
        })
    }

    fn insert(&self, ctx: &QueryContext, table: &str, rows: &[Row]) -> CResult<usize> {
        ctx.ensure_active()?;
        self.require_writable()?;
        let store = self.store(table)?;
        self.insert_rows(ctx, &store, table, rows)
    }

    fn update(
        &self,
        ctx: &QueryContext,
        table: &str,
        filters: &[Filter],
        updates: &Row,
    ) -> CResult<usize> {
        ctx.ensure_active()?;
        self.require_writable()?;
        let store = self.store(table)?;
        let info = store.info.read().unwrap().clone();

        if let Some(xid) = ctx.txn {
            let entry = self
                .txns
                .get(&xid)
                .ok_or_else(|| EngineError::Internal(format!("unknown transaction {}", xid)))?;
            let mut txn = entry.lock().unwrap();

            let matched: Vec<(u64, Row)> = self
                .read_view(&store, table, Some(&mut *txn))
                .into_iter()
                .filter(|(_, row)| Self::matches_all(filters, row))
                .collect();

            // full validation first: a constraint error must leave the
            // statement without effect
            let mut staged = Vec::with_capacity(matched.len());
            for (old_ctid, old_row) in &matched {
                let new_row = apply_updates(&info, old_row, updates)?;
                {
                    let data = store.data.read().unwrap();
                    self.check_unique(
                        table,
                        &data,
                        &info,
                        &new_row,
                        Some(&*txn),
                        Some(*old_ctid),
                        &staged
                            .iter()
                            .map(|(_, r): &(u64, Row)| r.clone())
                            .collect::<Vec<_>>(),
                    )?;
                }
                self.check_foreign_keys(&info, &new_row, Some(&mut *txn))?;
                if let Some(auto) = info.auto_increment_column() {
                    if let Some(v) = new_row.value(&auto.name).as_u64() {
                        store.observe_auto_increment(v);
                    }
                }
                staged.push((*old_ctid, new_row));
            }
            for (old_ctid, new_row) in staged {
                txn.stage_delete(table, old_ctid);
                txn.stage_insert(table, store.next_ctid(), new_row);
            }
            Ok(matched.len())
        } else {
            self.autocommit(|xid| {
                let matched: Vec<(u64, Row)> = self
                    .read_view(&store, table, None)
                    .into_iter()
                    .filter(|(_, row)| Self::matches_all(filters, row))
                    .collect();

                let mut prepared = Vec::with_capacity(matched.len());
                for (old_ctid, old_row) in &matched {
                    let new_row = apply_updates(&info, old_row, updates)?;
                    self.check_foreign_keys(&info, &new_row, None)?;
                    prepared.push((*old_ctid, old_row.clone(), new_row));
                }

                let mut data = store.data.write().unwrap();
                for (i, (old_ctid, _, new_row)) in prepared.iter().enumerate() {
                    self.check_unique(
                        table,
                        &data,
                        &info,
                        new_row,
                        None,
                        Some(*old_ctid),
                        &prepared[..i].iter().map(|(_, _, r)| r.clone()).collect::<Vec<_>>(),
                    )?;
                }

                let mut affected = 0;
                for (old_ctid, old_row, new_row) in prepared {
                    let Some(old) = data.versions.iter().find(|v| v.ctid == old_ctid).cloned()
                    else {
                        continue;
                    };
                    // a concurrent committed delete between view and lock
                    // simply drops the row from the match set
                    if !old.mark_deleted(xid) {
                        continue;
                    }
                    let new_ctid = store.next_ctid();
                    for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
                        let old_v = old_row.value(&col.name);
                        if !old_v.is_null() {
                            data.unique_remove(&col.name, &old_v);
                        }
                        let new_v = new_row.value(&col.name);
                        if !new_v.is_null() {
                            data.unique_insert(&col.name, &new_v, new_ctid);
                        }
                    }
                    if let Some(auto) = info.auto_increment_column() {
                        if let Some(v) = new_row.value(&auto.name).as_u64() {
                            store.observe_auto_increment(v);
                        }
                    }
                    data.versions
                        .push(Arc::new(TupleVersion::new(new_ctid, xid, new_row)));
                    affected += 1;
                }
                Ok(affected)
            })
        }
    }

    fn delete(&self, ctx: &QueryContext, table: &str, filters: &[Filter]) -> CResult<usize> {
        ctx.ensure_active()?;
        self.require_writable()?;
        let store = self.store(table)?;
        let info = store.info.read().unwrap().clone();

        if let Some(xid) = ctx.txn {
            let entry = self
                .txns
                .get(&xid)
                .ok_or_else(|| EngineError::Internal(format!("unknown transaction {}", xid)))?;
            let mut txn = entry.lock().unwrap();

            let victims: Vec<(u64, Row)> = self
                .read_view(&store, table, Some(&mut *txn))
                .into_iter()
                .filter(|(_, row)| Self::matches_all(filters, row))
                .collect();
            self.check_delete_restrict(table, &victims, Some(&mut *txn))?;
            let affected = victims.len();
            for (ctid, _) in victims {
                txn.stage_delete(table, ctid);
            }
            Ok(affected)
        } else {
            self.autocommit(|xid| {
                let victims: Vec<(u64, Row)> = self
                    .read_view(&store, table, None)
                    .into_iter()
                    .filter(|(_, row)| Self::matches_all(filters, row))
                    .collect();
                self.check_delete_restrict(table, &victims, None)?;

                let mut data = store.data.write().unwrap();
                let mut affected = 0;
                for (ctid, row) in victims {
                    let Some(version) = data.versions.iter().find(|v| v.ctid == ctid).cloned()
                    else {
                        continue;
                    };
                    if !version.mark_deleted(xid) {
                        continue;
                    }
                    for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
                        let v = row.value(&col.name);
                        if !v.is_null() {
                            data.unique_remove(&col.name, &v);
                        }
                    }
                    affected += 1;
                }
                Ok(affected)
            })
        }
    }

    fn create_table(&self, _ctx: &QueryContext, info: &TableInfo) -> CResult<()> {
        self.require_writable()?;
        info.validate()?;
        // referenced parents must already exist with the named column
        for col in &info.columns {
            if let Some(fk) = &col.foreign_key {
                if fk.table != info.name {
                    let parent = self.store(&fk.table)?;
                    if parent.info.read().unwrap().column(&fk.column).is_none() {
                        return Err(EngineError::ColumnNotFound(format!(
                            "{}.{}",
                            fk.table, fk.column
                        )));
                    }
                } else if info.column(&fk.column).is_none() {
                    return Err(EngineError::ColumnNotFound(format!(
                        "{}.{}",
                        fk.table, fk.column
                    )));
                }
            }
        }
        let mut catalog = self.catalog.write().unwrap();
        if catalog.contains_key(&info.name) {
            return Err(EngineError::TableExists(info.name.clone()));
        }
        debug!("create table '{}' on source '{}'", info.name, self.name);
        catalog.insert(info.name.clone(), Arc::new(TableStore::new(info.clone())));
        Ok(())
    }

    fn drop_table(&self, _ctx: &QueryContext, table: &str) -> CResult<()> {
        self.require_writable()?;
        let referencing: Vec<String> = self
            .referencing_tables(table)
            .into_iter()
            .map(|(child, _, _)| child)
            .filter(|child| child != table)
            .collect();
        if let Some(child) = referencing.first() {
            return Err(ConstraintKind::ForeignKeyRestrict {
                table: table.to_string(),
                child_table: child.clone(),
            }
            .into());
        }
        let mut catalog = self.catalog.write().unwrap();
        if catalog.remove(table).is_none() {
            return Err(EngineError::TableNotFound(table.to_string()));
        }
        debug!("drop table '{}' on source '{}'", table, self.name);
        Ok(())
    }

    fn truncate_table(&self, _ctx: &QueryContext, table: &str) -> CResult<()> {
        self.require_writable()?;
        self.store(table)?.truncate();
        Ok(())
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalSource> {
        Some(self)
    }
}

impl TransactionalSource for MemoryEngine {
    fn begin(&self, level: IsolationLevel) -> CResult<u64> {
        let xid = self.commit_log.allocate();
        let snapshot = match level {
            IsolationLevel::ReadUncommitted => None,
            _ => Some(self.commit_log.snapshot()),
        };
        debug!("begin txn {} at {}", xid, level.name());
        self.txns
            .insert(xid, Mutex::new(Transaction::new(xid, level, snapshot)));
        Ok(xid)
    }

    fn commit(&self, xid: u64) -> CResult<()> {
        let (_, txn_lock) = self
            .txns
            .remove(&xid)
            .ok_or_else(|| EngineError::Internal(format!("unknown transaction {}", xid)))?;
        let mut txn = txn_lock.into_inner().unwrap();
        if !txn.is_active() {
            return Err(EngineError::Internal(format!(
                "transaction {} is not active",
                xid
            )));
        }

        match self.apply_commit(&mut txn) {
            Ok(()) => {
                txn.state = TxnState::Committed;
                self.commit_log.commit(xid);
                debug!("commit txn {}", xid);
                Ok(())
            }
            Err(err) => {
                txn.state = TxnState::Aborted;
                self.commit_log.abort(xid);
                debug!("abort txn {} at commit: {}", xid, err);
                Err(err)
            }
        }
    }

    fn rollback(&self, xid: u64) -> CResult<()> {
        let (_, txn_lock) = self
            .txns
            .remove(&xid)
            .ok_or_else(|| EngineError::Internal(format!("unknown transaction {}", xid)))?;
        let mut txn = txn_lock.into_inner().unwrap();
        txn.state = TxnState::Aborted;
        self.commit_log.abort(xid);
        debug!("rollback txn {}", xid);
        Ok(())
    }

    fn begin_statement(&self, xid: u64) -> CResult<()> {
        let entry = self
            .txns
            .get(&xid)
            .ok_or_else(|| EngineError::Internal(format!("unknown transaction {}", xid)))?;
        let mut txn = entry.lock().unwrap();
        if txn.isolation == IsolationLevel::ReadCommitted {
            txn.snapshot = Some(self.commit_log.snapshot());
        }
        Ok(())
    }
}

impl MemoryEngine {
    /// Publication: take every touched (and, for serializable, read) table's
    /// exclusive lock in lexicographic order, validate, then apply. Nothing
    /// is mutated before validation finishes, so failure needs no undo.
    fn apply_commit(&self, txn: &mut Transaction) -> CResult<()> {
        let mut tables: BTreeSet<String> = txn.touched_tables();
        if txn.isolation == IsolationLevel::Serializable {
            tables.extend(txn.read_tables.iter().cloned());
        }
        if tables.is_empty() {
            return Ok(());
        }

        let mut stores = Vec::new();
        for table in &tables {
            // a table dropped mid-transaction invalidates its changes
            match self.store(table) {
                Ok(store) => stores.push((table.clone(), store)),
                Err(_) if !txn.write_set.contains_key(table) && !txn.delete_set.contains_key(table) => {}
                Err(err) => return Err(err),
            }
        }

        let mut guards: HashMap<String, RwLockWriteGuard<TableData>> = HashMap::new();
        for (table, store) in &stores {
            let mut acquired = None;
            for _ in 0..COMMIT_LOCK_ATTEMPTS {
                match store.data.try_write() {
                    Ok(guard) => {
                        acquired = Some(guard);
                        break;
                    }
                    Err(_) => std::thread::sleep(COMMIT_LOCK_BACKOFF),
                }
            }
            let guard = acquired.ok_or_else(|| {
                EngineError::LockConflict(format!(
                    "could not acquire commit lock on table '{}'",
                    table
                ))
            })?;
            guards.insert(table.clone(), guard);
        }

        if txn.isolation == IsolationLevel::Serializable {
            self.validate_serializable(txn, &guards)?;
        }

        // first-updater-wins: every deleted tuple must still be live
        for (table, ctids) in &txn.delete_set {
            let Some(data) = guards.get(table) else { continue };
            for ctid in ctids {
                match data.versions.iter().find(|v| v.ctid == *ctid) {
                    Some(v) if v.is_live() => {}
                    _ => {
                        return Err(EngineError::Serialization(format!(
                            "row in table '{}' was changed by a concurrent transaction",
                            table
                        )))
                    }
                }
            }
        }

        // re-validate unique against the now-current committed state
        for (table, staged) in &txn.write_set {
            let Some(store) = stores.iter().find(|(t, _)| t == table).map(|(_, s)| s) else {
                continue;
            };
            let Some(data) = guards.get(table) else { continue };
            let info = store.info.read().unwrap();
            for row in staged.values() {
                for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
                    let v = row.value(&col.name);
                    if v.is_null() {
                        continue;
                    }
                    if let Some(holder) = data.unique_holder(&col.name, &v) {
                        if !txn.has_deleted(table, holder) {
                            return Err(ConstraintKind::Unique {
                                table: table.clone(),
                                column: col.name.clone(),
                                value: v.to_string(),
                            }
                            .into());
                        }
                    }
                }
            }
        }

        // apply: deletes first so unique slots free up for the new versions
        for (table, ctids) in &txn.delete_set {
            let Some(store) = stores.iter().find(|(t, _)| t == table).map(|(_, s)| s) else {
                continue;
            };
            let Some(data) = guards.get_mut(table) else { continue };
            let info = store.info.read().unwrap().clone();
            for ctid in ctids {
                let Some(version) = data.versions.iter().find(|v| v.ctid == *ctid).cloned() else {
                    continue;
                };
                version.mark_deleted(txn.id);
                for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
                    let v = version.data.value(&col.name);
                    if !v.is_null() {
                        data.unique_remove(&col.name, &v);
                    }
                }
            }
        }
        for (table, staged) in &txn.write_set {
            let Some(store) = stores.iter().find(|(t, _)| t == table).map(|(_, s)| s) else {
                continue;
            };
            let Some(data) = guards.get_mut(table) else { continue };
            let info = store.info.read().unwrap().clone();
            for (ctid, row) in staged {
                for col in info.columns.iter().filter(|c| c.needs_unique_index()) {
                    let v = row.value(&col.name);
                    if !v.is_null() {
                        data.unique_insert(&col.name, &v, *ctid);
                    }
                }
                data.versions
                    .push(Arc::new(TupleVersion::new(*ctid, txn.id, row.clone())));
            }
        }
        Ok(())
    }

    /// Commit-time validation: abort when a table this transaction read
    /// gained committed versions after its snapshot, or a row it read was
    /// deleted by a later committed transaction.
    fn validate_serializable(
        &self,
        txn: &Transaction,
        guards: &HashMap<String, RwLockWriteGuard<TableData>>,
    ) -> CResult<()> {
        let snapshot: &Snapshot = txn
            .snapshot
            .as_ref()
            .ok_or_else(|| EngineError::Internal("serializable transaction without snapshot".into()))?;
        for table in &txn.read_tables {
            let Some(data) = guards.get(table) else { continue };
            let read_ctids = txn.read_set.get(table);
            for version in &data.versions {
                if version.xmin != txn.id && self.commit_log.committed_since(version.xmin, snapshot)
                {
                    return Err(EngineError::Serialization(format!(
                        "table '{}' was modified by a concurrent transaction",
                        table
                    )));
                }
                let xmax = version.xmax();
                if xmax != INFINITY
                    && xmax != txn.id
                    && self.commit_log.committed_since(xmax, snapshot)
                    && read_ctids.map(|s| s.contains(&version.ctid)).unwrap_or(false)
                {
                    return Err(EngineError::Serialization(format!(
                        "row read from table '{}' was deleted by a concurrent transaction",
                        table
                    )));
                }
            }
        }
        Ok(())
    }
}
