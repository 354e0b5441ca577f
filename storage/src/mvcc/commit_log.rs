use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::mvcc::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Committed,
    Aborted,
}

/// Authority for transaction outcomes. Snapshots are cut here so the
/// id counter and the active set stay consistent.
#[derive(Debug, Default)]
pub struct CommitLog {
    /// Next transaction id; ids are monotone and never reused.
    next_xid: AtomicU64,
    statuses: DashMap<u64, TxnStatus>,
    active: DashMap<u64, ()>,
}

impl CommitLog {
    pub fn new() -> Self {
        CommitLog {
            next_xid: AtomicU64::new(1),
            statuses: DashMap::new(),
            active: DashMap::new(),
        }
    }

    pub fn allocate(&self) -> u64 {
        let xid = self.next_xid.fetch_add(1, Ordering::SeqCst);
        self.active.insert(xid, ());
        xid
    }

    /// Cut a snapshot: ids at or past `xmax`, and ids still active now, are
    /// invisible. Reading `next_xid` first keeps a racing allocate() safe:
    /// the latecomer's id is past our xmax either way.
    pub fn snapshot(&self) -> Snapshot {
        let xmax = self.next_xid.load(Ordering::SeqCst);
        let in_progress = self.active.iter().map(|e| *e.key()).collect();
        Snapshot { xmax, in_progress }
    }

    pub fn commit(&self, xid: u64) {
        self.statuses.insert(xid, TxnStatus::Committed);
        self.active.remove(&xid);
    }

    pub fn abort(&self, xid: u64) {
        self.statuses.insert(xid, TxnStatus::Aborted);
        self.active.remove(&xid);
    }

    pub fn status(&self, xid: u64) -> Option<TxnStatus> {
        self.statuses.get(&xid).map(|s| *s)
    }

    pub fn is_committed(&self, xid: u64) -> bool {
        self.status(xid) == Some(TxnStatus::Committed)
    }

    /// True when `xid` committed after `snapshot` was cut. Serializable
    /// commit validation is built on this.
    pub fn committed_since(&self, xid: u64, snapshot: &Snapshot) -> bool {
        self.is_committed(xid) && !snapshot.sees_xid(xid)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snapshot_tracks_active_set() {
        let log = CommitLog::new();
        let a = log.allocate();
        let b = log.allocate();
        log.commit(a);

        let snap = log.snapshot();
        assert!(snap.sees_xid(a));
        assert!(!snap.sees_xid(b));

        log.commit(b);
        assert!(log.committed_since(b, &snap));
        assert!(!log.committed_since(a, &snap));
    }

    #[test]
    fn aborted_never_committed() {
        let log = CommitLog::new();
        let a = log.allocate();
        log.abort(a);
        assert_eq!(log.status(a), Some(TxnStatus::Aborted));
        assert!(!log.is_committed(a));
    }
}
