use std::collections::HashSet;

use crate::mvcc::version::{TupleVersion, INFINITY};

/// A view of the store as of one moment: every transaction id below `xmax`
/// that is not in `in_progress` had committed (or aborted and left nothing
/// behind) when the snapshot was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub xmax: u64,
    pub in_progress: HashSet<u64>,
}

impl Snapshot {
    /// Did `xid` commit before this snapshot was taken?
    pub fn sees_xid(&self, xid: u64) -> bool {
        xid < self.xmax && !self.in_progress.contains(&xid)
    }

    /// The definitive visibility rule. `self_xid` is the reading
    /// transaction: its own writes are visible, its own deletes are not.
    pub fn sees(&self, version: &TupleVersion, self_xid: Option<u64>) -> bool {
        let xmax = version.xmax();
        if let Some(me) = self_xid {
            if xmax == me {
                return false;
            }
            if version.xmin == me {
                return true;
            }
        }
        if !self.sees_xid(version.xmin) {
            return false;
        }
        // a deletion only hides the tuple once the deleter committed
        // before the snapshot
        xmax == INFINITY || !self.sees_xid(xmax)
    }
}
