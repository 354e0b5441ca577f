use std::sync::atomic::{AtomicU64, Ordering};

use common::row::Row;

/// `xmax` value of a version nobody deleted.
pub const INFINITY: u64 = u64::MAX;

/// One immutable tuple version. Only `xmax` ever changes after creation,
/// through a single compare-and-swap from infinity to the deleter's id.
#[derive(Debug)]
pub struct TupleVersion {
    /// Stable locator inside the owning table.
    pub ctid: u64,
    /// Creating transaction.
    pub xmin: u64,
    /// Deleting transaction, infinity while live.
    xmax: AtomicU64,
    pub data: Row,
}

impl TupleVersion {
    pub fn new(ctid: u64, xmin: u64, data: Row) -> Self {
        TupleVersion {
            ctid,
            xmin,
            xmax: AtomicU64::new(INFINITY),
            data,
        }
    }

    pub fn xmax(&self) -> u64 {
        self.xmax.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        self.xmax() == INFINITY
    }

    /// Flip the deletion mark. Fails when another transaction already
    /// claimed the tuple; the caller turns that into a conflict error.
    pub fn mark_deleted(&self, xid: u64) -> bool {
        self.xmax
            .compare_exchange(INFINITY, xid, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delete_mark_is_exclusive() {
        let v = TupleVersion::new(1, 7, Row::new());
        assert!(v.is_live());
        assert!(v.mark_deleted(9));
        assert!(!v.mark_deleted(10));
        assert_eq!(v.xmax(), 9);
    }
}
