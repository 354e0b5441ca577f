/// Server status bits carried in OK and EOF packets.

/// A multi-statement transaction is open.
pub(crate) const SERVER_STATUS_IN_TRANS: u16 = 0x0001;

/// Server in auto_commit mode.
pub(crate) const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;

/// Multi query - next query exists.
pub(crate) const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;

pub(crate) const SERVER_STATUS_NO_INDEX_USED: u16 = 0x0020;

pub(crate) const SERVER_STATUS_LAST_ROW_SENT: u16 = 0x0080;

pub(crate) const SERVER_STATUS_DB_DROPPED: u16 = 0x0100;

pub(crate) const SERVER_QUERY_WAS_SLOW: u16 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    status_flags: u16,
}

impl StatusFlags {
    pub fn new(status_flags: u16) -> Self {
        StatusFlags { status_flags }
    }

    pub fn empty() -> Self {
        StatusFlags::new(0)
    }

    pub fn contains(&self, status_flag: u16) -> bool {
        (self.status_flags & status_flag) != 0
    }

    pub fn insert(&mut self, status_flag: u16) {
        self.status_flags |= status_flag;
    }

    pub fn value(&self) -> u16 {
        self.status_flags
    }
}

/// The status word for a session: autocommit bit plus the open-transaction
/// bit.
pub fn session_status(autocommit: bool, in_transaction: bool) -> StatusFlags {
    let mut flags = StatusFlags::empty();
    if autocommit {
        flags.insert(SERVER_STATUS_AUTOCOMMIT);
    }
    if in_transaction {
        flags.insert(SERVER_STATUS_IN_TRANS);
    }
    flags
}
