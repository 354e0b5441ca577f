//! In-memory MVCC table store.
//!
//! Every table keeps a list of immutable tuple versions. A version carries
//! the id of the transaction that created it (`xmin`) and, once deleted, the
//! id of the deleter (`xmax`, atomically flipped from infinity exactly once).
//!
//! Transactions never touch the shared version lists while running: their
//! inserts and deletes accumulate in private write/delete sets and are
//! published in one step at commit, under the exclusive locks of every table
//! they touched (acquired in lexicographic name order). Aborted transactions
//! therefore leave no trace, and readers holding a snapshot keep seeing the
//! state as of their snapshot:
//!
//! Time
//! 4        b@4
//! 3  a@3        (x)
//! 1  a@1   b@1  c@1
//!    a     b    c     rows (x = xmax set, version dead)
//!
//! A snapshot is the pair {xmax, in-progress set}. A version is visible when
//! its creator committed before the snapshot (`xmin < xmax`, not in the
//! in-progress set) and its deleter did not. A transaction always sees its
//! own staged writes and never its own staged deletes.
//!
//! Writers don't block readers. Readers don't block writers.

pub mod commit_log;
pub mod constraints;
pub mod engine;
pub mod snapshot;
pub mod table;
pub mod transaction;
pub mod version;
