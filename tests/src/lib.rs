//! End-to-end scenarios driven through the whole stack: parser, planner,
//! executor, MVCC engine, and (for the wire tests) a real TCP client.

pub mod util;

mod test_constraints;
mod test_join_exec;
mod test_pushdown;
mod test_session;
mod test_snapshot_isolation;
mod test_wire;
