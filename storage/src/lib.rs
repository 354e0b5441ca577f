pub mod mvcc;
pub mod registry;

pub use mvcc::engine::MemoryEngine;
