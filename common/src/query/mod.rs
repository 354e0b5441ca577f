pub mod filter;
pub mod options;

pub use filter::{Filter, FilterLogic, FilterOp};
pub use options::{QueryOptions, SortOrder};
