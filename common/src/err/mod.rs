pub mod engine_error;

pub use engine_error::{ConstraintKind, EngineError};

pub type CResult<T> = Result<T, EngineError>;
