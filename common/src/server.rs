use crate::err::CResult;

/// Server have start / shutdown functions
#[async_trait::async_trait]
pub trait Server: Send {
    async fn start(&mut self) -> CResult<()>;

    async fn shutdown(&mut self, graceful: bool) -> CResult<()>;
}
