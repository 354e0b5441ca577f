use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use common::config::{DataSourceConfig, EngineConfig};
use common::datasource::connect_with_retry;
use common::err::{CResult, EngineError};
use common::server::Server;
use executor::{cache, monitor, pool};
use storage::registry;

use crate::conn::ConnectionHandler;
use crate::session::{Session, SourceSet};

/// TCP front-end: accepts sockets and runs one protocol state machine per
/// connection on its own thread. Statements within a connection stay
/// strictly sequential.
pub struct MySqlServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: EngineConfig,
    sources: Arc<SourceSet>,
    shutdown: AtomicBool,
    next_session_id: AtomicU64,
}

impl MySqlServer {
    /// Wires up the process-wide singletons, builds every configured data
    /// source through the factory registry and connects them (with
    /// backoff). Configuration problems surface here, before the listener
    /// ever binds.
    pub fn new(config: EngineConfig) -> CResult<MySqlServer> {
        registry::init();
        pool::init(config.server.workers);
        cache::init(
            config.server.cache_capacity,
            Duration::from_millis(config.server.cache_ttl_ms),
        );
        monitor::init(Duration::from_millis(config.server.slow_query_ms));

        let mut sources = SourceSet::new();
        let source_configs = if config.sources.is_empty() {
            vec![DataSourceConfig::memory(
                config.server.default_database.clone(),
            )]
        } else {
            config.sources.clone()
        };
        for source_config in &source_configs {
            let source = registry::create(source_config)?;
            connect_with_retry(source.as_ref())?;
            let key = source_config
                .database
                .clone()
                .unwrap_or_else(|| source_config.name.clone());
            debug!("registered data source '{}' ({:?})", key, source_config.source_type);
            sources.insert(key, source);
        }
        if sources.get(&config.server.default_database).is_none() {
            return Err(EngineError::Config(format!(
                "default database '{}' is not among the configured sources",
                config.server.default_database
            )));
        }

        Ok(MySqlServer {
            inner: Arc::new(ServerInner {
                config,
                sources: Arc::new(sources),
                shutdown: AtomicBool::new(false),
                next_session_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn request_shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
    }

    /// Accept loop; blocks the calling thread until shutdown is requested.
    pub fn serve_blocking(&self) -> CResult<()> {
        self.inner.serve()
    }
}

impl ServerInner {
    fn serve(self: &Arc<Self>) -> CResult<()> {
        let address = format!(
            "{}:{}",
            self.config.server.host, self.config.server.port
        );
        let listener = TcpListener::bind(&address).map_err(|e| {
            EngineError::Connection(format!("cannot listen on {}: {}", address, e))
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| EngineError::Connection(format!("cannot configure listener: {}", e)))?;
        info!("listening on {}", address);

        while !self.shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("dropping connection from {}: {}", peer, e);
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
                    debug!("accepted connection {} from {}", session_id, peer);
                    let inner = Arc::clone(self);
                    std::thread::Builder::new()
                        .name(format!("conn-{}", session_id))
                        .spawn(move || inner.run_connection(session_id, stream))
                        .map_err(|e| {
                            EngineError::Connection(format!("cannot spawn handler: {}", e))
                        })?;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    warn!("accept failed: {}", e);
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
        info!("server shutting down");
        Ok(())
    }

    fn run_connection(&self, session_id: u64, stream: std::net::TcpStream) {
        if let Some(m) = monitor::global() {
            m.connection_opened();
        }
        let session = Session::new(
            session_id,
            Arc::clone(&self.sources),
            self.config.server.clone(),
        );
        let handler = ConnectionHandler::new(
            stream,
            session,
            &self.config.server.user,
            &self.config.server.password,
        );
        match handler.run() {
            Ok(()) => debug!("connection {} closed", session_id),
            Err(err) if err.is_fatal() => {
                // invariant violations take the process down
                error!("fatal engine error on connection {}: {}", session_id, err);
                std::process::exit(1);
            }
            Err(err) => warn!("connection {} terminated: {}", session_id, err),
        }
        if let Some(m) = monitor::global() {
            m.connection_closed();
        }
    }
}

#[async_trait::async_trait]
impl Server for MySqlServer {
    async fn start(&mut self) -> CResult<()> {
        // parallel scans share this runtime's blocking pool
        pool::attach_runtime(tokio::runtime::Handle::current());
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.serve())
            .await
            .map_err(|e| EngineError::Internal(format!("accept loop panicked: {}", e)))?
    }

    async fn shutdown(&mut self, _graceful: bool) -> CResult<()> {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        cache::shutdown();
        monitor::shutdown();
        pool::shutdown();
        registry::shutdown();
        Ok(())
    }
}
