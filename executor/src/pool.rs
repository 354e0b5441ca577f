use std::sync::{OnceLock, RwLock};

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

/// Offload for parallel scans: chunk jobs run as blocking tasks on a
/// shared tokio runtime. Inside the server that is the server's own
/// runtime; embedded and test callers get a small owned runtime built on
/// first use. Chunk ordering and back-pressure come from the bounded
/// channel the scan collects on, not from the task pool.

static WORKERS: OnceLock<usize> = OnceLock::new();
static ATTACHED: Lazy<RwLock<Option<Handle>>> = Lazy::new(|| RwLock::new(None));
static OWNED: Lazy<RwLock<Option<Runtime>>> = Lazy::new(|| RwLock::new(None));

/// Cap for the owned fallback runtime's blocking threads; later calls are
/// ignored.
pub fn init(workers: usize) {
    let _ = WORKERS.set(workers.max(1));
}

pub fn workers() -> usize {
    *WORKERS.get_or_init(|| 4)
}

/// Share an already-running runtime (the server's) so scan tasks land on
/// its blocking pool instead of a second one.
pub fn attach_runtime(handle: Handle) {
    *ATTACHED.write().unwrap() = Some(handle);
}

fn handle() -> Handle {
    if let Some(handle) = ATTACHED.read().unwrap().clone() {
        return handle;
    }
    {
        let owned = OWNED.read().unwrap();
        if let Some(runtime) = owned.as_ref() {
            return runtime.handle().clone();
        }
    }
    let mut owned = OWNED.write().unwrap();
    if owned.is_none() {
        debug!("starting scan runtime with {} blocking threads", workers());
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers())
            .thread_name("scan-worker")
            .build()
            .expect("build scan runtime");
        *owned = Some(runtime);
    }
    owned.as_ref().unwrap().handle().clone()
}

/// Run one scan chunk on the blocking pool. The job reports its result
/// through whatever channel the caller collects on.
pub fn spawn_blocking(job: impl FnOnce() + Send + 'static) {
    let _ = handle().spawn_blocking(job);
}

/// Detach from the shared runtime and wind down the owned one, letting
/// queued chunks finish in the background.
pub fn shutdown() {
    *ATTACHED.write().unwrap() = None;
    if let Some(runtime) = OWNED.write().unwrap().take() {
        runtime.shutdown_background();
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn runs_submitted_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        for _ in 0..16 {
            let counter = counter.clone();
            let done = done_tx.clone();
            spawn_blocking(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done.send(());
            });
        }
        for _ in 0..16 {
            done_rx
                .recv_timeout(std::time::Duration::from_secs(5))
                .unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn attached_runtime_takes_priority() {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        attach_runtime(runtime.handle().clone());
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        spawn_blocking(move || {
            let _ = done_tx.send(std::thread::current().name().map(String::from));
        });
        let _name = done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        shutdown();
        runtime.shutdown_background();
    }
}
