//! Last-call-wins matrix generation.
//!
//! Each [`MatrixSession::generate`] call supersedes the ones before it. The older calls resolve
//! to [`RenderError::Superseded`] instead of a matrix, so a stale symbol is never rendered.

use crate::error::{RenderError, Result};
use crate::matrix::{MatrixProvider, MatrixRequest, ModuleMatrix};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::debug;

/// Runs a provider on the blocking pool, one live request at a time.
pub struct MatrixSession<P> {
    provider: Arc<P>,
    generation: AtomicU64,
    in_flight: Mutex<Option<(u64, AbortHandle)>>,
}

impl<P: MatrixProvider + 'static> MatrixSession<P> {
    pub fn new(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<P>) -> Self {
        Self {
            provider,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    /// Generation of the most recent request.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Generates a matrix, cancelling whatever request was in flight.
    pub async fn generate(&self, request: MatrixRequest) -> Result<ModuleMatrix> {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let provider = Arc::clone(&self.provider);
        let handle = tokio::task::spawn_blocking(move || provider.generate(&request));
        self.register(mine, handle.abort_handle()).await;

        let outcome = handle.await;
        if self.generation() != mine {
            debug!(generation = mine, latest = self.generation(), "matrix request superseded");
            return Err(RenderError::Superseded);
        }
        match outcome {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(RenderError::Superseded),
            Err(err) => Err(RenderError::Task(err.to_string())),
        }
    }

    /// Records `handle` as the live request unless a newer generation already holds the slot.
    /// Whichever of the two loses is aborted.
    async fn register(&self, mine: u64, handle: AbortHandle) {
        let mut in_flight = self.in_flight.lock().await;
        match in_flight.as_ref() {
            Some((held, _)) if *held > mine => {
                debug!(generation = mine, latest = *held, "registered after a newer request");
                handle.abort();
            }
            _ => {
                if let Some((_, previous)) = in_flight.replace((mine, handle)) {
                    previous.abort();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{EccLevel, QrEncoder};
    use std::time::Duration;

    struct Slow;

    impl MatrixProvider for Slow {
        fn generate(&self, request: &MatrixRequest) -> Result<ModuleMatrix> {
            if request.value == "slow" {
                std::thread::sleep(Duration::from_millis(300));
            }
            QrEncoder.generate(request)
        }
    }

    #[tokio::test]
    async fn test_sequential_requests_succeed() {
        let session = MatrixSession::new(QrEncoder);
        let a = session.generate(MatrixRequest::new("one", EccLevel::M)).await.unwrap();
        let b = session.generate(MatrixRequest::new("two", EccLevel::M)).await.unwrap();
        assert_eq!(a.size(), 21);
        assert_eq!(b.size(), 21);
        assert_eq!(session.generation(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_newer_request_supersedes_older() {
        let session = Arc::new(MatrixSession::new(Slow));
        let older = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.generate(MatrixRequest::new("slow", EccLevel::M)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let newer = session.generate(MatrixRequest::new("fast", EccLevel::M)).await;
        assert!(newer.is_ok());
        assert!(matches!(older.await.unwrap(), Err(RenderError::Superseded)));
    }

    #[tokio::test]
    async fn test_late_registration_keeps_newer_request() {
        let session = MatrixSession::new(QrEncoder);
        let newer = tokio::spawn(async { tokio::time::sleep(Duration::from_millis(50)).await });
        let older = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(10)).await });

        session.register(2, newer.abort_handle()).await;
        session.register(1, older.abort_handle()).await;

        assert!(older.await.unwrap_err().is_cancelled());
        assert!(newer.await.is_ok());
        let held = session.in_flight.lock().await;
        assert_eq!(held.as_ref().map(|(generation, _)| *generation), Some(2));
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let session = MatrixSession::new(QrEncoder);
        let request = MatrixRequest::new("x".repeat(100), EccLevel::H).with_max_version(2);
        assert!(matches!(
            session.generate(request).await,
            Err(RenderError::CapacityExceeded { max_version: 2, .. })
        ));
    }
}
