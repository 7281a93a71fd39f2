//! Cleanup that still runs when a request future is dropped mid-flight.
//!
//! A client disconnect drops the whole request future, so cleanup written
//! after the last `.await` never runs. These guards move it into `Drop`.

use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

type ReleaseFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs an async release step exactly once: awaited through
/// [`ReleaseGuard::release`], or spawned onto the runtime when dropped.
pub(crate) struct ReleaseGuard {
    what: &'static str,
    release: Option<ReleaseFuture>,
}

impl ReleaseGuard {
    pub(crate) fn new(what: &'static str, release: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            what,
            release: Some(Box::pin(release)),
        }
    }

    /// Release now and wait for it to finish.
    pub(crate) async fn release(mut self) {
        if let Some(release) = self.release.take() {
            release.await;
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Request dropped, releasing {} in the background", self.what);
                runtime.spawn(release);
            }
            Err(_) => warn!("No runtime left to release {}", self.what),
        }
    }
}

/// Aborts a background task when dropped.
pub(crate) struct AbortOnDrop(JoinHandle<()>);

impl AbortOnDrop {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self(task)
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
