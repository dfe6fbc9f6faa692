use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use tokio_util::sync::CancellationToken as Cancellation;

#[derive(Clone)]
pub struct AutofyHandle {
    inner: Handle,
    cancel: CancellationToken,
}

pub struct AutofyRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl AutofyRuntime {
    /// Build a multi-thread Tokio runtime with a shared cancellation token.
    ///
    /// ```
    /// use autofy_runtime::AutofyRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = AutofyRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    /// Obtain a cloned handle for spawning tasks and sharing cancellation.
    ///
    /// ```
    /// use autofy_runtime::AutofyRuntime;
    ///
    /// let runtime = AutofyRuntime::build("handle-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// assert!(!handle.cancellation().is_cancelled());
    /// ```
    pub fn handle(&self) -> AutofyHandle {
        AutofyHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Run a future to completion on the runtime.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel the shared token on the first Ctrl-C. Returns the watcher task.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    match res {
                        Ok(()) => tracing::warn!("interrupt received, stopping"),
                        Err(e) => {
                            tracing::error!(error = %e, "could not listen for Ctrl-C");
                            return;
                        }
                    }
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        })
    }

    /// Cancel outstanding work and shut the runtime down gracefully.
    ///
    /// ```
    /// use autofy_runtime::AutofyRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = AutofyRuntime::build("shutdown-example", Some(1)).unwrap();
    /// let cancel = runtime.handle().cancellation();
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(cancel.is_cancelled());
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl AutofyHandle {
    /// Spawn a future onto the shared runtime handle.
    ///
    /// ```
    /// use autofy_runtime::AutofyRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = AutofyRuntime::build("handle-doctest", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let task = handle.spawn(async { 21 * 2 });
    /// let result = runtime.block_on(async move { task.await.unwrap() });
    /// assert_eq!(result, 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// Clone the shared cancellation token.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Sleep for `duration` unless `cancel` fires first. Returns `false` when
/// cancelled.
///
/// ```
/// use autofy_runtime::{Cancellation, sleep_or_cancel};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cancel = Cancellation::new();
/// assert!(sleep_or_cancel(Duration::from_millis(1), &cancel).await);
/// cancel.cancel();
/// assert!(!sleep_or_cancel(Duration::from_secs(60), &cancel).await);
/// # }
/// ```
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
