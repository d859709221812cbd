//! Runs a set of listeners as one unit.
//!
//! Every listener in a [`ServerSet`] is spawned as its own task. The set lives and dies together:
//! if any listener stops before shutdown was requested, all others are cancelled and the run fails.
//! On shutdown, listeners drain through the shared [`elegant_departure`] guard.

use std::future::Future;

use anyhow::{Result, anyhow, bail};
use futures_util::{FutureExt, future};
use tokio::signal::unix::SignalKind;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

use crate::driver::{Driver, StartFn};

/// An ordered collection of named listeners, consumed by [`run`].
#[derive(Default)]
pub struct ServerSet {
    servers: Vec<(&'static str, StartFn)>,
}

impl std::fmt::Debug for ServerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ServerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the listener produced by `driver`.
    #[must_use]
    pub fn with_driver(self, driver: impl Driver) -> Self {
        let name = driver.name();
        self.with_server(name, driver.into_start_fn())
    }

    /// Adds a listener under `name`.
    #[must_use]
    pub fn with_server(mut self, name: &'static str, start: StartFn) -> Self {
        self.servers.push((name, start));
        self
    }

    /// Number of listeners in the set.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns `true` if the set has no listeners.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Names of the listeners, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.servers.iter().map(|(name, _)| *name)
    }
}

/// Wraps a closure into a [`StartFn`].
pub fn start_fn<F, Fut>(f: F) -> StartFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

/// Runs all listeners until the process receives a termination signal.
///
/// Handles SIGTERM, SIGINT, SIGHUP and SIGQUIT. Returns an error if any listener stops before
/// that.
pub async fn run(servers: ServerSet) -> Result<()> {
    // Resolves as soon as shutdown starts, while `depart` waits for all guards to be released.
    let shutdown = elegant_departure::get_shutdown_guard().wait_owned();

    let departure = tokio::spawn(async {
        elegant_departure::tokio::depart()
            .on_termination()
            .on_sigint()
            .on_signal(SignalKind::hangup())
            .on_signal(SignalKind::quit())
            .await;
    });

    let result = run_until(servers, async {
        shutdown.await;
        tracing::info!("shutting down ...");
    })
    .await;

    match result {
        Ok(()) => {
            departure.await.ok();
            tracing::info!("shutdown complete");
        }
        Err(_) => departure.abort(),
    }

    result
}

/// Runs all listeners until `shutdown` resolves.
///
/// If a listener exits first, for whatever reason, the remaining listeners are cancelled and an
/// error naming the listener is returned. Once `shutdown` resolves, listeners get to finish on
/// their own and the first error among them, if any, is returned.
pub async fn run_until<F>(servers: ServerSet, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    if servers.is_empty() {
        bail!("no listeners configured");
    }

    let mut names = Vec::with_capacity(servers.len());
    let mut handles = Vec::with_capacity(servers.len());
    for (name, start) in servers.servers {
        tracing::debug!(listener = name, "starting listener");
        names.push(name);
        handles.push(tokio::spawn(start()));
    }

    // Listeners never outlive a cancelled run.
    let _abort = AbortOnDrop(handles.iter().map(JoinHandle::abort_handle).collect());

    let stopped = tokio::select! {
        biased;

        () = shutdown => None,
        (result, index, _) = future::select_all(handles.iter_mut()) => Some((result, index)),
    };

    match stopped {
        Some((result, index)) => {
            let name = names.remove(index);
            handles.remove(index);
            abort_all(handles).await;

            let error = match result {
                Ok(Ok(())) => anyhow!("listener `{name}` stopped unexpectedly"),
                Ok(Err(error)) => error.context(format!("listener `{name}` failed")),
                Err(error) => panic_error(error).context(format!("listener `{name}` failed")),
            };

            tracing::error!("stopping all listeners: {error:#}");
            Err(error)
        }
        None => {
            tracing::debug!("waiting for listeners to drain");

            let mut first_error = None;
            for (name, handle) in names.into_iter().zip(handles) {
                let result = handle.await.unwrap_or_else(|error| Err(panic_error(error)));
                if let Err(error) = result {
                    tracing::error!(listener = name, "failed during shutdown: {error:#}");
                    first_error.get_or_insert(error.context(format!("listener `{name}` failed")));
                }
            }

            first_error.map_or(Ok(()), Err)
        }
    }
}

struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Cancels the given tasks and waits until they are gone.
async fn abort_all(handles: Vec<JoinHandle<Result<()>>>) {
    for handle in &handles {
        handle.abort();
    }
    for handle in handles {
        // Results of cancelled tasks are irrelevant.
        handle.await.ok();
    }
}

fn panic_error(error: JoinError) -> anyhow::Error {
    if error.is_cancelled() {
        return anyhow!("task was cancelled");
    }

    let payload = error.into_panic();
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("no error details");

    anyhow!("panicked: {detail}")
}
