//! Dedicated I/O runtime for network transports.
//!
//! Transports run their socket loops on a current-thread Tokio runtime that
//! lives on its own thread, so the frame loop never blocks on the network.
//! The runtime is an ordinary value: the caller creates it, hands its
//! [`Handle`] to the transports, and shuts it down when the session ends.
//!
//! # Example
//!
//! ```no_run
//! use horizon_touch_core::runtime::{IoRuntime, IoRuntimeConfig};
//!
//! let runtime = IoRuntime::new(IoRuntimeConfig::default()).unwrap();
//! let value = runtime.block_on(async { 21 * 2 });
//! assert_eq!(value, 42);
//! runtime.shutdown();
//! ```

use std::future::Future;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle as TaskHandle;

use crate::error::{CoreError, Result};
use crate::{touch_debug, touch_warn};

/// Configuration for the I/O runtime.
#[derive(Debug, Clone)]
pub struct IoRuntimeConfig {
    /// Name of the runtime thread.
    pub thread_name: String,
    /// Enable the I/O driver (required for sockets).
    pub enable_io: bool,
    /// Enable the time driver (required for reconnect backoff).
    pub enable_time: bool,
}

impl Default for IoRuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name: "horizon-touch-io".to_string(),
            enable_io: true,
            enable_time: true,
        }
    }
}

impl IoRuntimeConfig {
    /// Set the runtime thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

struct RuntimeThread {
    join: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

/// A current-thread Tokio runtime running on a dedicated thread.
pub struct IoRuntime {
    handle: Handle,
    thread: Mutex<Option<RuntimeThread>>,
}

impl IoRuntime {
    /// Start the runtime thread and wait for its handle.
    pub fn new(config: IoRuntimeConfig) -> Result<Self> {
        let (handle_tx, handle_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let enable_io = config.enable_io;
        let enable_time = config.enable_time;

        let join = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let mut builder = Builder::new_current_thread();
                if enable_io {
                    builder.enable_io();
                }
                if enable_time {
                    builder.enable_time();
                }

                let runtime = match builder.build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = handle_tx.send(Err(CoreError::RuntimeCreation(e.to_string())));
                        return;
                    }
                };

                let _ = handle_tx.send(Ok(runtime.handle().clone()));

                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
            })
            .map_err(|e| CoreError::RuntimeCreation(e.to_string()))?;

        let handle = handle_rx
            .recv()
            .map_err(|_| CoreError::RuntimeUnavailable)??;

        touch_debug!(thread = %config.thread_name, "I/O runtime started");

        Ok(Self {
            handle,
            thread: Mutex::new(Some(RuntimeThread { join, shutdown_tx })),
        })
    }

    /// Get a handle to the runtime for spawning transport tasks.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Check whether the runtime thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Spawn a future on the runtime.
    pub fn spawn<F>(&self, future: F) -> Result<TaskHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if !self.is_running() {
            return Err(CoreError::RuntimeShutDown);
        }
        Ok(self.handle.spawn(future))
    }

    /// Run a future to completion from a thread outside the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Stop the runtime thread and wait for it to exit.
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        let _ = thread.shutdown_tx.send(());
        if thread.join.join().is_err() {
            touch_warn!("I/O runtime thread panicked during shutdown");
        }
        touch_debug!("I/O runtime stopped");
    }
}

impl Drop for IoRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for IoRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoRuntime")
            .field("running", &self.is_running())
            .finish()
    }
}
