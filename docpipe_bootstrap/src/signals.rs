// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # System Signal Handling
//!
//! Cross-platform signal handling for graceful shutdown.
//!
//! ## Supported Signals
//!
//! - **SIGTERM** (15) - Graceful shutdown request
//! - **SIGINT** (2) - User interrupt (Ctrl+C)
//! - **SIGHUP** (1) - Hangup (terminal closed, Unix only)
//!
//! The handler is trait-abstracted so tests can drive shutdown without
//! raising real signals. On signal receipt the provided callback fires
//! once; wiring it to [`crate::shutdown::ShutdownCoordinator::initiate_shutdown`]
//! turns a signal into pipeline cancellation.

use std::future::Future;
use std::pin::Pin;

/// Callback type for shutdown notification
pub type ShutdownCallback = Box<dyn FnOnce() + Send + 'static>;

/// System signal handling trait
pub trait SystemSignals: Send + Sync {
    /// Waits for a shutdown signal and invokes the callback.
    fn wait_for_signal(
        &self,
        on_shutdown: ShutdownCallback,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Unix signal handler: SIGTERM, SIGINT, and SIGHUP via tokio::signal.
#[cfg(unix)]
#[derive(Default)]
pub struct UnixSignalHandler;

#[cfg(unix)]
impl UnixSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl SystemSignals for UnixSignalHandler {
    fn wait_for_signal(
        &self,
        on_shutdown: ShutdownCallback,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let sigterm = signal(SignalKind::terminate());
            let sigint = signal(SignalKind::interrupt());
            let sighup = signal(SignalKind::hangup());

            match (sigterm, sigint, sighup) {
                (Ok(mut sigterm), Ok(mut sigint), Ok(mut sighup)) => {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                        }
                        _ = sighup.recv() => {
                            tracing::info!("Received SIGHUP, initiating graceful shutdown");
                        }
                    }
                    on_shutdown();
                }
                _ => {
                    tracing::error!("Failed to register signal handlers; falling back to ctrl_c");
                    if tokio::signal::ctrl_c().await.is_ok() {
                        on_shutdown();
                    }
                }
            }
        })
    }
}

/// Portable fallback handler using only Ctrl+C.
#[derive(Default)]
pub struct CtrlCSignalHandler;

impl CtrlCSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

impl SystemSignals for CtrlCSignalHandler {
    fn wait_for_signal(
        &self,
        on_shutdown: ShutdownCallback,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                on_shutdown();
            }
        })
    }
}

/// Creates the platform's preferred signal handler.
pub fn create_signal_handler() -> Box<dyn SystemSignals> {
    #[cfg(unix)]
    {
        Box::new(UnixSignalHandler::new())
    }
    #[cfg(not(unix))]
    {
        Box::new(CtrlCSignalHandler::new())
    }
}

/// No-op handler for tests: invokes the callback immediately.
pub struct ImmediateSignalHandler;

impl SystemSignals for ImmediateSignalHandler {
    fn wait_for_signal(
        &self,
        on_shutdown: ShutdownCallback,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            on_shutdown();
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_immediate_handler_fires_callback() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        ImmediateSignalHandler
            .wait_for_signal(Box::new(move || flag.store(true, Ordering::SeqCst)))
            .await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
