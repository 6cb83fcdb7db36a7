//! Cross-thread stop coordination.
//!
//! A [`StopCoordinator`] holds at most one published [`StopTarget`]. The
//! running session publishes its target right before entering the event loop
//! and clears it right after the loop returns; any other thread may call
//! [`StopCoordinator::request_stop`] at any time. Every access to the slot,
//! including the forwarded stop call itself, happens under one lock, so a
//! stop can never reach an environment whose loop has already returned.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::StopTarget;
use crate::error::{RuntimeError, StopError};

/// Status code returned when no environment is running.
pub const NO_ACTIVE_SESSION: i32 = -1;

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    /// The request was forwarded; holds the engine's status.
    Forwarded(i32),
    /// Nothing was running.
    NoActiveSession,
}

impl StopStatus {
    /// The boundary status code: the forwarded status, or `-1`.
    pub fn code(self) -> i32 {
        match self {
            StopStatus::Forwarded(code) => code,
            StopStatus::NoActiveSession => NO_ACTIVE_SESSION,
        }
    }

    pub fn into_result(self) -> Result<(), StopError> {
        match self {
            StopStatus::Forwarded(0) => Ok(()),
            StopStatus::Forwarded(code) => Err(StopError::Failed { code }),
            StopStatus::NoActiveSession => Err(StopError::NotRunning),
        }
    }
}

/// Single-slot registry of the running environment.
#[derive(Default)]
pub struct StopCoordinator {
    active: Mutex<Option<Arc<dyn StopTarget>>>,
}

impl StopCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the running environment's stop target.
    ///
    /// The slot is cleared when the returned guard is dropped.
    pub fn publish(&self, target: Arc<dyn StopTarget>) -> Result<Published<'_>, RuntimeError> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(RuntimeError::AlreadyRunning);
        }
        *active = Some(target);
        tracing::debug!("[stop_coordinator] Environment published");
        Ok(Published { coordinator: self })
    }

    /// Forward a stop request to the published environment, if any.
    pub fn request_stop(&self) -> StopStatus {
        let active = self.active.lock();
        match active.as_ref() {
            Some(target) => {
                let status = target.request_stop();
                tracing::debug!("[stop_coordinator] Stop forwarded, status {}", status);
                StopStatus::Forwarded(status)
            }
            None => {
                tracing::debug!("[stop_coordinator] Stop requested with no active environment");
                StopStatus::NoActiveSession
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    fn clear(&self) {
        self.active.lock().take();
        tracing::debug!("[stop_coordinator] Environment cleared");
    }
}

impl fmt::Debug for StopCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopCoordinator")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Keeps a stop target published. Dropping it clears the slot, including
/// when the event loop unwinds.
#[must_use = "dropping the guard immediately clears the published environment"]
pub struct Published<'a> {
    coordinator: &'a StopCoordinator,
}

impl Published<'_> {
    /// Clear the slot now.
    pub fn clear(self) {}
}

impl Drop for Published<'_> {
    fn drop(&mut self) {
        self.coordinator.clear();
    }
}

/// Cloneable handle other threads use to stop the running environment.
#[derive(Debug, Clone)]
pub struct StopHandle {
    coordinator: Arc<StopCoordinator>,
}

impl StopHandle {
    pub fn new(coordinator: Arc<StopCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn stop(&self) -> StopStatus {
        self.coordinator.request_stop()
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_active()
    }
}
