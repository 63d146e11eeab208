//! `WakeupChannel` - self-connected pipe that interrupts a readiness wait.
//!
//! The read end sits in the descriptor table next to the connections.
//! Writing one byte to the write end makes `poll(2)` return; the
//! multiplexer then drains the pipe and reports the cycle as woken.
//! Several signals before the waiter runs coalesce into one wakeup.
//!
//! Both ends are non-blocking whatever the context's own blocking mode,
//! so a signaler is never stalled by a slow or absent reader.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use gearloop_core::error::{UniversalError, UniversalResult};
use gearloop_core::traits::Notifier;

use crate::sys;

/// Cross-thread handle to the write end.
///
/// `Send + Sync + Clone`. `notify()` is a single non-blocking `write(2)`,
/// so it is safe from timers, other workers and signal handlers. The
/// handle keeps the write end open even after the channel is
/// deactivated; signaling then succeeds and wakes nobody.
#[derive(Clone, Debug)]
pub struct WakeupHandle {
    write: Arc<OwnedFd>,
}

impl WakeupHandle {
    /// Raw write descriptor, for registration with foreign event loops
    pub fn fd(&self) -> RawFd {
        self.write.as_raw_fd()
    }
}

impl Notifier for WakeupHandle {
    fn notify(&self) -> UniversalResult<()> {
        sys::write_wakeup_byte(self.write.as_raw_fd())
            .map_err(|errno| UniversalError::Os { op: "wakeup write", errno })
    }
}

#[derive(Debug)]
struct WakeupPipe {
    read: OwnedFd,
    write: Arc<OwnedFd>,
}

/// Optional pipe pair owned by a context.
///
/// Inactive by default; both endpoints are then unset.
#[derive(Debug, Default)]
pub struct WakeupChannel {
    pipe: Option<WakeupPipe>,
}

impl WakeupChannel {
    pub const fn new() -> Self {
        Self { pipe: None }
    }

    /// Create the endpoint pair. Idempotent.
    pub fn activate(&mut self) -> UniversalResult<()> {
        if self.pipe.is_some() {
            return Ok(());
        }
        let (read, write) = sys::nonblocking_pipe()
            .map_err(|errno| UniversalError::Os { op: "pipe", errno })?;
        self.pipe = Some(WakeupPipe {
            read,
            write: Arc::new(write),
        });
        Ok(())
    }

    /// Close our endpoints. Returns whether the channel was active.
    pub fn deactivate(&mut self) -> bool {
        self.pipe.take().is_some()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.pipe.is_some()
    }

    /// Read endpoint, when active
    pub fn read_fd(&self) -> Option<RawFd> {
        self.pipe.as_ref().map(|p| p.read.as_raw_fd())
    }

    /// Write one wakeup byte.
    ///
    /// Returns `Ok(false)` when the channel is inactive (nothing to wake).
    pub fn signal(&self) -> UniversalResult<bool> {
        match &self.pipe {
            Some(p) => {
                sys::write_wakeup_byte(p.write.as_raw_fd())
                    .map_err(|errno| UniversalError::Os { op: "wakeup write", errno })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Handle for signaling from other threads, when active
    pub fn handle(&self) -> Option<WakeupHandle> {
        self.pipe.as_ref().map(|p| WakeupHandle {
            write: Arc::clone(&p.write),
        })
    }

    /// Discard pending wakeup bytes; returns how many were pending.
    ///
    /// Never blocks. An inactive channel drains nothing.
    pub fn drain(&self) -> UniversalResult<usize> {
        match &self.pipe {
            Some(p) => sys::drain(p.read.as_raw_fd())
                .map_err(|errno| UniversalError::Os { op: "wakeup read", errno }),
            None => Ok(0),
        }
    }
}
