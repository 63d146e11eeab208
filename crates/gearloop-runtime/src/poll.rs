//! # Multiplexer - the `poll(2)` readiness engine
//!
//! One wait cycle:
//! 1. Size the descriptor table: live connections + the wakeup read end
//! 2. Grow the table only if that size exceeds the current capacity
//! 3. Fill one `pollfd` per connection with its requested interest, then
//!    the wakeup read end with `READABLE`
//! 4. `poll(2)` with the context timeout (`-1` blocks indefinitely)
//! 5. Walk the table in order: drain the wakeup entry, hand every other
//!    entry with events to its connection's `on_events`
//!
//! The first failing callback stops the walk. `EINTR` is not an error:
//! the cycle reports `interrupted` and the caller simply waits again.
//!
//! The multiplexer never touches the error slot; the context records
//! whatever error a cycle returns.

use gearloop_core::error::{UniversalError, UniversalResult};
use gearloop_core::events::Events;
use gearloop_core::id::ConnectionId;
use gearloop_core::registry::Registry;

use crate::sys;
use crate::universal::ConnectionRef;
use crate::wakeup::WakeupChannel;

/// What occupies a descriptor-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Connection(ConnectionId),
    Wakeup,
}

/// Result of one successful wait cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Connections whose callback ran
    pub dispatched: usize,

    /// The wakeup channel was signaled (and has been drained)
    pub woken: bool,

    /// `poll(2)` returned `EINTR`; no events were processed
    pub interrupted: bool,

    /// The timeout expired with nothing ready
    pub timed_out: bool,

    /// No connections were registered
    pub idle: bool,
}

impl WaitOutcome {
    /// True when nothing at all happened this cycle
    pub fn is_empty(&self) -> bool {
        self.dispatched == 0 && !self.woken
    }
}

/// Decide what a failed `poll(2)` means.
///
/// `None` for transient interruption, the error to record otherwise.
pub(crate) fn classify_wait_errno(errno: i32) -> Option<UniversalError> {
    if errno == libc::EINTR {
        None
    } else {
        Some(UniversalError::IoWaitFailed { errno })
    }
}

/// Growth-only `pollfd` table plus the owner of each entry
pub struct Multiplexer {
    pfds: Vec<libc::pollfd>,
    owners: Vec<Owner>,

    /// Entries the table can hold without reallocating
    capacity: usize,

    /// Capacity kept between cycles; `None` keeps whatever was reached
    max_retained: Option<usize>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self {
            pfds: Vec::new(),
            owners: Vec::new(),
            capacity: 0,
            max_retained: None,
        }
    }

    pub fn with_max_retained(max_retained: Option<usize>) -> Self {
        Self {
            max_retained,
            ..Self::new()
        }
    }

    /// Entries the table can hold without growing
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries filled in the last cycle
    #[inline]
    pub fn len(&self) -> usize {
        self.pfds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pfds.is_empty()
    }

    pub fn set_max_retained(&mut self, max_retained: Option<usize>) {
        self.max_retained = max_retained;
    }

    /// Make room for `needed` entries, reallocating only to grow
    fn reserve(&mut self, needed: usize) -> UniversalResult<()> {
        self.pfds.clear();
        self.owners.clear();
        if needed <= self.capacity {
            return Ok(());
        }
        self.pfds
            .try_reserve_exact(needed)
            .map_err(|_| UniversalError::AllocationFailed("descriptor table"))?;
        self.owners
            .try_reserve_exact(needed)
            .map_err(|_| UniversalError::AllocationFailed("descriptor table"))?;
        self.capacity = needed;
        Ok(())
    }

    /// Apply the retained-capacity cap once a cycle is over
    fn trim(&mut self) {
        if let Some(cap) = self.max_retained {
            if self.capacity > cap {
                self.pfds.clear();
                self.owners.clear();
                self.pfds.shrink_to(cap);
                self.owners.shrink_to(cap);
                self.capacity = cap;
            }
        }
    }

    fn push(&mut self, fd: libc::c_int, interest: Events, owner: Owner) {
        self.pfds.push(libc::pollfd {
            fd,
            events: interest.bits(),
            revents: 0,
        });
        self.owners.push(owner);
    }

    /// Run one wait cycle over `connections` and `wakeup`.
    ///
    /// `timeout_ms < 0` blocks until something is ready or the wakeup
    /// channel is signaled.
    ///
    /// With no connections registered, an active wakeup channel and a
    /// finite timeout, the cycle waits on the wakeup read end alone. In
    /// every other idle case the call returns at once; a pending wakeup is
    /// still drained so it cannot leak into a later cycle.
    pub fn wait(
        &mut self,
        connections: &Registry<ConnectionRef>,
        wakeup: &WakeupChannel,
        timeout_ms: libc::c_int,
    ) -> UniversalResult<WaitOutcome> {
        let idle = connections.is_empty();
        if idle && (timeout_ms < 0 || !wakeup.is_active()) {
            self.pfds.clear();
            self.owners.clear();
            let woken = wakeup.drain()? > 0;
            return Ok(WaitOutcome {
                woken,
                idle: true,
                ..WaitOutcome::default()
            });
        }

        let needed = connections.len() + usize::from(wakeup.is_active());
        self.reserve(needed)?;

        for (handle, conn) in connections.iter() {
            let conn = conn
                .try_borrow()
                .map_err(|_| UniversalError::InvalidArgument("connection borrowed during wait"))?;
            self.push(
                conn.descriptor(),
                conn.interest(),
                Owner::Connection(ConnectionId::from(handle)),
            );
        }
        if let Some(fd) = wakeup.read_fd() {
            self.push(fd, Events::READABLE, Owner::Wakeup);
        }

        let ready = match sys::poll(&mut self.pfds, timeout_ms) {
            Ok(n) => n,
            Err(errno) => {
                return match classify_wait_errno(errno) {
                    None => Ok(WaitOutcome {
                        interrupted: true,
                        ..WaitOutcome::default()
                    }),
                    Some(err) => Err(err),
                };
            }
        };

        let mut outcome = WaitOutcome {
            timed_out: ready == 0,
            idle,
            ..WaitOutcome::default()
        };

        for i in 0..self.pfds.len() {
            let revents = self.pfds[i].revents;
            if revents == 0 {
                continue;
            }
            match self.owners[i] {
                Owner::Wakeup => {
                    wakeup.drain()?;
                    outcome.woken = true;
                }
                Owner::Connection(id) => {
                    // Registry and table were filled together; a miss
                    // can only mean the entry vanished, so skip it.
                    let Some(conn) = connections.get(id.into()) else {
                        continue;
                    };
                    let rc = conn
                        .try_borrow_mut()
                        .map_err(|_| {
                            UniversalError::InvalidArgument("connection borrowed during wait")
                        })?
                        .on_events(Events::from_bits(revents));
                    if rc.is_failure() {
                        self.trim();
                        return Err(UniversalError::CallbackFailed(rc));
                    }
                    outcome.dispatched += 1;
                }
            }
        }

        self.trim();
        Ok(outcome)
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}
