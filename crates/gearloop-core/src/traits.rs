//! Capability traits implemented by collaborators
//!
//! The context never owns what these traits describe. Connections and
//! packets are created and freed by the protocol layer; the context only
//! keeps references to them for multiplexing and accounting.

use core::fmt;

use crate::error::{ReturnCode, UniversalResult};
use crate::events::Events;
use crate::verbose::Verbose;

/// Raw OS descriptor (a Unix file descriptor)
pub type RawDescriptor = core::ffi::c_int;

/// A connection that takes part in readiness multiplexing
pub trait Connection {
    /// The socket descriptor to watch. Must stay open while registered.
    fn descriptor(&self) -> RawDescriptor;

    /// Events this connection currently wants to hear about
    fn interest(&self) -> Events;

    /// Event-watch callback.
    ///
    /// Called once per wait cycle in which the descriptor reported any
    /// event bits. Returning anything other than `ReturnCode::Success`
    /// stops the cycle and is recorded in the context's error slot.
    fn on_events(&mut self, events: Events) -> ReturnCode;
}

/// Wakes a blocked readiness wait from outside the owning thread.
///
/// **Contract:**
/// - `notify()` must NEVER block.
/// - Calls made before the waiter runs are coalesced; only "at least one
///   wakeup pending" is observable, not how many.
pub trait Notifier: Send + Sync {
    fn notify(&self) -> UniversalResult<()>;
}

/// Allocation strategy for connection and packet buffers.
///
/// **Contract:**
/// - `allocate()` returns a zero-filled buffer of exactly `len` bytes,
///   or `None` if memory is unavailable.
/// - `reallocate()` keeps the existing contents up to `new_len`.
/// - `release()` accepts any buffer handed out by the same allocator.
pub trait Allocator {
    fn allocate(&self, len: usize) -> Option<Vec<u8>>;

    fn reallocate(&self, buf: Vec<u8>, new_len: usize) -> Option<Vec<u8>>;

    fn release(&self, buf: Vec<u8>);

    /// Buffers handed out and not yet released
    fn in_use(&self) -> usize;

    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Sink for collaborator diagnostics.
///
/// Implemented for any `FnMut(Verbose, &fmt::Arguments)`, so a closure can
/// carry whatever context it needs.
pub trait LogHook {
    fn log(&mut self, level: Verbose, args: &fmt::Arguments<'_>);
}

impl<F> LogHook for F
where
    F: FnMut(Verbose, &fmt::Arguments<'_>),
{
    fn log(&mut self, level: Verbose, args: &fmt::Arguments<'_>) {
        self(level, args)
    }
}
