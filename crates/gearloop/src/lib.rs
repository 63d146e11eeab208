//! # gearloop - universal context for job-queue clients and workers
//!
//! The shared state every client or worker operation runs against:
//! a single error slot, mode flags, registries of live connections and
//! outstanding packets, and one readiness loop over all connections that
//! another thread can interrupt.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//! use gearloop::{UniversalContext, Notifier};
//!
//! let mut ctx = UniversalContext::new();
//! ctx.set_timeout(Some(Duration::from_secs(1)));
//! ctx.activate_wakeup()?;
//!
//! let id = ctx.register_connection(Rc::new(RefCell::new(my_conn)))?;
//!
//! let waker = ctx.wakeup_handle().unwrap();
//! std::thread::spawn(move || waker.notify());
//!
//! let outcome = ctx.wait()?;
//! if outcome.woken { /* re-check shutdown flags */ }
//!
//! ctx.unregister_connection(id);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Client / worker protocol layer                 │
//! │      owns connections and packets, calls ctx.wait()         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   UniversalContext                          │
//! │   options · error slot · registries · log hook · namespace  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┴───────────────────┐
//!          ▼                                       ▼
//!    ┌─────────────┐                        ┌─────────────┐
//!    │ Multiplexer │ ◄── read end ───────── │ WakeupPipe  │ ◄── WakeupHandle
//!    │   poll(2)   │                        │ (non-block) │     (any thread)
//!    └─────────────┘                        └─────────────┘
//! ```

// Re-export core types
pub use gearloop_core::{
    Allocator,
    Connection,
    ConnectionId,
    ErrorState,
    Events,
    LogHook,
    Notifier,
    OptionSet,
    PacketId,
    RawDescriptor,
    ReturnCode,
    UniversalError,
    UniversalOption,
    UniversalResult,
    Verbose,
    MAX_ERROR_SIZE,
};

// Re-export kprint macros for debug logging
pub use gearloop_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use gearloop_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use gearloop_core::{env_get, env_get_bool, env_get_opt, env_is_set};

// Re-export runtime types
pub use gearloop_runtime::{
    timeout_to_millis,
    ConnectionRef,
    HeapAllocator,
    PacketRef,
    UniversalConfig,
    UniversalContext,
    WaitOutcome,
    WakeupHandle,
};

/// Context configured from `GEARLOOP_*` environment variables
///
/// See [`UniversalConfig::from_env`] for the recognised variables.
pub fn context_from_env() -> UniversalResult<UniversalContext> {
    kprint::init();
    UniversalContext::from_config(UniversalConfig::from_env())
}
