//! # gearloop-runtime
//!
//! Unix implementation of the gearloop universal context.
//!
//! This crate provides:
//! - `poll(2)` readiness multiplexing over registered connections
//! - The self-pipe wakeup channel and its cross-thread handle
//! - The default heap allocator
//! - `UniversalConfig` and its environment overlay
//! - `UniversalContext`, which composes all of the above

pub mod allocator;
pub mod config;
pub mod poll;
pub mod universal;
pub mod wakeup;

mod sys;

// Re-exports
pub use allocator::HeapAllocator;
pub use config::{timeout_to_millis, UniversalConfig};
pub use poll::{Multiplexer, WaitOutcome};
pub use universal::{ConnectionRef, PacketRef, UniversalContext};
pub use wakeup::{WakeupChannel, WakeupHandle};

cfg_if::cfg_if! {
    if #[cfg(not(unix))] {
        compile_error!("gearloop-runtime requires a unix target");
    }
}
