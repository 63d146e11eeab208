//! # gearloop-core
//!
//! Platform-agnostic building blocks of the gearloop universal context.
//! The Unix readiness engine that ties them together lives in
//! `gearloop-runtime`.
//!
//! ## Modules
//!
//! - `error` - return codes, typed errors, the single error slot
//! - `options` - mode flags (non-blocking, packet tracking)
//! - `events` - readiness event bits
//! - `id` - generation-checked connection/packet handles
//! - `registry` - index-stable slab used for connections and packets
//! - `traits` - connection, allocator and log-hook capabilities
//! - `verbose` - verbosity levels for collaborator diagnostics
//! - `kprint` - stderr print macros and the default log sink
//! - `env` - environment variable helpers

pub mod error;
pub mod options;
pub mod events;
pub mod id;
pub mod registry;
pub mod traits;
pub mod verbose;
pub mod kprint;
pub mod env;

pub use error::{ErrorState, ReturnCode, UniversalError, UniversalResult, MAX_ERROR_SIZE};
pub use options::{OptionSet, UniversalOption};
pub use events::Events;
pub use id::{ConnectionId, Handle, PacketId};
pub use registry::Registry;
pub use traits::{Allocator, Connection, LogHook, Notifier, RawDescriptor};
pub use verbose::Verbose;
pub use env::{env_get, env_get_bool, env_get_opt, env_is_set};
