//! Return codes, typed errors and the per-context error slot

use core::fmt;

/// Maximum size of the message held by an [`ErrorState`], in bytes.
pub const MAX_ERROR_SIZE: usize = 2048;

/// Result type for universal-context operations
pub type UniversalResult<T> = Result<T, UniversalError>;

/// Status code shared by the engine and its collaborators.
///
/// Event-watch callbacks return one of these; anything other than
/// `Success` is treated as a failure by the multiplexer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Success = 0,

    /// Unrecognized option identifier
    InvalidOption,

    /// Argument rejected before any state changed
    InvalidArgument,

    /// `poll(2)` failed with a non-transient errno
    IoWaitFailed,

    /// A connection's event-watch callback reported failure
    CallbackFailed,

    /// Descriptor table or registry slot could not be allocated
    AllocationFailed,

    /// Some other syscall failed; see `last_errno`
    Errno,

    /// Peer went away (reported by connection callbacks)
    LostConnection,

    /// Operation timed out (reported by collaborators)
    Timeout,

    /// Orderly shutdown requested (reported by collaborators)
    ShutdownGraceful,

    Unknown,
}

impl ReturnCode {
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, ReturnCode::Success)
    }

    #[inline]
    pub const fn is_failure(self) -> bool {
        !self.is_success()
    }

    /// Stable upper-case name, used in messages and logs
    pub const fn name(self) -> &'static str {
        match self {
            ReturnCode::Success => "SUCCESS",
            ReturnCode::InvalidOption => "INVALID_OPTION",
            ReturnCode::InvalidArgument => "INVALID_ARGUMENT",
            ReturnCode::IoWaitFailed => "IO_WAIT_FAILED",
            ReturnCode::CallbackFailed => "CALLBACK_FAILED",
            ReturnCode::AllocationFailed => "ALLOCATION_FAILED",
            ReturnCode::Errno => "ERRNO",
            ReturnCode::LostConnection => "LOST_CONNECTION",
            ReturnCode::Timeout => "TIMEOUT",
            ReturnCode::ShutdownGraceful => "SHUTDOWN_GRACEFUL",
            ReturnCode::Unknown => "UNKNOWN",
        }
    }
}

impl Default for ReturnCode {
    fn default() -> Self {
        ReturnCode::Success
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors returned by fallible context operations.
///
/// Every variant is also recorded in the context's [`ErrorState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniversalError {
    /// Raw option identifier that maps to no known option
    InvalidOption(u32),

    /// Argument rejected (static description of what was wrong)
    InvalidArgument(&'static str),

    /// Readiness wait failed; errno preserved
    IoWaitFailed { errno: i32 },

    /// An event-watch callback returned this failure code
    CallbackFailed(ReturnCode),

    /// Could not grow the named table
    AllocationFailed(&'static str),

    /// A syscall other than the wait failed
    Os { op: &'static str, errno: i32 },
}

impl UniversalError {
    /// The return code reported to the caller for this error
    pub fn code(&self) -> ReturnCode {
        match self {
            UniversalError::InvalidOption(_) => ReturnCode::InvalidOption,
            UniversalError::InvalidArgument(_) => ReturnCode::InvalidArgument,
            UniversalError::IoWaitFailed { .. } => ReturnCode::IoWaitFailed,
            UniversalError::CallbackFailed(_) => ReturnCode::CallbackFailed,
            UniversalError::AllocationFailed(_) => ReturnCode::AllocationFailed,
            UniversalError::Os { .. } => ReturnCode::Errno,
        }
    }

    /// The code stored in the error slot.
    ///
    /// Identical to [`code`](Self::code) except for callback failures,
    /// where the slot keeps the callback's own code.
    pub fn recorded_code(&self) -> ReturnCode {
        match self {
            UniversalError::CallbackFailed(rc) => *rc,
            other => other.code(),
        }
    }

    /// OS errno carried by this error, or 0
    pub fn errno(&self) -> i32 {
        match self {
            UniversalError::IoWaitFailed { errno } | UniversalError::Os { errno, .. } => *errno,
            _ => 0,
        }
    }
}

impl fmt::Display for UniversalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniversalError::InvalidOption(raw) => write!(f, "invalid option: {}", raw),
            UniversalError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            UniversalError::IoWaitFailed { errno } => {
                write!(f, "poll failed: errno {}", errno)
            }
            UniversalError::CallbackFailed(rc) => {
                write!(f, "event watch callback failed: {}", rc)
            }
            UniversalError::AllocationFailed(what) => {
                write!(f, "allocation failed: {}", what)
            }
            UniversalError::Os { op, errno } => write!(f, "{} failed: errno {}", op, errno),
        }
    }
}

impl std::error::Error for UniversalError {}

/// The single current-error slot of a context.
///
/// Writes overwrite unconditionally; there is no history.
#[derive(Debug, Clone, Default)]
pub struct ErrorState {
    code: ReturnCode,
    last_errno: i32,
    message: String,
}

impl ErrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot.
    ///
    /// `Success` clears the slot regardless of the other arguments, so the
    /// message is empty exactly when the code is `Success`. Messages longer
    /// than [`MAX_ERROR_SIZE`] are truncated on a character boundary.
    pub fn set(&mut self, code: ReturnCode, errno: i32, message: &str) {
        if code.is_success() {
            self.reset();
            return;
        }

        self.code = code;
        self.last_errno = errno;
        self.message.clear();

        let text = if message.is_empty() { code.name() } else { message };
        let mut end = text.len().min(MAX_ERROR_SIZE);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.message.push_str(&text[..end]);
    }

    /// Record a typed error
    pub fn record(&mut self, err: &UniversalError) {
        self.set(err.recorded_code(), err.errno(), &err.to_string());
    }

    #[inline]
    pub fn code(&self) -> ReturnCode {
        self.code
    }

    #[inline]
    pub fn last_errno(&self) -> i32 {
        self.last_errno
    }

    /// Current message, or `None` when no error is held
    pub fn message(&self) -> Option<&str> {
        if self.message.is_empty() {
            None
        } else {
            Some(&self.message)
        }
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.code.is_failure()
    }

    pub fn reset(&mut self) {
        self.code = ReturnCode::Success;
        self.last_errno = 0;
        self.message.clear();
    }
}
