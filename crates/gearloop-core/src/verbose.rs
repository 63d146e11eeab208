//! Verbosity levels for collaborator diagnostics

use core::fmt;
use core::str::FromStr;

use crate::kprint::LogLevel;

/// How chatty the log hook should be.
///
/// Ordered from quietest to noisiest; a message is delivered when its
/// level is not `Never` and is at or below the configured level.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Verbose {
    #[default]
    Never = 0,
    Fatal = 1,
    Error = 2,
    Warning = 3,
    Notice = 4,
    Info = 5,
    Debug = 6,
}

impl Verbose {
    pub const fn name(self) -> &'static str {
        match self {
            Verbose::Never => "NEVER",
            Verbose::Fatal => "FATAL",
            Verbose::Error => "ERROR",
            Verbose::Warning => "WARNING",
            Verbose::Notice => "NOTICE",
            Verbose::Info => "INFO",
            Verbose::Debug => "DEBUG",
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Verbose::Never,
            1 => Verbose::Fatal,
            2 => Verbose::Error,
            3 => Verbose::Warning,
            4 => Verbose::Notice,
            5 => Verbose::Info,
            _ => Verbose::Debug,
        }
    }

    /// Whether a message at `level` passes a filter configured at `self`
    #[inline]
    pub fn admits(self, level: Verbose) -> bool {
        level != Verbose::Never && level <= self
    }

    /// Matching stderr level for the default sink
    pub fn log_level(self) -> LogLevel {
        match self {
            Verbose::Never => LogLevel::Off,
            Verbose::Fatal | Verbose::Error => LogLevel::Error,
            Verbose::Warning => LogLevel::Warn,
            Verbose::Notice | Verbose::Info => LogLevel::Info,
            Verbose::Debug => LogLevel::Debug,
        }
    }
}

impl FromStr for Verbose {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_lowercase().as_str() {
            "never" | "0" => Ok(Verbose::Never),
            "fatal" | "1" => Ok(Verbose::Fatal),
            "error" | "2" => Ok(Verbose::Error),
            "warning" | "warn" | "3" => Ok(Verbose::Warning),
            "notice" | "4" => Ok(Verbose::Notice),
            "info" | "5" => Ok(Verbose::Info),
            "debug" | "6" => Ok(Verbose::Debug),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Verbose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Verbose::Never < Verbose::Fatal);
        assert!(Verbose::Error < Verbose::Warning);
        assert!(Verbose::Info < Verbose::Debug);
    }

    #[test]
    fn test_admits() {
        assert!(Verbose::Info.admits(Verbose::Error));
        assert!(Verbose::Info.admits(Verbose::Info));
        assert!(!Verbose::Info.admits(Verbose::Debug));
        assert!(!Verbose::Debug.admits(Verbose::Never));
        assert!(!Verbose::Never.admits(Verbose::Fatal));
    }

    #[test]
    fn test_parse() {
        assert_eq!("warn".parse::<Verbose>(), Ok(Verbose::Warning));
        assert_eq!("DEBUG".parse::<Verbose>(), Ok(Verbose::Debug));
        assert_eq!("3".parse::<Verbose>(), Ok(Verbose::Warning));
        assert!("loud".parse::<Verbose>().is_err());
        assert_eq!(Verbose::from_u8(42), Verbose::Debug);
    }
}
