//! Mode flags of a universal context

use core::fmt;

use crate::error::{UniversalError, UniversalResult};

/// Options recognized by [`OptionSet::set`].
///
/// The discriminants are the raw identifiers collaborators pass across
/// untyped boundaries (config files, FFI, wire commands).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniversalOption {
    /// Socket operations must not block; applied by connections
    NonBlocking = 0,

    /// Packet registration becomes a no-op
    DontTrackPackets = 1,
}

impl UniversalOption {
    pub const ALL: [UniversalOption; 2] =
        [UniversalOption::NonBlocking, UniversalOption::DontTrackPackets];

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            UniversalOption::NonBlocking => "non_blocking",
            UniversalOption::DontTrackPackets => "dont_track_packets",
        }
    }
}

impl TryFrom<u32> for UniversalOption {
    type Error = UniversalError;

    fn try_from(raw: u32) -> UniversalResult<Self> {
        match raw {
            0 => Ok(UniversalOption::NonBlocking),
            1 => Ok(UniversalOption::DontTrackPackets),
            other => Err(UniversalError::InvalidOption(other)),
        }
    }
}

impl core::str::FromStr for UniversalOption {
    type Err = UniversalError;

    fn from_str(s: &str) -> UniversalResult<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "non_blocking" | "nonblocking" => Ok(UniversalOption::NonBlocking),
            "dont_track_packets" => Ok(UniversalOption::DontTrackPackets),
            _ => Err(UniversalError::InvalidOption(u32::MAX)),
        }
    }
}

impl fmt::Display for UniversalOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The two independent mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionSet {
    non_blocking: bool,
    dont_track_packets: bool,
}

impl OptionSet {
    pub const fn new() -> Self {
        Self {
            non_blocking: false,
            dont_track_packets: false,
        }
    }

    /// Set one flag
    pub fn set(&mut self, option: UniversalOption, value: bool) {
        match option {
            UniversalOption::NonBlocking => self.non_blocking = value,
            UniversalOption::DontTrackPackets => self.dont_track_packets = value,
        }
    }

    /// Set one flag from its raw identifier.
    ///
    /// Unknown identifiers fail with `InvalidOption` and leave every
    /// flag untouched.
    pub fn set_raw(&mut self, raw: u32, value: bool) -> UniversalResult<()> {
        let option = UniversalOption::try_from(raw)?;
        self.set(option, value);
        Ok(())
    }

    pub fn get(&self, option: UniversalOption) -> bool {
        match option {
            UniversalOption::NonBlocking => self.non_blocking,
            UniversalOption::DontTrackPackets => self.dont_track_packets,
        }
    }

    #[inline]
    pub fn is_non_blocking(&self) -> bool {
        self.non_blocking
    }

    #[inline]
    pub fn dont_track_packets(&self) -> bool {
        self.dont_track_packets
    }
}
