//! Readiness event bits
//!
//! Values mirror the `poll(2)` flags on every Unix platform we build on,
//! so an `Events` converts to and from `pollfd.events` without a table.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};

/// Typed set of readiness flags
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Events(i16);

impl Events {
    pub const NONE: Events = Events(0);
    pub const READABLE: Events = Events(0x001);
    pub const PRIORITY: Events = Events(0x002);
    pub const WRITABLE: Events = Events(0x004);
    pub const ERROR: Events = Events(0x008);
    pub const HANGUP: Events = Events(0x010);
    pub const INVALID: Events = Events(0x020);

    /// Build from raw `poll(2)` bits
    #[inline]
    pub const fn from_bits(bits: i16) -> Self {
        Events(bits)
    }

    #[inline]
    pub const fn bits(self) -> i16 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: Events) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Events) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_readable(self) -> bool {
        self.intersects(Events(Self::READABLE.0 | Self::PRIORITY.0))
    }

    #[inline]
    pub const fn is_writable(self) -> bool {
        self.intersects(Self::WRITABLE)
    }

    /// Error, hang-up or invalid descriptor
    #[inline]
    pub const fn is_error(self) -> bool {
        self.intersects(Events(Self::ERROR.0 | Self::HANGUP.0 | Self::INVALID.0))
    }
}

impl BitOr for Events {
    type Output = Events;

    #[inline]
    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

impl BitOrAssign for Events {
    #[inline]
    fn bitor_assign(&mut self, rhs: Events) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Events {
    type Output = Events;

    #[inline]
    fn bitand(self, rhs: Events) -> Events {
        Events(self.0 & rhs.0)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Events, &str); 6] = [
            (Events::READABLE, "READABLE"),
            (Events::PRIORITY, "PRIORITY"),
            (Events::WRITABLE, "WRITABLE"),
            (Events::ERROR, "ERROR"),
            (Events::HANGUP, "HANGUP"),
            (Events::INVALID, "INVALID"),
        ];

        if self.is_empty() {
            return write!(f, "Events(NONE)");
        }
        write!(f, "Events(")?;
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        write!(f, ")")
    }
}
