//! Registry handle types
//!
//! A handle is a slot index plus the slot's generation at insertion time.
//! Removing an entry bumps the slot generation, so a stale handle kept by
//! a collaborator can never reach the entry that later reuses the slot.

use core::fmt;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            /// Sentinel value referring to no entry
            pub const NONE: $name = $name { index: u32::MAX, generation: 0 };

            #[inline]
            pub const fn new(index: u32, generation: u32) -> Self {
                $name { index, generation }
            }

            /// Slot index
            #[inline]
            pub const fn index(self) -> u32 {
                self.index
            }

            #[inline]
            pub const fn generation(self) -> u32 {
                self.generation
            }

            #[inline]
            pub const fn is_none(self) -> bool {
                self.index == u32::MAX
            }

            #[inline]
            pub const fn is_some(self) -> bool {
                !self.is_none()
            }

            #[inline]
            pub const fn to_option(self) -> Option<$name> {
                if self.is_none() {
                    None
                } else {
                    Some(self)
                }
            }
        }

        impl From<Handle> for $name {
            #[inline]
            fn from(h: Handle) -> Self {
                $name::new(h.index, h.generation)
            }
        }

        impl From<$name> for Handle {
            #[inline]
            fn from(id: $name) -> Self {
                Handle::new(id.index, id.generation)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, "{}(NONE)", stringify!($name))
                } else {
                    write!(f, "{}({}v{})", stringify!($name), self.index, self.generation)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_none() {
                    write!(f, "none")
                } else {
                    write!(f, "{}v{}", self.index, self.generation)
                }
            }
        }
    };
}

/// Untyped handle used by [`Registry`](crate::registry::Registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Handle {
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Handle { index, generation }
    }
}

define_handle!(
    /// Identifies a connection registered with a context
    ConnectionId
);

define_handle!(
    /// Identifies a packet registered with a context
    PacketId
);
