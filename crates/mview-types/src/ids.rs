//! Dense integer identifiers used across the workspace.
//!
//! Each id wraps a `u32` and serializes transparently, but stays a
//! distinct type so a page index cannot be handed where a queue pair
//! number is expected.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Index of a page slot in the pool arena.
    PageId
);

id_type!(
    /// Index of a registered memory region, in partition order.
    RegionId
);

id_type!(
    /// Index of a read channel in the grouping distribution.
    ChannelId
);

id_type!(
    /// Queue pair number, the channel identity exchanged during the
    /// handshake.
    QpNum
);

id_type!(
    /// Remote key authorizing one-sided reads of a registered region.
    Rkey
);
