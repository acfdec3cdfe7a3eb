use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub fn raw(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

define_id!(
    /// Stable identifier of a node, unique for the lifetime of its graph.
    NodeId,
    "n"
);
define_id!(
    /// Identifier of a parent-to-child tree branch.
    BranchId,
    "b"
);
define_id!(
    /// Identifier of a data branch between two slots.
    DataBranchId,
    "d"
);
define_id!(
    /// Stable identifier of a parameter inside its container.
    ParameterId,
    "p"
);

/// Monotonic allocator for one id space. Never hands out the same id twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    /// Hands out the next id, or `None` once the id space is used up.
    pub(crate) fn allocate(&mut self) -> Option<u32> {
        let id = self.next;
        self.next = self.next.checked_add(1)?;
        Some(id)
    }

    /// Makes sure ids up to and including `used` are never allocated again.
    /// Returns `false` when `used` lies beyond the allocatable range.
    pub(crate) fn reserve(&mut self, used: u32) -> bool {
        match used.checked_add(1) {
            Some(next) => {
                self.next = self.next.max(next);
                true
            }
            None => false,
        }
    }
}
