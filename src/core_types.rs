//! Core identifier types used throughout the system.
//!
//! Each id is a small newtype over `u64` rather than a bare alias: the
//! network graph mixes several id spaces (nodes, links, raw materials,
//! products) and a bare `u64` would let one kind slip into another at a
//! call site without the compiler noticing.

use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }
    };
}

id_newtype!(NodeId);
id_newtype!(LinkId);
id_newtype!(RawMaterialId);
id_newtype!(ProductId);

/// Sequence number; used for the scheduler's insertion-order tie-break.
pub type SeqNum = u64;
