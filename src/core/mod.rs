//! Foundational and often-reused types.

pub(crate) mod config;
pub(crate) mod id;
pub(crate) mod lookup;
pub mod message;
pub(crate) mod peer;
pub(crate) mod routing_table;
