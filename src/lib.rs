//! Seeds a four-node database cluster simulation with random financial transactions,
//! mirroring every transaction row into the auditor's audit table.

pub mod cluster;
pub mod config;
pub mod connection;
pub mod customer;
pub mod error;
pub mod manifest;
pub mod transaction;
pub mod util;

#[cfg(test)]
mod testing;
