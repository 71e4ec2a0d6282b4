//! # Error Types
//!
//! Every failure in the bus is a refused operation: a bounded table was
//! full, a name did not fit, or a name was already taken. None of them is
//! fatal and none of them leaves a table half-updated.
//!
//! Lookup misses and type mismatches are not errors. `lookup` returns an
//! `Option`, and `publish` reports how many subscribers it reached.

use core::fmt;

/// The bounded table that refused an insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Table {
    /// Component name → node id entries.
    Directory,
    /// `(sender, receiver)` channels.
    Channels,
    /// Subscribers attached to a single channel.
    Subscribers,
    /// Periodic jobs owned by a single node.
    Jobs,
    /// Statically registered plugin factories.
    Registry,
}

impl Table {
    /// Human readable table name, used in log lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Table::Directory => "directory",
            Table::Channels => "channels",
            Table::Subscribers => "subscribers",
            Table::Jobs => "jobs",
            Table::Registry => "registry",
        }
    }
}

/// The primary error enum for the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The named table is at its compile-time capacity.
    CapacityExceeded(Table),
    /// A component name is longer than [`MAX_NAME_LEN`](crate::config::MAX_NAME_LEN).
    NameTooLong,
    /// The name is already present in the directory or the plugin registry.
    AlreadyRegistered,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded(table) => write!(f, "{} table is full", table.as_str()),
            Error::NameTooLong => f.write_str("component name is too long"),
            Error::AlreadyRegistered => f.write_str("component name is already registered"),
        }
    }
}

impl core::error::Error for Error {}
