//! Command implementations

pub mod list;
pub mod scan;
pub mod stats;
pub mod watch;
