//! Root of the `hostel-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// output goes through the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod alerts;
pub mod attendance;
pub mod complaints;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod extensions;
pub mod food_shortages;
pub mod ledger;
pub mod meals;
pub mod notifications;
pub mod payments;
pub mod penalties;
pub mod roles;
pub mod rooms;
pub mod settings;
pub mod shift;
pub mod sql;
pub mod staff;
pub mod students;
pub mod users;

#[cfg(test)]
mod test_support;

pub use config::HostelConfig;
pub use error::HostelError;
pub use error::Result;
pub use roles::Actor;
pub use roles::Capability;
pub use roles::Role;
