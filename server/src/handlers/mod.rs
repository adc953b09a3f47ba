//! Route handlers, grouped by the part of the back office they serve.
//!
//! Each handler checks the caller's capability, decodes its input, calls
//! into `hostel-core` and renders the result.

pub mod attendance;
pub mod housing;
pub mod mess;
pub mod notices;
pub mod people;
pub mod requests;
