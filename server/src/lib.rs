//! `hostel-server`: HTTP front end for the hostel back office.
//!
//! Speaks JSON over HTTP. Callers identify themselves with the
//! `X-Hostel-User` header; `/health` is the only open route.

pub mod app;
pub mod error;
pub mod handlers;
pub mod http;
pub mod protocol;
pub mod router;

pub use app::App;
pub use router::{ApiRequest, HttpMethod, Reply, dispatch};
