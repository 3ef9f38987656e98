//! HTTP API module.
//!
//! The HTTP server, its request/response types, and the log broadcaster the
//! rest of the crate writes to.

pub mod server;
pub mod types;
pub mod logs;

pub use server::{router, start_server};
pub use types::*;
pub use logs::*;
