//! HTTP API module.
//!
//! Sessions, the axum server, response types and the progress log stream.

pub mod logs;
pub mod server;
pub mod sessions;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use sessions::{Role, SessionStore};
pub use types::*;
