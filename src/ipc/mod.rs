mod bridge;
mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use bridge::{HostBackend, HostBridge};
pub use router::handle_request;
pub use types::{AppState, Request};
