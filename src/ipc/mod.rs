mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use handlers::core::open_workspace;
pub use router::{bad_json, handle_request};
pub use types::{AppState, Request};
