pub mod auth;
pub mod capsules;
pub mod credentials;
pub mod error;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod speech;
pub mod state;
pub mod tokens;

pub use routes::build_router;
pub use state::{AppState, AppStateInner};
