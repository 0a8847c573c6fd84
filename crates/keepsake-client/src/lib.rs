//! Typed client for the keepsake HTTP API.
//!
//! Authentication is an explicit value: `Client::login` returns a `Session`
//! that owns the bearer token, and every authenticated call goes through it.
//! Logging out is dropping the session.

pub mod client;
pub mod error;
pub mod timeline;

pub use client::{Client, NewCapsuleForm, Session, UploadFile};
pub use error::ClientError;
