//! facembed-server — HTTP front end for face embedding.
//!
//! `POST /faceEmbeddingB64` and `POST /faceEmbeddingImg` return the first
//! detected face's normalized embedding. Undecodable images and images without
//! a face are reported as 200 responses with an `error` field; base64 and
//! analyzer failures are 500s with a `detail` message.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod request;
pub mod response;

pub use app::{create_app, AppState};
pub use config::Config;
pub use error::ApiError;
pub use request::EmbeddingRequest;
pub use response::EmbeddingResponse;
