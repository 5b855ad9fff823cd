//! Client-facing payloads. Embedding results and their soft-failure wording
//! live in `facembed_core::response`.

use serde::{Deserialize, Serialize};

pub use facembed_core::response::{
    shape, EmbeddingResponse, SoftMessages, B64_MESSAGES, UPLOAD_MESSAGES,
};

pub const WELCOME_MESSAGE: &str = "Welcome to the Face Embedding FastAPI Interface!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_serializes_message() {
        let body = serde_json::to_value(WelcomeResponse { message: WELCOME_MESSAGE.to_string() }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "message": "Welcome to the Face Embedding FastAPI Interface!" })
        );
    }
}
