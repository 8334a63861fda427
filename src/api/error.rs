use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error payload for requests that never reach the arrival pipeline.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
