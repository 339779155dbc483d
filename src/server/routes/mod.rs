pub mod admin;
pub mod auth;
pub mod health;
pub mod payments;
pub mod plugins;
pub mod swarm;
pub mod themes;

use serde::Serialize;

/// `{"message": ...}` response body.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
