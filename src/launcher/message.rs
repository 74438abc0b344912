use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::lifecycle::{Operation, OperationError};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed push envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("message data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("message data is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("message has no data")]
    Empty,

    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// Body Pub/Sub POSTs to a push subscription endpoint
#[derive(Debug, Deserialize)]
pub struct PubSubPushEnvelope {
    pub message: PubSubMessage,
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    pub data: Option<String>,
    pub message_id: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl PubSubPushEnvelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, MessageError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn operation(&self) -> Result<Operation, MessageError> {
        let data = self.message.data.as_deref().ok_or(MessageError::Empty)?;
        decode_operation(data)
    }
}

/// Operation code from base64 message data
pub fn decode_operation(data: &str) -> Result<Operation, MessageError> {
    let bytes = STANDARD.decode(data.trim())?;
    let text = String::from_utf8(bytes)?;
    if text.trim().is_empty() {
        return Err(MessageError::Empty);
    }
    Ok(text.parse::<Operation>()?)
}
