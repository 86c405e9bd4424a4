use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A notification addressed to a user; the device token is resolved at send time.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: Uuid,
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl Notification {
    pub fn new(recipient: Uuid, title: impl Into<String>, body: impl Into<String>, data: Value) -> Self {
        Self {
            recipient,
            title: title.into(),
            body: body.into(),
            data,
        }
    }
}

/// Wire message for the Expo push API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

impl PushMessage {
    pub fn for_token(token: &str, notification: &Notification) -> Self {
        Self {
            to: token.to_string(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            data: notification.data.clone(),
            sound: Some("default".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushResponse {
    #[serde(default)]
    pub data: Vec<PushTicket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushTicket {
    pub status: String,
    pub message: Option<String>,
}
