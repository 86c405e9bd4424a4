use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Push transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Push API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("{failed} of {total} push tickets rejected")]
    TicketsRejected { failed: usize, total: usize },

    #[error("Push token lookup failed: {0}")]
    TokenLookup(String),
}
