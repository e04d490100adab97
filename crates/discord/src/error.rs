pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid Discord settings: {0}")]
    Config(#[source] serde_json::Error),

    #[error("webhook URL is missing or not absolute")]
    MissingWebhook,

    #[error("Discord API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: std::time::Duration },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Build a `Status` error from a non-success response.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Status { status, body }
    }
}

impl From<Error> for rarsms_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Config(e) => Self::invalid_input(e),
            Error::MissingWebhook => Self::invalid_input("webhook URL is missing or not absolute"),
            other => Self::external("discord", other),
        }
    }
}
