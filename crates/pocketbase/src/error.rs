pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid PocketBase settings: {0}")]
    Config(#[source] serde_json::Error),

    #[error("PocketBase returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
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
            other => Self::external("pocketbase", other),
        }
    }
}
