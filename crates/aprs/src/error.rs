pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid APRS settings: {0}")]
    Config(#[source] serde_json::Error),

    #[error("connection to {server} timed out after {secs}s")]
    ConnectTimeout { server: String, secs: u64 },

    #[error("no login response within {secs}s")]
    LoginTimeout { secs: u64 },

    #[error("login rejected: {response}")]
    LoginRejected { response: String },

    #[error("server closed the connection")]
    Closed,

    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Error> for rarsms_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Config(e) => Self::invalid_input(e),
            Error::NotConnected => Self::unavailable("APRS-IS not connected"),
            other => Self::external("aprs", other),
        }
    }
}
