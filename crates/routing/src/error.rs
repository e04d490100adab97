#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid source filter {pattern:?}: {source}")]
    InvalidSourceFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("routing rule needs at least one {side} channel")]
    EmptyRule { side: &'static str },

    #[error(transparent)]
    Channel(#[from] rarsms_channels::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
