/// Reasons an adaptation produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdaptError {
    #[error("destination {target} has a zero-length message limit")]
    ZeroLengthLimit { target: String },

    #[error("no content fits destination {target} (limit {limit:?})")]
    NothingFits {
        target: String,
        limit: Option<usize>,
    },
}

pub type Result<T> = std::result::Result<T, AdaptError>;
