use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {source}", path.display())]
    Read {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: invalid json: {source}", path.display())]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}:{line}: record is not a json object", path.display())]
    NotAnObject { path: PathBuf, line: usize },

    #[error("{}:{line}: missing key `{key}`", path.display())]
    MissingKey {
        path: PathBuf,
        line: usize,
        key: String,
    },

    #[error("{}:{line}: value of `{key}` is not a string", path.display())]
    NotAString {
        path: PathBuf,
        line: usize,
        key: String,
    },

    #[error("tokenizer: {0}")]
    Tokenizer(#[from] rust_tokenizers::error::TokenizerError),

    #[error("tokenizer vocabulary has no `{0}` token")]
    MissingSpecialToken(String),

    #[error("token id {0} is not representable")]
    InvalidTokenId(i64),

    #[error("token id {id} does not fit dtype {dtype}")]
    TokenOutOfRange { id: u32, dtype: &'static str },

    #[error("{}: {reason}", path.display())]
    InvalidIndex { path: PathBuf, reason: String },

    #[error("item {index} out of range for dataset of {len} items")]
    ItemOutOfRange { index: usize, len: usize },

    #[error("config: {0}")]
    Config(String),

    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invalid_index(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::InvalidIndex {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub(crate) trait IoContext<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
