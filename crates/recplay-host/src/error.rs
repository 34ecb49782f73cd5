use derive_more::{Display, From};
use std::io;

use recplay_core::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, From, Display)]
pub enum Error {
    #[from(skip)]
    #[display("store root {_0} is not a directory")]
    NotMounted(String),
    #[from(skip)]
    #[display("invalid artifact name {_0:?}")]
    InvalidName(String),
    #[from(skip)]
    #[display("bad button script: {_0}")]
    Script(String),
    #[from(skip)]
    #[display("{_0} is longer than {_1} bytes")]
    TooLong(&'static str, usize),

    // External
    Io(io::Error),
    Json(serde_json::Error),
    Config(ConfigError),
}

impl std::error::Error for Error {}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other.to_string()),
        }
    }
}
