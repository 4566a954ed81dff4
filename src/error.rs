use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("parser errors:\n\t{}", .errors.join("\n\t"))]
    Parser { errors: Vec<String> },
    #[error("ERROR: {message}")]
    Runtime { message: String },
}

impl Error {
    /// The message of a runtime fault, without the `ERROR: ` prefix.
    pub fn runtime_message(&self) -> Option<&str> {
        match self {
            Error::Runtime { message } => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn runtime_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Runtime {
        message: message.into(),
    })
}

pub fn parser_error<T>(errors: Vec<String>) -> Result<T> {
    Err(Error::Parser { errors })
}
