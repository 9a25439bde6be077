use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed staged message: {0}")]
    MalformedMessage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
