//! Crate-wide error type.
//!
//! Kept as a single hand-rolled enum (no `anyhow`/`thiserror`) so call sites
//! read as plain `Result<T, Error>` and `?` does the conversion work via the
//! `From` impls below.

use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    Http(reqwest::Error),
    Cbor(CborError),
    Config(String),
    Json(serde_json::Error),
    Bincode(Box<bincode::ErrorKind>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Sqlite(e) => write!(f, "sqlite error: {e}"),
            Error::Http(e) => write!(f, "http error: {e}"),
            Error::Cbor(e) => write!(f, "cbor error: {e}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Json(e) => write!(f, "json error: {e}"),
            Error::Bincode(e) => write!(f, "bincode error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Sqlite(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<CborError> for Error {
    fn from(e: CborError) -> Self {
        Error::Cbor(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        Error::Bincode(e)
    }
}

/// Decode/encode failure from the [`crate::cbor`] subset codec.
#[derive(Debug)]
pub struct CborError(pub String);

impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CborError {}

pub type Result<T> = std::result::Result<T, Error>;
