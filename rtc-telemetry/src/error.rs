use crate::channel::ChannelId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    //Ingest errors
    #[error("unsupported client: {0}")]
    ErrUnsupportedClient(String),
    #[error("no stats available for channel {0}")]
    ErrNoStats(ChannelId),
    #[error("unknown channel {0}")]
    ErrUnknownChannel(ChannelId),

    //Upload errors
    #[error("test run has been already finalized, data is not sent")]
    ErrAlreadyFinalized,
    #[error("no test run id available")]
    ErrNoTestRunId,
    #[error("transport \"{0}\" is not yet implemented")]
    ErrTransportNotImplemented(String),
    #[error("transport: {0}")]
    ErrTransport(String),

    #[error("json: {0}")]
    Json(String),
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

#[cfg(feature = "https")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ErrTransport(e.to_string())
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}
