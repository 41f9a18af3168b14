#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Warc(warc::Error),
    Reqwest(reqwest::Error),
    ResourceExhausted(String),
    Usage(String),
    Custom(String),
}

impl Error {
    /// Process exit code for a run that failed with this error.
    ///
    /// Worker failures are reported separately by the orchestrators
    /// (a crashed shard does not abort the run); this mapping covers
    /// fatal errors only.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ResourceExhausted(_) => 2,
            Error::Usage(_) => 3,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<warc::Error> for Error {
    fn from(e: warc::Error) -> Error {
        Error::Warc(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Error {
        Error::Reqwest(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(e: std::collections::TryReserveError) -> Error {
        Error::ResourceExhausted(format!("{:?}", e))
    }
}
