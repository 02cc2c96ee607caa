pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid status code: {0}")]
    InvalidStatus(i32),

    #[error("unknown operation handle: {0}")]
    UnknownHandle(u64),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn spawn(err: std::io::Error) -> Self {
        Error::Spawn(err)
    }
}
