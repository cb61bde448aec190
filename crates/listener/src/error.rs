use thiserror::Error;

/// Errors that end a broker session or prevent one from starting.
///
/// Per-message failures never surface here; they are folded into an ack
/// decision by the worker that handled the message.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The broker could not be reached or the connection or channel failed.
    /// Recovered by reconnecting.
    #[error("broker connection failed: {0}")]
    Connection(#[source] lapin::Error),

    /// A declaration conflicts with an existing exchange or queue
    /// (`PRECONDITION_FAILED`). Fatal: reconnecting cannot fix it.
    #[error("broker topology conflicts with an existing declaration: {0}")]
    Topology(#[source] lapin::Error),

    /// An operation needed a live connection and there was none.
    #[error("not connected to the broker")]
    NotConnected,

    /// A setting is not valid.
    #[error("invalid listener configuration: {0}")]
    InvalidConfig(String),
}

impl ListenerError {
    /// Returns `true` if reconnecting cannot resolve the error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Topology(_) | Self::InvalidConfig(_))
    }
}
