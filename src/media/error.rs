use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("constraints request neither audio nor video")]
    NoTracksRequested,
    #[error("media unavailable: {reason}")]
    Unavailable { reason: String },
}

impl MediaError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
