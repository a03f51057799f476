use thiserror::Error;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("endpoint is closed")]
    Closed,
    #[error("invalid endpoint state: {reason}")]
    InvalidState { reason: String },
    #[error("malformed candidate: {candidate}")]
    InvalidCandidate { candidate: String },
    #[error("descriptor rejected: {reason}")]
    Rejected { reason: String },
}

impl EndpointError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn invalid_candidate(candidate: impl Into<String>) -> Self {
        Self::InvalidCandidate {
            candidate: candidate.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}
