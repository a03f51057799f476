use thiserror::Error;

use crate::config::ConfigError;
use crate::endpoint::EndpointError;
use crate::media::MediaError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("failed to create endpoint: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("local media error: {0}")]
    Media(#[from] MediaError),
}
