use thiserror::Error;

use crate::endpoint::{EndpointError, Role};

#[derive(Debug, Error)]
#[error("stats fetch failed for {role} endpoint")]
pub struct StatsFetchError {
    pub role: Role,
    #[source]
    pub source: EndpointError,
}
