use thiserror::Error;

use crate::endpoint::EndpointError;

use super::{NegotiationState, NegotiationStep};

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("{step} failed")]
    Step {
        step: NegotiationStep,
        #[source]
        source: EndpointError,
    },
    #[error("unexpected negotiation transition from {from:?} to {to:?}")]
    OutOfOrder {
        from: NegotiationState,
        to: NegotiationState,
    },
}

impl NegotiationError {
    pub fn step(&self) -> Option<NegotiationStep> {
        match self {
            Self::Step { step, .. } => Some(*step),
            Self::OutOfOrder { .. } => None,
        }
    }
}
