pub mod config;
pub mod endpoint;
pub mod media;
pub mod negotiation;
pub mod relay;
pub mod sdp;
pub mod session;
pub mod stats;

pub use config::ConfigSet;
pub use session::{Session, SessionOrchestrator, SessionRequest};
