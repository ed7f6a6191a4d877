//! Session hosting and lookup

pub mod registry;
pub mod service;

pub use registry::{SessionRegistry, SessionSummary};
pub use service::{HostError, LevelSource, SessionConfig, SessionService};
