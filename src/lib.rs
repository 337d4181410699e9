//! Jimeng Video Node - Rust Implementation
//!
//! Node-graph plugin wrapping the Jimeng video generation API: text and/or anchor
//! frames in, a downloaded clip, its remote URL and a summary out.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod frames;
pub mod node;
pub mod params;
pub mod video;

#[cfg(feature = "python-bindings")]
pub mod python_bridge;

// Re-export main types for easy access
pub use crate::client::JimengClient;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::credentials::{Credential, CredentialResolver};
pub use crate::error::{FailureKind, JimengError, Result};
pub use crate::frames::FrameImage;
pub use crate::node::{GenerationResult, HostContext, HostInputs, JimengVideoNode};
pub use crate::params::{
    compute_dimensions, AspectRatio, DurationTier, GenerationMode, GenerationRequest, Model,
    Resolution, ResolvedDimensions,
};
pub use crate::video::{VideoHandle, VideoOutput};
