//! Project configuration types for Podium publishing.
//!
//! A [`Config`] describes one publishable project: what kind of content it
//! is, which file the server should run or render, and the runtime and
//! resource sections the host needs to serve it.

mod content_type;
mod types;

pub use content_type::ContentType;
pub use types::{
    AccessConfig, Config, KubernetesConfig, PythonConfig, QuartoConfig, RConfig, RuntimeConfig,
};

/// Schema tag written into persisted configurations.
pub const CONFIG_SCHEMA: &str = "https://podium.pub/schemas/config/v1.json";
