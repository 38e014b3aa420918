//! Identifiers and content settings exchanged with the host.

use serde::{Deserialize, Serialize};

use podium_config::Config;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(
    /// Server-assigned identifier of a content item.
    ContentId
);
id_type!(
    /// Identifier of one uploaded bundle.
    BundleId
);
id_type!(
    /// Identifier of an asynchronous server-side task.
    TaskId
);

/// Content item settings pushed to the host on create and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_as: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_current_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_processes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<i64>,
}

impl ContentSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            title: cfg.title.clone(),
            description: cfg.description.clone(),
            run_as: cfg
                .access
                .as_ref()
                .map(|a| a.run_as.clone())
                .unwrap_or_default(),
            run_as_current_user: cfg.access.as_ref().and_then(|a| a.run_as_current_user),
            min_processes: cfg.runtime.as_ref().and_then(|r| r.min_processes),
            max_processes: cfg.runtime.as_ref().and_then(|r| r.max_processes),
        }
    }
}

/// State of an asynchronous server task, as returned by the task poll
/// endpoint. `first` on the next request should be the returned `last`
/// so output lines arrive exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub last: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}
