//! Which capabilities the host wants, and how they start up.
//!
//! Loaded from JSON, every field optional:
//!
//! ```json
//! {
//!   "hand_tracking": { "enabled": true, "require_support": false },
//!   "passthrough": { "enabled": true, "enable_on_initialize": true, "purpose": "projected" }
//! }
//! ```

use std::path::Path;

use openxr::sys;
use serde::{Deserialize, Serialize};

use crate::engine::EngineResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrExtensionsConfig {
    pub hand_tracking: HandTrackingConfig,
    pub passthrough: PassthroughConfig,
}

impl XrExtensionsConfig {
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandTrackingConfig {
    pub enabled: bool,
    /// Fail `initialize` when the system reports no hand tracking support.
    /// Off by default: the support query is only logged.
    pub require_support: bool,
}

impl Default for HandTrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_support: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassthroughConfig {
    pub enabled: bool,
    /// Create the feed running and start it during `initialize`.
    /// When off the feed starts paused until `Passthrough::start`.
    pub enable_on_initialize: bool,
    pub purpose: LayerPurpose,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_on_initialize: true,
            purpose: LayerPurpose::Projected,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerPurpose {
    Reconstruction,
    #[default]
    Projected,
}

impl From<LayerPurpose> for sys::PassthroughLayerPurposeFB {
    fn from(purpose: LayerPurpose) -> Self {
        match purpose {
            LayerPurpose::Reconstruction => sys::PassthroughLayerPurposeFB::RECONSTRUCTION,
            LayerPurpose::Projected => sys::PassthroughLayerPurposeFB::PROJECTED,
        }
    }
}
