//! Persona catalog entries.

use serde::{Deserialize, Serialize};

/// A capability a persona prefers, and the server that provides it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityAffinity {
    pub capability: String,
    pub server_id: String,
}

/// A static persona definition, read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    /// Name shown in the persona header.
    pub display_name: String,
    /// Expertise area shown next to the name.
    pub domain: String,
    pub activation_keywords: Vec<String>,
    /// Preferred capabilities, most preferred first. May be empty for a
    /// persona that only ever gives standard responses.
    #[serde(default)]
    pub capability_affinities: Vec<CapabilityAffinity>,
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: f64,
}

fn default_activation_threshold() -> f64 {
    0.15
}

impl Persona {
    /// Whether this persona can ever trigger an enhancement call.
    pub fn is_enhanceable(&self) -> bool {
        !self.capability_affinities.is_empty()
    }
}

/// A persona chosen for a request, with the affinity that ranked it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedPersona {
    pub persona: Persona,
    pub affinity: f64,
    /// True when no persona cleared its threshold and this is the fallback.
    #[serde(default)]
    pub fallback: bool,
}

impl SelectedPersona {
    pub fn id(&self) -> &str {
        &self.persona.id
    }
}
