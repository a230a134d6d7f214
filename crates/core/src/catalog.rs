//! Catalog snapshot — personas, servers, and frameworks loaded at startup.
//!
//! A catalog is immutable once built. Reloading produces a new snapshot
//! that replaces the old one wholesale; readers holding the old `Arc`
//! keep a consistent view.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::capability::CapabilityServer;
use crate::error::CatalogError;
use crate::persona::Persona;

/// A framework and the terms that distinguish it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkDefinition {
    pub id: String,
    pub name: String,
    pub terms: Vec<String>,
}

/// A validated catalog snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    personas: Vec<Persona>,
    servers: Vec<CapabilityServer>,
    frameworks: Vec<FrameworkDefinition>,
    fallback_persona: String,
}

impl Catalog {
    /// Build and validate a catalog. Declaration order is preserved and
    /// used as the tie-break everywhere.
    pub fn new(
        personas: Vec<Persona>,
        servers: Vec<CapabilityServer>,
        frameworks: Vec<FrameworkDefinition>,
        fallback_persona: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let catalog = Self {
            personas,
            servers,
            frameworks,
            fallback_persona: fallback_persona.into(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.personas.is_empty() {
            return Err(CatalogError::NoPersonas);
        }

        let mut server_ids = HashSet::new();
        for server in &self.servers {
            if !server_ids.insert(server.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "server",
                    id: server.id.clone(),
                });
            }
            if server.timeout_ms == 0 {
                return Err(CatalogError::ZeroTimeout(server.id.clone()));
            }
        }

        let mut persona_ids = HashSet::new();
        for persona in &self.personas {
            if !persona_ids.insert(persona.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "persona",
                    id: persona.id.clone(),
                });
            }
            if !(0.0..=1.0).contains(&persona.activation_threshold) {
                return Err(CatalogError::InvalidThreshold {
                    persona: persona.id.clone(),
                    threshold: persona.activation_threshold,
                });
            }
            for affinity in &persona.capability_affinities {
                if !server_ids.contains(affinity.server_id.as_str()) {
                    return Err(CatalogError::UnknownServer {
                        persona: persona.id.clone(),
                        server: affinity.server_id.clone(),
                    });
                }
            }
        }

        if !persona_ids.contains(self.fallback_persona.as_str()) {
            return Err(CatalogError::UnknownFallback(self.fallback_persona.clone()));
        }

        let mut framework_ids = HashSet::new();
        for framework in &self.frameworks {
            if !framework_ids.insert(framework.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "framework",
                    id: framework.id.clone(),
                });
            }
            if framework.terms.iter().all(|t| t.trim().is_empty()) {
                return Err(CatalogError::EmptyFramework(framework.id.clone()));
            }
        }

        Ok(())
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn servers(&self) -> &[CapabilityServer] {
        &self.servers
    }

    pub fn frameworks(&self) -> &[FrameworkDefinition] {
        &self.frameworks
    }

    pub fn persona(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn server(&self, id: &str) -> Option<&CapabilityServer> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Declaration index of a server, used to order disclosures.
    pub fn server_position(&self, id: &str) -> Option<usize> {
        self.servers.iter().position(|s| s.id == id)
    }

    /// The persona returned when nothing else clears its threshold.
    pub fn fallback_persona(&self) -> &Persona {
        // Validation guarantees the fallback exists.
        self.persona(&self.fallback_persona)
            .unwrap_or(&self.personas[0])
    }
}
