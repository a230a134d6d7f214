//! Capability registry — maps server ids to live transports.
//!
//! Built once per catalog snapshot. Endpoint schemes pick the transport:
//! `http://` and `https://` go through one pooled [`HttpCapabilityClient`],
//! `local:` is served in-process by [`LoopbackClient`].

use clarion_config::TransportConfig;
use clarion_core::{Catalog, CapabilityClient, CapabilityError, CapabilityServer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::http::HttpCapabilityClient;
use crate::loopback::LoopbackClient;

/// A server definition paired with the client that reaches it.
#[derive(Clone)]
pub struct RegisteredServer {
    pub server: CapabilityServer,
    pub client: Arc<dyn CapabilityClient>,
    /// Declaration order in the catalog; used to order results.
    pub position: usize,
}

impl std::fmt::Debug for RegisteredServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredServer")
            .field("id", &self.server.id)
            .field("transport", &self.client.name())
            .field("position", &self.position)
            .finish()
    }
}

/// Read-only lookup of capability servers for one catalog snapshot.
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    servers: Vec<RegisteredServer>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server with an explicit client. Re-registering an id
    /// replaces the client and keeps the original position.
    pub fn register(&mut self, server: CapabilityServer, client: Arc<dyn CapabilityClient>) {
        if let Some(&i) = self.index.get(&server.id) {
            self.servers[i].server = server;
            self.servers[i].client = client;
            return;
        }
        let position = self.servers.len();
        self.index.insert(server.id.clone(), position);
        self.servers.push(RegisteredServer {
            server,
            client,
            position,
        });
    }

    pub fn get(&self, server_id: &str) -> Option<&RegisteredServer> {
        self.index.get(server_id).map(|&i| &self.servers[i])
    }

    /// Registered servers in registration order.
    pub fn servers(&self) -> &[RegisteredServer] {
        &self.servers
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.servers.iter().map(|s| s.server.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Build a registry for every server in `catalog`.
pub fn build_from_catalog(
    catalog: &Catalog,
    transport: &TransportConfig,
) -> Result<CapabilityRegistry, CapabilityError> {
    let mut registry = CapabilityRegistry::new();
    let mut http: Option<Arc<HttpCapabilityClient>> = None;
    let loopback: Arc<LoopbackClient> = Arc::new(LoopbackClient::new());

    for server in catalog.servers() {
        let client: Arc<dyn CapabilityClient> = match scheme_of(&server.endpoint) {
            Scheme::Http => {
                let shared = match &http {
                    Some(client) => Arc::clone(client),
                    None => {
                        let client = Arc::new(HttpCapabilityClient::from_config(transport)?);
                        http = Some(Arc::clone(&client));
                        client
                    }
                };
                shared
            }
            Scheme::Local => loopback.clone(),
            Scheme::Unknown => {
                return Err(CapabilityError::NotConfigured(format!(
                    "server '{}' has unsupported endpoint '{}'",
                    server.id, server.endpoint
                )));
            }
        };
        debug!(server = %server.id, transport = client.name(), "Registered capability server");
        registry.register(server.clone(), client);
    }

    Ok(registry)
}

enum Scheme {
    Http,
    Local,
    Unknown,
}

fn scheme_of(endpoint: &str) -> Scheme {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Scheme::Http
    } else if endpoint.starts_with("local:") {
        Scheme::Local
    } else {
        Scheme::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedClient, server};
    use clarion_config::AppConfig;

    #[test]
    fn default_catalog_uses_loopback() {
        let catalog = AppConfig::default().catalog().unwrap();
        let registry = build_from_catalog(&catalog, &TransportConfig::default()).unwrap();
        assert_eq!(registry.len(), catalog.servers().len());
        for entry in registry.servers() {
            assert_eq!(entry.client.name(), "loopback");
        }
        assert_eq!(registry.get("context7").unwrap().position, 1);
    }

    #[test]
    fn http_servers_share_one_client() {
        let mut a = server("a");
        a.endpoint = "http://127.0.0.1:9001".into();
        let mut b = server("b");
        b.endpoint = "https://analysis.internal".into();
        let persona = crate::test_helpers::persona("p", &["a"]);
        let catalog = Catalog::new(vec![persona], vec![a, b], vec![], "p").unwrap();

        let registry = build_from_catalog(&catalog, &TransportConfig::default()).unwrap();
        let ca = &registry.get("a").unwrap().client;
        let cb = &registry.get("b").unwrap().client;
        assert_eq!(ca.name(), "http");
        assert!(Arc::ptr_eq(ca, cb));
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let mut a = server("a");
        a.endpoint = "grpc://somewhere".into();
        let persona = crate::test_helpers::persona("p", &["a"]);
        let catalog = Catalog::new(vec![persona], vec![a], vec![], "p").unwrap();
        let err = build_from_catalog(&catalog, &TransportConfig::default()).unwrap_err();
        assert!(matches!(err, CapabilityError::NotConfigured(_)));
    }

    #[test]
    fn reregister_keeps_position() {
        let mut registry = CapabilityRegistry::new();
        registry.register(server("a"), Arc::new(ScriptedClient::succeeding("x")));
        registry.register(server("b"), Arc::new(ScriptedClient::succeeding("x")));
        registry.register(server("a"), Arc::new(ScriptedClient::succeeding("y")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap().position, 0);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
