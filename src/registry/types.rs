// src/registry/types.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enrich::types::SourceEntry;

const OFFICIAL_META_KEY: &str = "io.modelcontextprotocol.registry/official";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub is_required: bool,
    pub is_secret: bool,
}

/// Flattened registry record, one per server (latest version only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    pub version: String,
    pub repo_url: Option<String>,
    pub repo_source: Option<String>,
    pub has_packages: bool,
    pub package_types: Vec<String>,
    pub package_identifiers: Vec<String>,
    pub has_remotes: bool,
    pub transport_types: Vec<String>,
    pub env_vars: Vec<EnvVar>,
    pub has_website: bool,
    pub has_icon: bool,
    pub published_at: String,
    pub updated_at: String,
    pub namespace: String,
    pub server_id: String,
}

impl SourceEntry for ServerEntry {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn repo_url(&self) -> Option<&str> {
        self.repo_url.as_deref()
    }
}

// ---- raw wire shapes ----

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub servers: Option<Vec<Value>>,
    #[serde(default)]
    pub metadata: Option<PageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageMetadata {
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    server: RawServer,
    #[serde(rename = "_meta", default)]
    meta: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficialMeta {
    #[serde(default)]
    is_latest: bool,
    published_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServer {
    #[serde(default)]
    name: String,
    title: Option<String>,
    description: Option<String>,
    version: Option<String>,
    repository: Option<RawRepository>,
    packages: Option<Vec<RawPackage>>,
    remotes: Option<Vec<RawRemote>>,
    website_url: Option<String>,
    icons: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    url: Option<String>,
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackage {
    registry_type: Option<String>,
    identifier: Option<String>,
    transport: Option<RawTransport>,
    environment_variables: Option<Vec<RawEnvVar>>,
}

#[derive(Debug, Deserialize)]
struct RawTransport {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvVar {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_required: bool,
    #[serde(default)]
    is_secret: bool,
}

#[derive(Debug, Deserialize)]
struct RawRemote {
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.is_empty())
}

impl RawEntry {
    fn official(&self) -> OfficialMeta {
        self.meta
            .as_ref()
            .and_then(|m| m.get(OFFICIAL_META_KEY))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub(crate) fn is_latest(&self) -> bool {
        self.official().is_latest
    }

    pub(crate) fn normalize(self) -> ServerEntry {
        let official = self.official();
        let server = self.server;

        let (namespace, server_id) = match server.name.split_once('/') {
            Some((ns, id)) => (ns.to_string(), id.to_string()),
            None => (String::new(), server.name.clone()),
        };

        let (repo_url, repo_source) = match server.repository {
            Some(r) => (non_empty(r.url), non_empty(r.source)),
            None => (None, None),
        };

        let packages = server.packages.unwrap_or_default();
        let remotes = server.remotes.unwrap_or_default();
        let has_packages = !packages.is_empty();
        let has_remotes = !remotes.is_empty();

        let mut package_types = Vec::new();
        let mut package_identifiers = Vec::new();
        let mut transport_types: Vec<String> = Vec::new();
        let mut env_vars = Vec::new();

        for pkg in packages {
            if let Some(t) = non_empty(pkg.registry_type) {
                package_types.push(t);
            }
            if let Some(id) = non_empty(pkg.identifier) {
                package_identifiers.push(id);
            }
            if let Some(t) = non_empty(pkg.transport.and_then(|t| t.kind)) {
                if !transport_types.contains(&t) {
                    transport_types.push(t);
                }
            }
            for ev in pkg.environment_variables.unwrap_or_default() {
                env_vars.push(EnvVar {
                    name: ev.name,
                    is_required: ev.is_required,
                    is_secret: ev.is_secret,
                });
            }
        }
        for remote in remotes {
            if let Some(t) = non_empty(remote.kind) {
                if !transport_types.contains(&t) {
                    transport_types.push(t);
                }
            }
        }

        ServerEntry {
            title: non_empty(server.title),
            description: server.description.unwrap_or_default(),
            version: server.version.unwrap_or_default(),
            repo_url,
            repo_source,
            has_packages,
            package_types,
            package_identifiers,
            has_remotes,
            transport_types,
            env_vars,
            has_website: server.website_url.is_some_and(|u| !u.is_empty()),
            has_icon: server.icons.is_some_and(|i| !i.is_empty()),
            published_at: official.published_at.unwrap_or_default(),
            updated_at: official.updated_at.unwrap_or_default(),
            namespace,
            server_id,
            name: server.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawEntry {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn normalizes_packages_remotes_and_meta() {
        let e = raw(json!({
            "server": {
                "name": "io.github.acme/weather",
                "description": "Weather tools",
                "version": "1.2.0",
                "repository": {"url": "https://github.com/acme/weather", "source": "github"},
                "packages": [
                    {
                        "registryType": "npm",
                        "identifier": "@acme/weather",
                        "transport": {"type": "stdio"},
                        "environmentVariables": [
                            {"name": "WEATHER_API_KEY", "isRequired": true, "isSecret": true}
                        ]
                    },
                    {"registryType": "oci", "identifier": "acme/weather", "transport": {"type": "stdio"}}
                ],
                "remotes": [{"type": "sse", "url": "https://x"}, {"type": "stdio"}],
                "websiteUrl": "https://acme.dev",
                "icons": []
            },
            "_meta": {
                "io.modelcontextprotocol.registry/official": {
                    "isLatest": true,
                    "publishedAt": "2025-09-01T00:00:00Z",
                    "updatedAt": "2025-09-02T00:00:00Z"
                }
            }
        }));
        assert!(e.is_latest());
        let s = e.normalize();
        assert_eq!(s.namespace, "io.github.acme");
        assert_eq!(s.server_id, "weather");
        assert_eq!(s.package_types, vec!["npm", "oci"]);
        assert_eq!(s.transport_types, vec!["stdio", "sse"]);
        assert_eq!(s.env_vars.len(), 1);
        assert!(s.env_vars[0].is_secret);
        assert!(s.has_website);
        assert!(!s.has_icon);
        assert_eq!(s.title, None);
        assert_eq!(s.published_at, "2025-09-01T00:00:00Z");
        assert_eq!(s.repo_url(), Some("https://github.com/acme/weather"));
    }

    #[test]
    fn bare_entry_has_empty_defaults() {
        let e = raw(json!({"server": {"name": "solo", "packages": null}}));
        assert!(!e.is_latest());
        let s = e.normalize();
        assert_eq!(s.namespace, "");
        assert_eq!(s.server_id, "solo");
        assert!(!s.has_packages);
        assert_eq!(s.repo_url, None);
    }
}
