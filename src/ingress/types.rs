//! Ingress object model.
//!
//! An [`Ingress`] is one unit of externally declared routing intent. It is
//! identified by `(namespace, name)` and replaced as a whole; nothing in the
//! router mutates an ingress after it has been recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of an ingress within the rule store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IngressKey {
    pub namespace: String,
    pub name: String,
}

impl IngressKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for IngressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Service port: either a number or a named port on the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServicePort {
    Number(u16),
    Name(String),
}

impl fmt::Display for ServicePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServicePort::Number(port) => write!(f, "{}", port),
            ServicePort::Name(name) => f.write_str(name),
        }
    }
}

impl From<u16> for ServicePort {
    fn from(port: u16) -> Self {
        ServicePort::Number(port)
    }
}

impl From<&str> for ServicePort {
    fn from(name: &str) -> Self {
        ServicePort::Name(name.to_string())
    }
}

/// The service a path forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressBackend {
    pub service_name: String,
    pub service_port: ServicePort,
}

/// A single path prefix and its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressPath {
    #[serde(default)]
    pub path: String,
    pub backend: IngressBackend,
}

impl IngressPath {
    pub fn new(path: impl Into<String>, service_name: impl Into<String>, port: impl Into<ServicePort>) -> Self {
        Self {
            path: path.into(),
            backend: IngressBackend {
                service_name: service_name.into(),
                service_port: port.into(),
            },
        }
    }
}

/// HTTP routing block of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpRuleValue {
    #[serde(default)]
    pub paths: Vec<IngressPath>,
}

/// Routing for one hostname. Rules without an `http` block contribute no routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub http: Option<HttpRuleValue>,
}

impl IngressRule {
    pub fn http(host: impl Into<String>, paths: Vec<IngressPath>) -> Self {
        Self {
            host: host.into(),
            http: Some(HttpRuleValue { paths }),
        }
    }
}

/// A routing rule object as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingress {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub rules: Vec<IngressRule>,
}

impl Ingress {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, rules: Vec<IngressRule>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            rules,
        }
    }

    pub fn key(&self) -> IngressKey {
        IngressKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Returns true if both ingresses produce the same routes.
    ///
    /// Rules are compared position by position. Two rules that both lack an
    /// `http` block are equal whatever their host, since neither yields routes.
    pub fn is_equivalent(&self, other: &Ingress) -> bool {
        if self.rules.len() != other.rules.len() {
            return false;
        }

        self.rules.iter().zip(&other.rules).all(|(a, b)| match (&a.http, &b.http) {
            (None, None) => true,
            (Some(ha), Some(hb)) => {
                a.host == b.host
                    && ha.paths.len() == hb.paths.len()
                    && ha.paths.iter().zip(&hb.paths).all(|(pa, pb)| {
                        pa.path == pb.path
                            && pa.backend.service_name == pb.backend.service_name
                            && pa.backend.service_port == pb.backend.service_port
                    })
            }
            _ => false,
        })
    }
}

/// Compose the upstream address for a service path.
pub fn backend_address(service_name: &str, namespace: &str, port: &ServicePort) -> String {
    format!("{}.{}.svc:{}", service_name, namespace, port)
}
