//! Domain types for the desired-state topology.
//!
//! All collections that influence generated output are ordered (`Vec`); the
//! only map, [`Service::ports`], is used for lookups and never iterated during
//! rendering.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed service name. Unique within a topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceName(pub String);

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Internal port identifier (e.g. `http`, `admin`) resolved per service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortAlias(pub String);

impl fmt::Display for PortAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PortAlias {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PortAlias {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A single instance of a service, reachable on the service's ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub ip: IpAddr,
}

/// One routing rule of a service. Produces exactly one backend.
///
/// A route without domains and without paths is an unconditional default
/// route for its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConstraint {
    /// Unique per service; part of the backend identifier.
    pub order: u32,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub auth_realms: Vec<String>,
    /// Alias looked up in [`Service::ports`].
    pub port: PortAlias,
}

impl RoutingConstraint {
    /// `true` when the route matches all traffic reaching the frontend.
    pub fn is_unconditional(&self) -> bool {
        self.domains.is_empty() && self.paths.is_empty()
    }
}

/// A deployed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: ServiceName,
    #[serde(default)]
    pub ports: BTreeMap<PortAlias, u16>,
    #[serde(default)]
    pub routes: Vec<RoutingConstraint>,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Service {
    /// Resolve the numeric port a route forwards to.
    pub fn resolve_port(&self, route: &RoutingConstraint) -> Result<u16, TopologyError> {
        self.ports
            .get(&route.port)
            .copied()
            .ok_or_else(|| TopologyError::UnknownPort {
                service: self.name.0.clone(),
                order: route.order,
                alias: route.port.0.clone(),
            })
    }
}

/// Root of the desired state supplied to a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Topology {
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Topology {
    /// Check every precondition the renderer relies on.
    ///
    /// Returns the first violation found, walking services and routes in
    /// declaration order.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut names = HashSet::new();
        for service in &self.services {
            if !is_identifier(&service.name.0) {
                return Err(TopologyError::InvalidName(service.name.0.clone()));
            }
            if !names.insert(&service.name) {
                return Err(TopologyError::DuplicateService(service.name.0.clone()));
            }
            for (alias, port) in &service.ports {
                if *port == 0 {
                    return Err(invalid(service, "port", alias.0.clone()));
                }
            }

            let mut orders = HashSet::new();
            for route in &service.routes {
                if !orders.insert(route.order) {
                    return Err(TopologyError::DuplicateOrder {
                        service: service.name.0.clone(),
                        order: route.order,
                    });
                }
                service.resolve_port(route)?;
                validate_route(service, route)?;
            }
        }
        Ok(())
    }
}

fn validate_route(service: &Service, route: &RoutingConstraint) -> Result<(), TopologyError> {
    if let Some(domain) = route.domains.iter().find(|d| !is_domain(d)) {
        return Err(invalid(service, "domain", domain.clone()));
    }
    if let Some(path) = route
        .paths
        .iter()
        .find(|p| !p.starts_with('/') || has_whitespace(p))
    {
        return Err(invalid(service, "path", path.clone()));
    }
    if let Some(realm) = route
        .auth_realms
        .iter()
        .find(|r| r.is_empty() || has_whitespace(r))
    {
        return Err(invalid(service, "auth realm", realm.clone()));
    }
    Ok(())
}

fn invalid(service: &Service, field: &'static str, value: String) -> TopologyError {
    TopologyError::InvalidValue {
        service: service.name.0.clone(),
        field,
        value,
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

// Domains end up inside certificate paths, so traversal sequences are rejected too.
fn is_domain(s: &str) -> bool {
    is_identifier(s) && !s.contains("..") && !s.starts_with('.')
}

fn has_whitespace(s: &str) -> bool {
    s.chars().any(char::is_whitespace)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
