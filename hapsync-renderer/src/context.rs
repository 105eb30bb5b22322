//! Template contexts: serializable rendering payloads built from a [`Topology`].
//!
//! Every identifier that must be unique (backend names, ACL names, server ids)
//! is computed here so the templates stay plain loops over ordered lists.

use std::collections::HashSet;
use std::net::SocketAddr;

use serde::Serialize;

use hapsync_core::{ReconcileConfig, RoutingConstraint, Service, Topology};

use crate::error::RenderError;

/// Payload for `backend.cfg.tera`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendCtx {
    /// `bk_<service>_<order>`.
    pub name: String,
    pub auth: Vec<AuthCtx>,
    pub servers: Vec<ServerCtx>,
}

/// One authentication realm guarding a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthCtx {
    /// ACL name, scoped by backend so realms never alias across files.
    pub rule: String,
    pub realm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCtx {
    pub id: String,
    pub address: String,
}

/// Payload for `frontend.cfg.tera`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontendCtx {
    pub http_port: u16,
    /// Split into a redirect-only HTTP frontend and a TLS frontend.
    pub redirect: bool,
    pub tls: Option<TlsBindCtx>,
    /// Conditional routes first, then unconditional fallbacks.
    pub routes: Vec<RouteCtx>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsBindCtx {
    pub port: u16,
    /// One entry per distinct domain, in first-seen order.
    pub certificates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCtx {
    pub backend: String,
    pub acls: Vec<AclCtx>,
    /// `None` for an unconditional route.
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclCtx {
    pub name: String,
    pub matcher: &'static str,
    pub value: String,
}

/// A backend in build order together with the route it was derived from.
#[derive(Debug, Clone)]
pub struct PlannedBackend<'a> {
    pub service: &'a Service,
    pub route: &'a RoutingConstraint,
    pub ctx: BackendCtx,
}

impl PlannedBackend<'_> {
    /// `backend_<service>_<order>.cfg`
    pub fn file_name(&self) -> String {
        format!("backend_{}_{}.cfg", self.service.name.0, self.route.order)
    }
}

/// Walk services then routes in declaration order and build one backend each.
pub fn plan_backends(topology: &Topology) -> Result<Vec<PlannedBackend<'_>>, RenderError> {
    let mut planned = Vec::new();
    for service in &topology.services {
        for route in &service.routes {
            let port = service.resolve_port(route)?;
            let name = format!("bk_{}_{}", service.name.0, route.order);
            let auth = route
                .auth_realms
                .iter()
                .enumerate()
                .map(|(i, realm)| AuthCtx {
                    rule: format!("auth_ok_{name}_{i}"),
                    realm: realm.clone(),
                })
                .collect();
            let servers = service
                .nodes
                .iter()
                .enumerate()
                .map(|(i, node)| ServerCtx {
                    id: format!("srv{i}"),
                    address: SocketAddr::new(node.ip, port).to_string(),
                })
                .collect();
            planned.push(PlannedBackend {
                service,
                route,
                ctx: BackendCtx {
                    name,
                    auth,
                    servers,
                },
            });
        }
    }
    Ok(planned)
}

impl FrontendCtx {
    /// Build the frontend payload from backends in build order.
    pub fn from_backends(
        backends: &[PlannedBackend<'_>],
        config: &ReconcileConfig,
    ) -> Result<Self, RenderError> {
        let tls = match config.https_port {
            Some(port) => Some(TlsBindCtx {
                port,
                certificates: certificate_refs(backends, config)?,
            }),
            None => None,
        };

        let mut conditional = Vec::new();
        let mut fallbacks = Vec::new();
        for (b, backend) in backends.iter().enumerate() {
            let route = route_ctx(b, backend);
            if route.condition.is_some() {
                conditional.push(route);
            } else {
                fallbacks.push(route);
            }
        }
        conditional.extend(fallbacks);

        Ok(FrontendCtx {
            http_port: config.http_port,
            redirect: config.redirects_to_https(),
            tls,
            routes: conditional,
        })
    }
}

// Rule names carry the backend's build position, so they stay unique even
// after fallbacks are moved behind conditional routes.
fn route_ctx(b: usize, backend: &PlannedBackend<'_>) -> RouteCtx {
    let hosts = backend
        .route
        .domains
        .iter()
        .enumerate()
        .map(|(j, domain)| AclCtx {
            name: format!("host_{b}_{j}"),
            matcher: "hdr(host) -i",
            value: domain.clone(),
        });
    let paths = backend
        .route
        .paths
        .iter()
        .enumerate()
        .map(|(k, path)| AclCtx {
            name: format!("path_{b}_{k}"),
            matcher: "path_beg",
            value: path.clone(),
        });
    let acls: Vec<AclCtx> = hosts.chain(paths).collect();
    let condition = (!acls.is_empty()).then(|| {
        acls.iter()
            .map(|acl| acl.name.as_str())
            .collect::<Vec<_>>()
            .join(" || ")
    });
    RouteCtx {
        backend: backend.ctx.name.clone(),
        acls,
        condition,
    }
}

fn certificate_refs(
    backends: &[PlannedBackend<'_>],
    config: &ReconcileConfig,
) -> Result<Vec<String>, RenderError> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for domain in backends.iter().flat_map(|b| b.route.domains.iter()) {
        if !seen.insert(domain.as_str()) {
            continue;
        }
        let dir = config
            .certificate_dir
            .as_deref()
            .ok_or_else(|| RenderError::MissingCertificateDir {
                domain: domain.clone(),
            })?;
        refs.push(format!(
            "{}/{domain}/{domain}.pem",
            dir.trim_end_matches('/')
        ));
    }
    Ok(refs)
}

impl BackendCtx {
    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

impl FrontendCtx {
    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hapsync_core::{Node, PortAlias, ServiceName};
    use std::collections::BTreeMap;

    fn service() -> Service {
        Service {
            name: ServiceName::from("api"),
            ports: BTreeMap::from([(PortAlias::from("http"), 8080)]),
            routes: vec![RoutingConstraint {
                order: 2,
                domains: vec![],
                paths: vec![],
                auth_realms: vec!["staff".to_string(), "ops".to_string()],
                port: PortAlias::from("http"),
            }],
            nodes: vec![
                Node {
                    ip: "10.0.0.5".parse().unwrap(),
                },
                Node {
                    ip: "fd00::7".parse().unwrap(),
                },
            ],
        }
    }

    #[test]
    fn backend_identifiers_are_derived_from_service_and_order() {
        let topology = Topology {
            services: vec![service()],
        };
        let planned = plan_backends(&topology).expect("plan");
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].ctx.name, "bk_api_2");
        assert_eq!(planned[0].file_name(), "backend_api_2.cfg");
        assert_eq!(planned[0].ctx.auth[1].rule, "auth_ok_bk_api_2_1");
    }

    #[test]
    fn servers_are_indexed_in_node_order() {
        let topology = Topology {
            services: vec![service()],
        };
        let planned = plan_backends(&topology).expect("plan");
        let servers = &planned[0].ctx.servers;
        assert_eq!(servers[0].id, "srv0");
        assert_eq!(servers[0].address, "10.0.0.5:8080");
        assert_eq!(servers[1].id, "srv1");
        assert_eq!(servers[1].address, "[fd00::7]:8080");
    }

    #[test]
    fn unconditional_route_has_no_condition() {
        let topology = Topology {
            services: vec![service()],
        };
        let planned = plan_backends(&topology).expect("plan");
        let route = route_ctx(0, &planned[0]);
        assert!(route.acls.is_empty());
        assert!(route.condition.is_none());
    }
}
