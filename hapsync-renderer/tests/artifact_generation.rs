use std::collections::BTreeMap;

use hapsync_core::{
    Node, PortAlias, ReconcileConfig, RemoteConfig, RemoteDir, RoutingConstraint, Service,
    ServiceName, Topology, TopologyError, WriteMode,
};
use hapsync_renderer::{ConfigBuilder, RenderError};
use rstest::rstest;

fn config() -> ReconcileConfig {
    ReconcileConfig {
        remote: RemoteConfig {
            host: "lb.internal".to_string(),
            port: 22,
            username: "deploy".to_string(),
            password: None,
            identity_file: None,
            directory: RemoteDir::new("/etc/haproxy/conf.d/").unwrap(),
        },
        http_port: 80,
        https_port: None,
        force_https: false,
        certificate_dir: Some("/etc/ssl/private/".to_string()),
        reload_command: "systemctl reload haproxy".to_string(),
        write_mode: WriteMode::Stream,
        template_dir: None,
    }
}

fn https_config(force: bool) -> ReconcileConfig {
    ReconcileConfig {
        https_port: Some(443),
        force_https: force,
        ..config()
    }
}

fn route(order: u32, domains: &[&str], paths: &[&str]) -> RoutingConstraint {
    RoutingConstraint {
        order,
        domains: domains.iter().map(|d| d.to_string()).collect(),
        paths: paths.iter().map(|p| p.to_string()).collect(),
        auth_realms: vec![],
        port: PortAlias::from("http"),
    }
}

fn service(name: &str, routes: Vec<RoutingConstraint>, ips: &[&str]) -> Service {
    Service {
        name: ServiceName::from(name),
        ports: BTreeMap::from([
            (PortAlias::from("http"), 8080),
            (PortAlias::from("admin"), 9090),
        ]),
        routes,
        nodes: ips
            .iter()
            .map(|ip| Node {
                ip: ip.parse().unwrap(),
            })
            .collect(),
    }
}

fn api_topology() -> Topology {
    Topology {
        services: vec![service(
            "api",
            vec![route(0, &["api.example.com"], &[])],
            &["10.0.0.5"],
        )],
    }
}

fn build(topology: &Topology, config: &ReconcileConfig) -> hapsync_renderer::ArtifactSet {
    ConfigBuilder::new()
        .expect("builder")
        .build(topology, config)
        .expect("build")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn new_deployment_scenario() {
    let set = build(&api_topology(), &config());

    let backend = &set.backends[0];
    assert_eq!(backend.path, "/etc/haproxy/conf.d/backend_api_0.cfg");
    assert!(backend.content.contains("\tserver srv0 10.0.0.5:8080\n"));

    assert!(set
        .frontend
        .content
        .contains("\tacl host_0_0 hdr(host) -i api.example.com\n"));
    assert!(set
        .frontend
        .content
        .contains("\tuse_backend bk_api_0 if host_0_0\n"));
}

#[test]
fn forced_https_splits_frontend_into_redirect_and_tls_blocks() {
    let set = build(&api_topology(), &https_config(true));
    assert_eq!(
        set.frontend.content,
        "frontend fronthttp\n\
         \tbind *:80\n\
         \thttp-request redirect scheme https\n\
         \n\
         frontend fronthttps\n\
         \tbind *:443 ssl crt /etc/ssl/private/api.example.com/api.example.com.pem\n\
         \tacl host_0_0 hdr(host) -i api.example.com\n\
         \tuse_backend bk_api_0 if host_0_0\n"
    );

    let (http_block, _) = set
        .frontend
        .content
        .split_once("\n\nfrontend fronthttps")
        .expect("two blocks");
    assert!(!http_block.contains("acl"));
    assert!(!http_block.contains("use_backend"));
}

#[test]
fn https_without_force_binds_both_ports_on_one_frontend() {
    let set = build(&api_topology(), &https_config(false));
    assert_eq!(
        set.frontend.content,
        "frontend front\n\
         \tbind *:80\n\
         \tbind *:443 ssl crt /etc/ssl/private/api.example.com/api.example.com.pem\n\
         \tacl host_0_0 hdr(host) -i api.example.com\n\
         \tuse_backend bk_api_0 if host_0_0\n"
    );
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn build_is_deterministic() {
    let topology = Topology {
        services: vec![
            service("web", vec![route(0, &[], &[]), route(1, &["www.example.com"], &["/static"])], &["10.0.1.1", "10.0.1.2"]),
            service("api", vec![route(0, &["api.example.com"], &[])], &["10.0.0.5"]),
        ],
    };
    let first = build(&topology, &https_config(true));
    for _ in 0..5 {
        let again = build(&topology, &https_config(true));
        assert_eq!(again, first);
        assert_eq!(again.frontend.fingerprint(), first.frontend.fingerprint());
    }
}

#[test]
fn node_change_only_touches_that_services_backends() {
    let before = Topology {
        services: vec![
            service("api", vec![route(0, &["api.example.com"], &[]), route(1, &[], &["/v2"])], &["10.0.0.5"]),
            service("web", vec![route(0, &["www.example.com"], &[])], &["10.0.1.1"]),
        ],
    };
    let mut after = before.clone();
    after.services[0].nodes.push(Node {
        ip: "10.0.0.6".parse().unwrap(),
    });

    let a = build(&before, &config());
    let b = build(&after, &config());

    assert_eq!(a.frontend, b.frontend);
    assert_ne!(a.backends[0].fingerprint(), b.backends[0].fingerprint());
    assert_ne!(a.backends[1].fingerprint(), b.backends[1].fingerprint());
    assert_eq!(a.backends[2], b.backends[2], "web backend must not change");
}

#[test]
fn shared_domain_yields_one_certificate_reference() {
    let topology = Topology {
        services: vec![
            service("api", vec![route(0, &["shared.example.com"], &["/api"])], &["10.0.0.5"]),
            service("web", vec![route(0, &["shared.example.com", "www.example.com"], &[])], &["10.0.1.1"]),
        ],
    };
    let set = build(&topology, &https_config(true));
    let content = &set.frontend.content;
    assert_eq!(
        content.matches("crt /etc/ssl/private/shared.example.com/shared.example.com.pem").count(),
        1
    );
    assert_eq!(content.matches(" crt ").count(), 2);
    // Host rules are still emitted per backend.
    assert!(content.contains("\tacl host_0_0 hdr(host) -i shared.example.com\n"));
    assert!(content.contains("\tacl host_1_0 hdr(host) -i shared.example.com\n"));
}

#[test]
fn domains_and_paths_are_ored_into_one_condition() {
    let topology = Topology {
        services: vec![service(
            "shop",
            vec![route(4, &["a.example.com", "b.example.com"], &["/cart"])],
            &["10.0.2.1"],
        )],
    };
    let set = build(&topology, &config());
    assert!(set.frontend.content.ends_with(
        "\tacl host_0_0 hdr(host) -i a.example.com\n\
         \tacl host_0_1 hdr(host) -i b.example.com\n\
         \tacl path_0_0 path_beg /cart\n\
         \tuse_backend bk_shop_4 if host_0_0 || host_0_1 || path_0_0\n"
    ));
}

#[test]
fn unconditional_routes_come_after_conditional_ones() {
    let topology = Topology {
        services: vec![
            service("web", vec![route(0, &[], &[])], &["10.0.1.1"]),
            service("api", vec![route(0, &["api.example.com"], &[])], &["10.0.0.5"]),
            service("legacy", vec![route(0, &[], &[])], &["10.0.3.1"]),
        ],
    };
    let set = build(&topology, &config());
    assert_eq!(
        set.frontend.content,
        "frontend front\n\
         \tbind *:80\n\
         \tacl host_1_0 hdr(host) -i api.example.com\n\
         \tuse_backend bk_api_0 if host_1_0\n\
         \tuse_backend bk_web_0\n\
         \tuse_backend bk_legacy_0\n"
    );
    // Backend files keep build order regardless of routing precedence.
    assert!(set.backends[0].path.ends_with("backend_web_0.cfg"));
    assert!(set.backends[2].path.ends_with("backend_legacy_0.cfg"));
}

#[test]
fn auth_realms_emit_two_lines_each_scoped_to_the_backend() {
    let mut admin = route(0, &["admin.example.com"], &[]);
    admin.auth_realms = vec!["staff".to_string(), "ops".to_string()];
    admin.port = PortAlias::from("admin");
    let topology = Topology {
        services: vec![service("admin", vec![admin], &["10.0.4.1", "10.0.4.2"])],
    };
    let set = build(&topology, &config());
    assert_eq!(
        set.backends[0].content,
        "backend bk_admin_0\n\
         \tacl auth_ok_bk_admin_0_0 http_auth(staff)\n\
         \thttp-request auth realm staff if !auth_ok_bk_admin_0_0\n\
         \tacl auth_ok_bk_admin_0_1 http_auth(ops)\n\
         \thttp-request auth realm ops if !auth_ok_bk_admin_0_1\n\
         \tserver srv0 10.0.4.1:9090\n\
         \tserver srv1 10.0.4.2:9090\n"
    );
}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

#[test]
fn missing_certificate_dir_is_a_configuration_error() {
    let mut cfg = https_config(true);
    cfg.certificate_dir = None;
    let err = ConfigBuilder::new()
        .unwrap()
        .build(&api_topology(), &cfg)
        .unwrap_err();
    assert!(
        matches!(err, RenderError::MissingCertificateDir { ref domain } if domain == "api.example.com"),
        "got: {err}"
    );
}

#[test]
fn certificate_dir_not_needed_without_domains() {
    let mut cfg = https_config(false);
    cfg.certificate_dir = None;
    let topology = Topology {
        services: vec![service("web", vec![route(0, &[], &["/"])], &["10.0.1.1"])],
    };
    let set = build(&topology, &cfg);
    assert!(set.frontend.content.contains("\tbind *:443 ssl\n"));
}

#[rstest]
#[case::duplicate_order(
    Topology { services: vec![service("api", vec![route(1, &[], &[]), route(1, &[], &["/x"])], &[])] },
    TopologyError::DuplicateOrder { service: "api".to_string(), order: 1 }
)]
#[case::duplicate_service(
    Topology { services: vec![service("api", vec![], &[]), service("api", vec![], &[])] },
    TopologyError::DuplicateService("api".to_string())
)]
#[case::bad_name(
    Topology { services: vec![service("api v2", vec![], &[])] },
    TopologyError::InvalidName("api v2".to_string())
)]
fn topology_errors_surface_before_rendering(
    #[case] topology: Topology,
    #[case] expected: TopologyError,
) {
    let err = ConfigBuilder::new()
        .unwrap()
        .build(&topology, &config())
        .unwrap_err();
    match err {
        RenderError::Topology(inner) => assert_eq!(inner, expected),
        other => panic!("expected topology error, got {other:?}"),
    }
}
