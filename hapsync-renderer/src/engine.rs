//! Tera rendering engine and [`ConfigBuilder`].
//!
//! # Artifact layout
//!
//! | Artifact | Remote path                                  | Template            |
//! |----------|----------------------------------------------|---------------------|
//! | Frontend | `<dir>/frontend.cfg`                         | `frontend.cfg.tera` |
//! | Backend  | `<dir>/backend_<service>_<order>.cfg`        | `backend.cfg.tera`  |

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tera::Tera;

use hapsync_core::{ReconcileConfig, Topology, TopologyError};

use crate::artifact::{Artifact, ArtifactKind, ArtifactSet};
use crate::context::{plan_backends, FrontendCtx};
use crate::error::RenderError;

pub const FRONTEND_TEMPLATE: &str = "frontend.cfg.tera";
pub const BACKEND_TEMPLATE: &str = "backend.cfg.tera";
pub const FRONTEND_FILE: &str = "frontend.cfg";

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    (FRONTEND_TEMPLATE, include_str!("templates/frontend.cfg.tera")),
    (BACKEND_TEMPLATE, include_str!("templates/backend.cfg.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    let mut templates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine holding the frontend and backend stanzas.
///
/// `user_template_dir` may contain `frontend.cfg.tera` / `backend.cfg.tera`
/// overriding the embedded defaults.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    pub fn render(&self, name: &str, ctx: &tera::Context) -> Result<String, RenderError> {
        Ok(self.tera.render(name, ctx)?)
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Pure mapping from a topology to the artifacts it implies.
///
/// Create once with [`ConfigBuilder::new`] (embedded templates) or
/// [`ConfigBuilder::for_config`] (honours `template_dir`) and reuse.
pub struct ConfigBuilder {
    engine: TemplateEngine,
}

impl ConfigBuilder {
    /// Builder using only the embedded templates.
    pub fn new() -> Result<Self, RenderError> {
        Ok(ConfigBuilder { engine: TemplateEngine::new(None)? })
    }

    /// Builder honouring `config.template_dir` overrides.
    pub fn for_config(config: &ReconcileConfig) -> Result<Self, RenderError> {
        Ok(ConfigBuilder {
            engine: TemplateEngine::new(config.template_dir.as_deref())?,
        })
    }

    /// Render the frontend and one backend per route.
    ///
    /// Fails before producing anything if the topology is invalid, a domain
    /// needs a certificate without a configured directory, or two artifacts
    /// would share a path. Output bytes depend only on the inputs.
    pub fn build(
        &self,
        topology: &Topology,
        config: &ReconcileConfig,
    ) -> Result<ArtifactSet, RenderError> {
        topology.validate()?;
        let dir = &config.remote.directory;

        let planned = plan_backends(topology)?;
        let mut seen = HashSet::new();
        let mut backends = Vec::with_capacity(planned.len());
        for backend in &planned {
            let path = dir.join(&backend.file_name());
            if !seen.insert(path.clone()) {
                return Err(TopologyError::DuplicateArtifact(path).into());
            }
            let content = self
                .engine
                .render(BACKEND_TEMPLATE, &backend.ctx.to_tera_context()?)?;
            backends.push(Artifact {
                kind: ArtifactKind::Backend,
                path,
                content,
            });
        }

        let frontend_path = dir.join(FRONTEND_FILE);
        if seen.contains(&frontend_path) {
            return Err(TopologyError::DuplicateArtifact(frontend_path).into());
        }
        let frontend_ctx = FrontendCtx::from_backends(&planned, config)?;
        let frontend = Artifact {
            kind: ArtifactKind::Frontend,
            path: frontend_path,
            content: self
                .engine
                .render(FRONTEND_TEMPLATE, &frontend_ctx.to_tera_context()?)?,
        };

        Ok(ArtifactSet { frontend, backends })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
