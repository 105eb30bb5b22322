//! Artifacts: named text files that must exist on the remote host.

use serde::Serialize;

use hapsync_core::fingerprint;

/// Which stanza an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Frontend,
    Backend,
}

/// A single `(path, content)` pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Absolute path on the remote host.
    pub path: String,
    pub content: String,
}

impl Artifact {
    /// SHA-256 of the content, comparable with remote `sha256sum` output.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.content.as_bytes())
    }
}

/// Everything one pass deploys: exactly one frontend plus one backend per route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    pub frontend: Artifact,
    /// In build order (services, then routes, as declared).
    pub backends: Vec<Artifact>,
}

impl ArtifactSet {
    /// Frontend first, then backends in build order.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        std::iter::once(&self.frontend).chain(self.backends.iter())
    }

    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.iter().find(|a| a.path == path)
    }
}

impl IntoIterator for ArtifactSet {
    type Item = Artifact;
    type IntoIter = std::iter::Chain<std::iter::Once<Artifact>, std::vec::IntoIter<Artifact>>;

    fn into_iter(self) -> Self::IntoIter {
        std::iter::once(self.frontend).chain(self.backends)
    }
}
