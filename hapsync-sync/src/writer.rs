//! Artifact writers.
//!
//! Two transports put bytes on the remote host:
//!
//! - [`StreamWriter`] streams content through the session's `upload`;
//! - [`HeredocWriter`] embeds it in a quoted shell here-document.
//!
//! Both leave exactly the artifact's bytes in the target file, so a
//! subsequent `sha256sum` matches the local fingerprint.

use async_trait::async_trait;
use serde::Serialize;

use hapsync_core::WriteMode;
use hapsync_remote::{shell, RemoteError, RemoteSession};
use hapsync_renderer::Artifact;

/// Outcome for one artifact in a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteResult {
    /// Remote copy was missing or stale and has been replaced.
    Written { path: String },
    /// Remote fingerprint matched; nothing sent.
    Unchanged { path: String },
    /// Plan mode: the artifact *would* have been written.
    WouldWrite { path: String },
}

impl WriteResult {
    pub fn path(&self) -> &str {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path } => path,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}

#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Replace the remote file at `artifact.path` with `artifact.content`.
    async fn write(&self, session: &dyn RemoteSession, artifact: &Artifact)
        -> Result<(), RemoteError>;
}

pub fn writer_for(mode: WriteMode) -> Box<dyn ArtifactWriter> {
    match mode {
        WriteMode::Stream => Box::new(StreamWriter),
        WriteMode::Heredoc => Box::new(HeredocWriter),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamWriter;

#[async_trait]
impl ArtifactWriter for StreamWriter {
    async fn write(
        &self,
        session: &dyn RemoteSession,
        artifact: &Artifact,
    ) -> Result<(), RemoteError> {
        session
            .upload(&artifact.path, artifact.content.as_bytes())
            .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeredocWriter;

#[async_trait]
impl ArtifactWriter for HeredocWriter {
    async fn write(
        &self,
        session: &dyn RemoteSession,
        artifact: &Artifact,
    ) -> Result<(), RemoteError> {
        session
            .exec_shell(&heredoc_command(&artifact.path, &artifact.content))
            .await
            .map(|_| ())
    }
}

const DELIMITER: &str = "HAPSYNC_EOF";

/// Build a redirect that reproduces `content` byte for byte.
///
/// A here-document always ends its body with a newline. Content that already
/// ends with one goes through `cat`; anything else is trimmed back to its
/// exact length with `head -c`.
pub(crate) fn heredoc_command(path: &str, content: &str) -> String {
    let delimiter = pick_delimiter(content);
    let target = shell::quote(path);
    if content.ends_with('\n') {
        format!("cat <<'{delimiter}' > {target}\n{content}{delimiter}")
    } else {
        format!(
            "head -c {} <<'{delimiter}' > {target}\n{content}\n{delimiter}",
            content.len()
        )
    }
}

fn pick_delimiter(content: &str) -> String {
    let clashes = |candidate: &str| content.lines().any(|line| line == candidate);
    let mut delimiter = DELIMITER.to_string();
    let mut n = 0;
    while clashes(&delimiter) {
        n += 1;
        delimiter = format!("{DELIMITER}_{n}");
    }
    delimiter
}

#[cfg(test)]
mod tests {
    use super::*;
    use hapsync_remote::{Connector, MemoryHost};
    use hapsync_renderer::ArtifactKind;

    fn artifact(path: &str, content: &str) -> Artifact {
        Artifact {
            kind: ArtifactKind::Backend,
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn trailing_newline_uses_cat() {
        assert_eq!(
            heredoc_command("/etc/hap/a.cfg", "backend x\n"),
            "cat <<'HAPSYNC_EOF' > /etc/hap/a.cfg\nbackend x\nHAPSYNC_EOF"
        );
    }

    #[test]
    fn missing_trailing_newline_is_trimmed_by_length() {
        assert_eq!(
            heredoc_command("/etc/hap/a.cfg", "backend x"),
            "head -c 9 <<'HAPSYNC_EOF' > /etc/hap/a.cfg\nbackend x\nHAPSYNC_EOF"
        );
    }

    #[test]
    fn delimiter_avoids_content_lines() {
        let cmd = heredoc_command("/x", "HAPSYNC_EOF\nHAPSYNC_EOF_1\n");
        assert!(cmd.starts_with("cat <<'HAPSYNC_EOF_2' > /x\n"));
        assert!(cmd.ends_with("\nHAPSYNC_EOF_2"));
    }

    #[test]
    fn target_path_is_quoted() {
        let cmd = heredoc_command("/etc/my hap/a.cfg", "x\n");
        assert!(cmd.starts_with("cat <<'HAPSYNC_EOF' > '/etc/my hap/a.cfg'\n"));
    }

    #[tokio::test]
    async fn both_writers_leave_identical_bytes() {
        for content in ["backend x\n\tserver srv0 10.0.0.1:80\n", "no newline", "", "$HOME `id` 'q'\n"] {
            let host = MemoryHost::new();
            let session = host.connect().await.unwrap();

            StreamWriter
                .write(session.as_ref(), &artifact("/s.cfg", content))
                .await
                .unwrap();
            HeredocWriter
                .write(session.as_ref(), &artifact("/h.cfg", content))
                .await
                .unwrap();

            assert_eq!(host.file("/s.cfg").as_deref(), Some(content));
            assert_eq!(host.file("/h.cfg").as_deref(), Some(content), "content {content:?}");
        }
    }

    #[test]
    fn write_result_serializes_with_status_tag() {
        let json = serde_json::to_string(&WriteResult::WouldWrite {
            path: "/a".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"would_write","path":"/a"}"#);
    }
}
