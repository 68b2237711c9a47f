use crate::patch::{ByteRange, MatchRecord};
use crate::search::{SearchBackend, SearchRequest};
use crate::sg::errors::SearchError;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Drives an external `sg` executable and parses its `--json=stream` output,
/// one JSON object per line.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    batch_size: usize,
}

#[derive(Debug, Deserialize)]
struct SgJsonMatch {
    range: SgRange,
    replacement: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SgRange {
    byte_offset: SgByteOffset,
}

#[derive(Debug, Deserialize)]
struct SgByteOffset {
    start: usize,
    end: usize,
}

impl From<SgJsonMatch> for MatchRecord {
    fn from(m: SgJsonMatch) -> Self {
        MatchRecord {
            range: ByteRange::new(m.range.byte_offset.start, m.range.byte_offset.end),
            // No rewrite given: the preview deletes the match
            replacement: m.replacement.unwrap_or_default(),
        }
    }
}

/// Parse one line of `sg --json=stream` output.
fn parse_line(line: &str) -> Result<MatchRecord, SearchError> {
    serde_json::from_str::<SgJsonMatch>(line)
        .map(MatchRecord::from)
        .map_err(|e| SearchError::Malformed {
            message: format!("{e}: {line}"),
        })
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, batch_size: usize) -> Self {
        Self {
            program: program.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// `sg run --pattern P [--rewrite R] --json=stream FILE...`
    pub fn build_command(&self, request: &SearchRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("run")
            .arg("--pattern")
            .arg(&request.query.pattern);
        if !request.query.rewrite.is_empty() {
            command.arg("--rewrite").arg(&request.query.rewrite);
        }
        command
            .arg("--json=stream")
            .args(&request.include_files)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl SearchBackend for CommandBackend {
    async fn search(
        &self,
        request: SearchRequest,
        sink: mpsc::Sender<Vec<MatchRecord>>,
    ) -> Result<(), SearchError> {
        let mut child = self.build_command(&request).spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| SearchError::Process {
            message: "stdout was not captured".to_string(),
        })?;
        // Drain stderr concurrently so a chatty child cannot block on a full pipe
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut delivered = 0;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            batch.push(parse_line(&line)?);
            if batch.len() >= self.batch_size {
                delivered += batch.len();
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                sink.send(full).await.map_err(|_| SearchError::Cancelled)?;
            }
        }
        if !batch.is_empty() {
            delivered += batch.len();
            sink.send(batch).await.map_err(|_| SearchError::Cancelled)?;
        }

        let status = child.wait().await?;
        let stderr = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        // A bare non-zero exit with no output means "no matches"
        if !status.success() && !(delivered == 0 && stderr.trim().is_empty()) {
            return Err(SearchError::Process {
                message: format!("{} exited with {status}: {}", self.program, stderr.trim()),
            });
        }

        tracing::debug!(program = %self.program, matches = delivered, "sg process finished");
        Ok(())
    }
}
