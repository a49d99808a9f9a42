//! Wraps the Hashcat-compatible cracking engine: builds its command line
//! from a task assignment, parses its machine-readable status stream, and
//! reads recovered plaintexts from its output file.

use krakenhashes_models::{AttackMode, CrackedPair};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine exited with a non-exhausted failure status: {0}")]
    Failed(i32),
    #[error("engine terminated by signal")]
    Terminated,
}

/// Everything the engine needs to crack one chunk, already resolved to
/// local filesystem paths by the caller (via the file sync cache).
pub struct ChunkAssignment {
    pub hash_type_id: i32,
    pub attack_mode: AttackMode,
    pub binary_path: PathBuf,
    pub wordlist_paths: Vec<PathBuf>,
    pub rule_paths: Vec<PathBuf>,
    pub mask: Option<String>,
    pub hashlist_path: PathBuf,
    pub chunk_start: i64,
    pub chunk_length: i64,
    pub status_interval_seconds: u32,
    pub outfile_path: PathBuf,
}

/// A parsed line from the engine's `--machine-readable` status stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusRecord {
    Status(i32),
    Progress { processed: i64, total: i64 },
    Speed(i64),
    Recovered { cracked: i64, total: i64 },
}

/// Progress observed while the engine runs, forwarded to the control
/// channel as `task_progress` messages.
#[derive(Debug, Clone, Default)]
pub struct EngineProgress {
    pub keyspace_processed: i64,
    pub hashes_per_second: i64,
    pub progress_percent: f32,
}

fn attack_mode_flag(mode: AttackMode) -> &'static str {
    match mode {
        AttackMode::Straight => "0",
        AttackMode::Combination => "1",
        AttackMode::BruteForceMask => "3",
        AttackMode::HybridWlMask => "6",
        AttackMode::HybridMaskWl => "7",
    }
}

fn build_command(assignment: &ChunkAssignment) -> Command {
    let mut command = Command::new(&assignment.binary_path);
    command
        .arg("-m")
        .arg(assignment.hash_type_id.to_string())
        .arg("-a")
        .arg(attack_mode_flag(assignment.attack_mode))
        .arg("--quiet")
        .arg("--status")
        .arg("--machine-readable")
        .arg(format!("--status-timer={}", assignment.status_interval_seconds.max(1)))
        .arg(format!("--skip={}", assignment.chunk_start))
        .arg(format!("--limit={}", assignment.chunk_start + assignment.chunk_length))
        .arg("-o")
        .arg(&assignment.outfile_path)
        .arg("--outfile-format=2")
        .arg(&assignment.hashlist_path);

    for wordlist in &assignment.wordlist_paths {
        command.arg(wordlist);
    }
    for rule in &assignment.rule_paths {
        command.arg("-r").arg(rule);
    }
    if let Some(mask) = &assignment.mask {
        command.arg(mask);
    }

    command.stdout(Stdio::piped()).stderr(Stdio::piped()).stdin(Stdio::null());
    command
}

/// Spawns the engine and drives its status stream, sending progress
/// updates on `progress_tx` as they're parsed. Returns once the process
/// exits, along with whatever cracks landed in the output file.
pub async fn run_chunk(
    assignment: &ChunkAssignment,
    progress_tx: mpsc::UnboundedSender<EngineProgress>,
) -> Result<Vec<CrackedPair>, EngineError> {
    let mut child: Child = build_command(assignment).spawn()?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let mut lines = BufReader::new(stdout).lines();

    let mut latest = EngineProgress::default();
    while let Some(line) = lines.next_line().await? {
        let Some(record) = parse_status_line(&line) else {
            continue;
        };
        match record {
            StatusRecord::Progress { processed, total } => {
                latest.keyspace_processed = processed;
                if total > 0 {
                    latest.progress_percent = (processed as f32 / total as f32) * 100.0;
                }
            }
            StatusRecord::Speed(hps) => latest.hashes_per_second = hps,
            StatusRecord::Recovered { cracked, .. } => {
                debug!(cracked, "engine reported a recovery");
            }
            StatusRecord::Status(_) => {}
        }
        let _ = progress_tx.send(latest.clone());
    }

    let exit_status = child.wait().await?;
    match exit_status.code() {
        // 0: all hashes in this chunk cracked. 1: keyspace exhausted with
        // nothing left to crack. Both are a completed chunk, not a failure.
        Some(0) | Some(1) => {}
        Some(code) => return Err(EngineError::Failed(code)),
        None => return Err(EngineError::Terminated),
    }

    read_cracks(&assignment.outfile_path).await
}

/// Parses one `--machine-readable` status line. Hashcat emits tab-separated
/// `KEY\tVALUE[\tVALUE...]` records; unrecognized keys are ignored so new
/// engine versions that add fields don't break parsing.
pub fn parse_status_line(line: &str) -> Option<StatusRecord> {
    let mut fields = line.split('\t');
    let key = fields.next()?;
    match key {
        "STATUS" => Some(StatusRecord::Status(fields.next()?.parse().ok()?)),
        "SPEED" => Some(StatusRecord::Speed(fields.next()?.parse().ok()?)),
        "PROGRESS" => {
            let processed = fields.next()?.parse().ok()?;
            let total = fields.next()?.parse().ok()?;
            Some(StatusRecord::Progress { processed, total })
        }
        "RECOVERED" => {
            let cracked = fields.next()?.parse().ok()?;
            let total = fields.next()?.parse().ok()?;
            Some(StatusRecord::Recovered { cracked, total })
        }
        _ => None,
    }
}

async fn read_cracks(outfile_path: &std::path::Path) -> Result<Vec<CrackedPair>, EngineError> {
    let contents = match tokio::fs::read_to_string(outfile_path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut cracks = Vec::new();
    for line in contents.lines() {
        // --outfile-format=2 is `hash:plaintext`; the hash itself may
        // legitimately contain colons (salted formats), so split on the
        // last one.
        match line.rsplit_once(':') {
            Some((hash_value, plaintext)) => cracks.push(CrackedPair {
                hash_value: hash_value.to_string(),
                plaintext: plaintext.to_string(),
            }),
            None => warn!(line, "malformed crack line in engine outfile"),
        }
    }
    Ok(cracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_and_speed_records() {
        assert_eq!(
            parse_status_line("PROGRESS\t1000\t5000"),
            Some(StatusRecord::Progress { processed: 1000, total: 5000 })
        );
        assert_eq!(parse_status_line("SPEED\t123456"), Some(StatusRecord::Speed(123456)));
        assert_eq!(parse_status_line("STATUS\t3"), Some(StatusRecord::Status(3)));
        assert_eq!(
            parse_status_line("RECOVERED\t2\t10"),
            Some(StatusRecord::Recovered { cracked: 2, total: 10 })
        );
    }

    #[test]
    fn unrecognized_lines_are_ignored() {
        assert_eq!(parse_status_line("some noise on stdout"), None);
        assert_eq!(parse_status_line(""), None);
    }

    #[test]
    fn attack_mode_flags_match_hashcat_numbering() {
        assert_eq!(attack_mode_flag(AttackMode::Straight), "0");
        assert_eq!(attack_mode_flag(AttackMode::BruteForceMask), "3");
        assert_eq!(attack_mode_flag(AttackMode::HybridMaskWl), "7");
    }

    #[tokio::test]
    async fn read_cracks_splits_on_last_colon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        tokio::fs::write(&path, "5f4dcc3b5aa765d61d8327deb882cf99:password\nnosep\nsalt:value:plain")
            .await
            .unwrap();

        let cracks = read_cracks(&path).await.unwrap();
        assert_eq!(cracks.len(), 2);
        assert_eq!(cracks[0].plaintext, "password");
        assert_eq!(cracks[1].hash_value, "salt:value");
        assert_eq!(cracks[1].plaintext, "plain");
    }

    #[tokio::test]
    async fn read_cracks_missing_file_returns_empty() {
        let cracks = read_cracks(std::path::Path::new("/nonexistent/outfile")).await.unwrap();
        assert!(cracks.is_empty());
    }
}
