//! # JSON-Lines Audit Store
//!
//! Append-only `audit.jsonl` in a data directory, one entry per line.
//!
//! ## Durability
//!
//! - Each append is written and `fsync`ed before it is acknowledged. A
//!   failed append is cut back to the prior length, so a retry never lands
//!   after a partial line.
//! - The file is held under an exclusive `fs2` lock so two processes cannot
//!   interleave writes.
//! - A torn final line (crash mid-write) is truncated on open. Corruption
//!   anywhere else refuses to open.

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use shared_types::ProjectId;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::entities::AuditEntry;
use crate::domain::errors::{AuditError, AuditResult};
use crate::ports::outbound::AuditStore;

const LOG_FILE: &str = "audit.jsonl";

struct JsonlInner {
    file: File,
    index: HashMap<ProjectId, Vec<AuditEntry>>,
}

pub struct JsonlAuditStore {
    path: PathBuf,
    inner: Arc<Mutex<JsonlInner>>,
}

impl JsonlAuditStore {
    /// Opens (or creates) the audit log under `data_dir` and takes the lock.
    pub fn open(data_dir: &Path) -> AuditResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOG_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(AuditError::AlreadyLocked(path));
        }

        let index = load_index(&mut file)?;
        let count: usize = index.values().map(Vec::len).sum();
        info!(path = %path.display(), entries = count, "[bc-06] Opened audit log");

        Ok(Self {
            path,
            inner: Arc::new(Mutex::new(JsonlInner { file, index })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_index(file: &mut File) -> AuditResult<HashMap<ProjectId, Vec<AuditEntry>>> {
    let mut content = String::new();
    file.read_to_string(&mut content)?;

    let mut index: HashMap<ProjectId, Vec<AuditEntry>> = HashMap::new();
    let mut offset = 0usize;
    for (i, segment) in content.split_inclusive('\n').enumerate() {
        let complete = segment.ends_with('\n');
        let line = segment.trim_end_matches(['\n', '\r']);
        if !line.trim().is_empty() {
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => {
                    index.entry(entry.project_id.clone()).or_default().push(entry);
                    if !complete {
                        file.write_all(b"\n")?;
                    }
                }
                Err(e) if !complete => {
                    warn!(line = i + 1, error = %e, "[bc-06] Truncating torn final audit line");
                    file.set_len(offset as u64)?;
                    break;
                }
                Err(e) => {
                    return Err(AuditError::Corrupt {
                        line: i + 1,
                        reason: e.to_string(),
                    })
                }
            }
        }
        offset += segment.len();
    }
    Ok(index)
}

/// A log file that can be cut back to a known length.
trait LogFile: Write {
    fn current_len(&self) -> std::io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
    fn sync(&mut self) -> std::io::Result<()>;
}

impl LogFile for File {
    fn current_len(&self) -> std::io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_data()
    }
}

/// Writes and syncs one line, or leaves the log as it was.
fn append_line<F: LogFile>(file: &mut F, line: &[u8]) -> std::io::Result<()> {
    let before = file.current_len()?;
    let written = file.write_all(line).and_then(|()| file.sync());
    if let Err(e) = written {
        if let Err(cut) = file.truncate_to(before) {
            warn!(error = %cut, len = before, "[bc-06] Could not truncate failed audit append");
        }
        return Err(e);
    }
    Ok(())
}

impl Drop for JsonlAuditStore {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        let _ = FileExt::unlock(&inner.file);
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| AuditError::StorageUnavailable(e.to_string()))?;
        line.push('\n');
        let inner = Arc::clone(&self.inner);
        let entry = entry.clone();

        tokio::task::spawn_blocking(move || -> AuditResult<()> {
            let mut inner = inner.lock();
            append_line(&mut inner.file, line.as_bytes())?;
            inner
                .index
                .entry(entry.project_id.clone())
                .or_default()
                .push(entry);
            Ok(())
        })
        .await
        .map_err(|e| AuditError::StorageUnavailable(e.to_string()))?
    }

    async fn history(&self, project: &ProjectId) -> AuditResult<Vec<AuditEntry>> {
        Ok(self
            .inner
            .lock()
            .index
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn last_sequence(&self, project: &ProjectId) -> AuditResult<Option<u64>> {
        Ok(self
            .inner
            .lock()
            .index
            .get(project)
            .and_then(|entries| entries.last())
            .map(|entry| entry.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::AuditOutcome;
    use shared_types::{Nonce, ProposedAction, SignedAction, SignerIdentity, Stage, SCHEMA_VERSION};
    use tempfile::TempDir;

    fn entry(project: &str, sequence: u64) -> AuditEntry {
        let project_id = ProjectId::parse(project).unwrap();
        AuditEntry {
            schema_version: SCHEMA_VERSION,
            sequence,
            project_id: project_id.clone(),
            action: SignedAction {
                action: ProposedAction::Verify { project_id },
                signer: SignerIdentity::from_address([3; 20]),
                timestamp: 1,
                nonce: Nonce::parse(format!("nonce-{sequence:04}")).unwrap(),
                canonical_message: "message".into(),
                signature: "0x00".into(),
                metadata: None,
            },
            resulting_stage: Stage::NgoVerified,
            ledger_tx: Some("0xabc".into()),
            outcome: AuditOutcome::Committed,
            content_locator: None,
            recorded_at: 10,
        }
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonlAuditStore::open(dir.path()).unwrap();
            store.append(&entry("P1", 1)).await.unwrap();
            store.append(&entry("P2", 1)).await.unwrap();
            store.append(&entry("P1", 2)).await.unwrap();
        }
        let store = JsonlAuditStore::open(dir.path()).unwrap();
        let history = store.history(&ProjectId::parse("P1").unwrap()).await.unwrap();
        assert_eq!(history.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            store.last_sequence(&ProjectId::parse("P2").unwrap()).await.unwrap(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _first = JsonlAuditStore::open(dir.path()).unwrap();
        assert!(matches!(
            JsonlAuditStore::open(dir.path()),
            Err(AuditError::AlreadyLocked(_))
        ));
    }

    #[tokio::test]
    async fn test_torn_tail_truncated() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonlAuditStore::open(dir.path()).unwrap();
            store.append(&entry("P1", 1)).await.unwrap();
        }
        let path = dir.path().join(LOG_FILE);
        let clean_len = std::fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"schemaVersion\":1,\"seq").unwrap();
        drop(file);

        let store = JsonlAuditStore::open(dir.path()).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);
        store.append(&entry("P1", 2)).await.unwrap();
        drop(store);

        let store = JsonlAuditStore::open(dir.path()).unwrap();
        let history = store.history(&ProjectId::parse("P1").unwrap()).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    /// In-memory log whose writes fail once `budget` bytes are spent.
    struct ShortLog {
        data: Vec<u8>,
        budget: Option<usize>,
    }

    impl Write for ShortLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = match self.budget {
                Some(0) => {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
                }
                Some(budget) => buf.len().min(budget),
                None => buf.len(),
            };
            self.data.extend_from_slice(&buf[..n]);
            if let Some(budget) = self.budget.as_mut() {
                *budget -= n;
            }
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogFile for ShortLog {
        fn current_len(&self) -> std::io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_partial_write_is_cut_before_retry() {
        let line = |sequence| {
            let mut line = serde_json::to_string(&entry("P1", sequence)).unwrap();
            line.push('\n');
            line
        };
        let mut log = ShortLog {
            data: Vec::new(),
            budget: None,
        };
        append_line(&mut log, line(1).as_bytes()).unwrap();
        let clean_len = log.data.len();

        log.budget = Some(12);
        assert!(append_line(&mut log, line(2).as_bytes()).is_err());
        assert_eq!(log.data.len(), clean_len);

        log.budget = None;
        append_line(&mut log, line(2).as_bytes()).unwrap();

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOG_FILE), &log.data).unwrap();
        let store = JsonlAuditStore::open(dir.path()).unwrap();
        let history = store.history(&ProjectId::parse("P1").unwrap()).await.unwrap();
        assert_eq!(history.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_inner_corruption_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOG_FILE);
        let good = serde_json::to_string(&entry("P1", 1)).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n{good}\n")).unwrap();
        assert!(matches!(
            JsonlAuditStore::open(dir.path()),
            Err(AuditError::Corrupt { line: 2, .. })
        ));
    }
}
