//! WorkItem records and the CSV-backed record store.
//!
//! The store is a two-column delimited table (`Numbers,Status`) whose row
//! order is the generation order. Only statuses are ever mutated after
//! creation; every rewrite goes through a temp file and an atomic rename so
//! a crash mid-write never truncates the ledger.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{generate_batch, StoreError};

/// Header row of the store file.
pub const STORE_HEADER: &str = "Numbers,Status";

/// Outcome status of one work item.
///
/// Transitions only ever go Pending -> Success or Pending -> Fail; a
/// resolved status is never reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Success,
    Fail,
}

impl Status {
    /// On-disk representation. Pending is stored as an empty field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "",
            Status::Success => "success",
            Status::Fail => "fail",
        }
    }

    fn parse(value: &str) -> Option<Status> {
        match value {
            "" => Some(Status::Pending),
            "success" => Some(Status::Success),
            "fail" => Some(Status::Fail),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// One identifier-plus-status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub identifier: String,
    pub status: Status,
}

impl WorkItem {
    pub fn pending(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: Status::Pending,
        }
    }
}

/// What to do when `create` finds an existing store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Remove the existing file and generate a fresh batch.
    Delete,
    /// Rename the existing file to the lowest free `_{n}` suffix, then
    /// generate a fresh batch.
    Rename,
    /// Leave the existing file untouched and skip generation entirely.
    #[default]
    Keep,
}

/// Handle to the store file. All operations re-read the file so the file is
/// the single source of truth across runs.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Open a handle without touching the filesystem.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a store of `size` pending items, applying `policy` if the file
    /// already exists.
    ///
    /// Identifiers are random draws with no uniqueness pass, so duplicates
    /// within one batch are possible; `update_status` resolves them against
    /// the first match.
    pub fn create(
        path: impl Into<PathBuf>,
        size: usize,
        prefix: &str,
        policy: CollisionPolicy,
    ) -> Result<Self, StoreError> {
        let store = Self::open(path);

        if store.path.exists() {
            match policy {
                CollisionPolicy::Delete => {
                    info!("Removing existing store at {}", store.path.display());
                    fs::remove_file(&store.path)?;
                }
                CollisionPolicy::Rename => {
                    let target = store.free_rename_target();
                    info!(
                        "Renaming existing store {} -> {}",
                        store.path.display(),
                        target.display()
                    );
                    fs::rename(&store.path, &target)?;
                }
                CollisionPolicy::Keep => {
                    info!(
                        "Keeping existing store at {}, skipping generation",
                        store.path.display()
                    );
                    return Ok(store);
                }
            }
        }

        let items = generate_batch(size, prefix);
        store.write_all(&items)?;
        info!(
            "Generated {} identifiers into {}",
            items.len(),
            store.path.display()
        );
        Ok(store)
    }

    /// Lowest-numbered `stem_{n}.ext` sibling not already present.
    fn free_rename_target(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|s| s.to_string_lossy().into_owned());

        let mut n = 1u32;
        loop {
            let name = match &ext {
                Some(ext) => format!("{}_{}.{}", stem, n, ext),
                None => format!("{}_{}", stem, n),
            };
            let candidate = self.path.with_file_name(name);
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Load every record in file order.
    pub fn load_all(&self) -> Result<Vec<WorkItem>, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        let mut lines = content.lines().map(|l| l.trim_end_matches('\r'));

        match lines.next() {
            Some(header) if header == STORE_HEADER => {}
            Some(header) => {
                return Err(StoreError::Malformed(format!(
                    "unexpected header row: {:?}",
                    header
                )))
            }
            None => return Err(StoreError::Malformed("empty file, missing header".into())),
        }

        let mut items = Vec::new();
        for (idx, line) in lines.enumerate() {
            if line.is_empty() {
                // Allow a trailing blank line, nothing else.
                continue;
            }
            let mut fields = line.split(',');
            let identifier = fields.next().unwrap_or_default();
            let status_field = fields.next().ok_or_else(|| {
                StoreError::Malformed(format!("row {}: expected 2 columns", idx + 2))
            })?;
            if fields.next().is_some() {
                return Err(StoreError::Malformed(format!(
                    "row {}: expected 2 columns",
                    idx + 2
                )));
            }
            let status = Status::parse(status_field).ok_or_else(|| {
                StoreError::Malformed(format!(
                    "row {}: unknown status {:?}",
                    idx + 2,
                    status_field
                ))
            })?;
            items.push(WorkItem {
                identifier: identifier.to_string(),
                status,
            });
        }
        Ok(items)
    }

    /// Identifiers still pending, in file order.
    pub fn load_pending(&self) -> Result<Vec<String>, StoreError> {
        let items = self.load_all()?;
        Ok(items
            .into_iter()
            .filter(|item| item.status == Status::Pending)
            .map(|item| item.identifier)
            .collect())
    }

    /// Set the status of the first record matching `identifier`.
    ///
    /// Any record strictly before the match that is still pending is swept to
    /// Fail: an identifier that was skipped past can only mean a previous run
    /// died before its result was confirmed.
    pub fn update_status(&self, identifier: &str, status: Status) -> Result<(), StoreError> {
        let mut items = self.load_all()?;

        let pos = items
            .iter()
            .position(|item| item.identifier == identifier)
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;

        let mut swept = 0usize;
        for item in &mut items[..pos] {
            if item.status == Status::Pending {
                item.status = Status::Fail;
                swept += 1;
            }
        }
        if swept > 0 {
            warn!(
                "Backfilled {} unresolved records before {} as fail",
                swept, identifier
            );
        }

        items[pos].status = status;
        self.write_all(&items)?;
        debug!("Status for {} set to {}", identifier, status);
        Ok(())
    }

    /// Rewrite the whole file through a temp sibling and an atomic rename.
    fn write_all(&self, items: &[WorkItem]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut body = String::with_capacity(items.len() * 16 + STORE_HEADER.len() + 1);
        body.push_str(STORE_HEADER);
        body.push('\n');
        for item in items {
            body.push_str(&item.identifier);
            body.push(',');
            body.push_str(item.status.as_str());
            body.push('\n');
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DEFAULT_PREFIX;

    fn temp_store_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("oamfuture-signup-tests")
            .join(format!("{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_store(path: &Path, rows: &[(&str, &str)]) {
        let mut body = String::from("Numbers,Status\n");
        for (id, status) in rows {
            body.push_str(&format!("{},{}\n", id, status));
        }
        fs::write(path, body).unwrap();
    }

    #[test]
    fn create_writes_pending_batch() {
        let dir = temp_store_dir("create");
        let path = dir.join("numbers_status.csv");

        let store =
            RecordStore::create(&path, 25, DEFAULT_PREFIX, CollisionPolicy::Delete).unwrap();
        let items = store.load_all().unwrap();

        assert_eq!(items.len(), 25);
        for item in &items {
            assert_eq!(item.status, Status::Pending);
            assert_eq!(item.identifier.len(), 10);
            assert!(item.identifier.starts_with("76770"));
            assert!(item.identifier.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn load_pending_preserves_file_order() {
        let dir = temp_store_dir("pending");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("a", "success"), ("b", ""), ("c", "fail")]);

        let pending = RecordStore::open(&path).load_pending().unwrap();
        assert_eq!(pending, vec!["b".to_string()]);
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = temp_store_dir("roundtrip");
        let path = dir.join("numbers_status.csv");
        let store = RecordStore::open(&path);

        let items = vec![
            WorkItem::pending("7677000001"),
            WorkItem {
                identifier: "7677000002".into(),
                status: Status::Success,
            },
            WorkItem {
                identifier: "7677000003".into(),
                status: Status::Fail,
            },
        ];
        store.write_all(&items).unwrap();

        assert_eq!(store.load_all().unwrap(), items);
    }

    #[test]
    fn update_status_backfills_skipped_records() {
        let dir = temp_store_dir("backfill");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("a", ""), ("b", ""), ("c", "")]);

        let store = RecordStore::open(&path);
        store.update_status("c", Status::Success).unwrap();

        let items = store.load_all().unwrap();
        assert_eq!(items[0].status, Status::Fail);
        assert_eq!(items[1].status, Status::Fail);
        assert_eq!(items[2].status, Status::Success);
    }

    #[test]
    fn update_status_is_idempotent_for_the_match() {
        let dir = temp_store_dir("idempotent");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("a", ""), ("b", ""), ("c", "")]);

        let store = RecordStore::open(&path);
        store.update_status("b", Status::Success).unwrap();
        let first = store.load_all().unwrap();

        store.update_status("b", Status::Success).unwrap();
        let second = store.load_all().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn update_status_resolves_duplicates_to_first_match() {
        let dir = temp_store_dir("dupes");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("x", ""), ("x", "")]);

        let store = RecordStore::open(&path);
        store.update_status("x", Status::Success).unwrap();

        let items = store.load_all().unwrap();
        assert_eq!(items[0].status, Status::Success);
        assert_eq!(items[1].status, Status::Pending);
    }

    #[test]
    fn update_status_unknown_identifier_is_not_found() {
        let dir = temp_store_dir("notfound");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("a", "")]);

        let err = RecordStore::open(&path)
            .update_status("missing", Status::Fail)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = temp_store_dir("missing");
        let err = RecordStore::open(dir.join("nope.csv"))
            .load_pending()
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn bad_header_is_malformed() {
        let dir = temp_store_dir("badheader");
        let path = dir.join("numbers_status.csv");
        fs::write(&path, "Id,State\na,\n").unwrap();

        let err = RecordStore::open(&path).load_all().unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn wrong_column_count_is_malformed() {
        let dir = temp_store_dir("badcols");
        let path = dir.join("numbers_status.csv");
        fs::write(&path, "Numbers,Status\na,b,c\n").unwrap();

        let err = RecordStore::open(&path).load_all().unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn unknown_status_value_is_malformed() {
        let dir = temp_store_dir("badstatus");
        let path = dir.join("numbers_status.csv");
        fs::write(&path, "Numbers,Status\na,maybe\n").unwrap();

        let err = RecordStore::open(&path).load_all().unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn rename_policy_picks_lowest_free_suffix() {
        let dir = temp_store_dir("rename");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("old", "success")]);
        write_store(&dir.join("numbers_status_1.csv"), &[("older", "fail")]);

        let store = RecordStore::create(&path, 3, "76770", CollisionPolicy::Rename).unwrap();

        // Existing file moved aside to the next free slot.
        let renamed = RecordStore::open(dir.join("numbers_status_2.csv"));
        let moved = renamed.load_all().unwrap();
        assert_eq!(moved[0].identifier, "old");

        // Fresh batch in the original location.
        let fresh = store.load_all().unwrap();
        assert_eq!(fresh.len(), 3);
        assert!(fresh.iter().all(|i| i.status == Status::Pending));
    }

    #[test]
    fn keep_policy_skips_generation() {
        let dir = temp_store_dir("keep");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("a", ""), ("b", "success")]);

        let store = RecordStore::create(&path, 99, "76770", CollisionPolicy::Keep).unwrap();
        let items = store.load_all().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].status, Status::Success);
    }

    #[test]
    fn delete_policy_replaces_existing_file() {
        let dir = temp_store_dir("delete");
        let path = dir.join("numbers_status.csv");
        write_store(&path, &[("a", "success")]);

        let store = RecordStore::create(&path, 4, "76770", CollisionPolicy::Delete).unwrap();
        let items = store.load_all().unwrap();
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|i| i.status == Status::Pending));
    }
}
