use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use tempfile::Builder;
use tracing::{error, info};

use crate::domain::{AssetPayload, CatalogId, Fingerprint, StoredFile};
use crate::error::{FsFailureKind, HarvestError};

const PARTIAL_PREFIX: &str = ".partial-";
const STORED_NAME: &str = r"^([0-9a-f]{32})\.([A-Za-z0-9+.\-]+)$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Written(StoredFile),
    AlreadyPresent(StoredFile),
    Failed(FsFailureKind),
}

/// Flat directory of `{md5}.{ext}` files plus the count of files written by this instance.
#[derive(Debug)]
pub struct ContentStore {
    root: Utf8PathBuf,
    downloaded: AtomicUsize,
}

impl ContentStore {
    /// Creates the directory when missing. Failing here is fatal for a run.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, HarvestError> {
        let root = root.into();
        if root.as_std_path().is_dir() {
            info!(directory = %root, "The directory: \"{root}/\" already exists");
        } else {
            fs::create_dir_all(root.as_std_path()).map_err(|err| {
                let kind = FsFailureKind::from_io(&err);
                error!(directory = %root, %kind, "{kind} when create directory \"{root}/\"");
                HarvestError::StorageRoot {
                    path: root.clone(),
                    kind,
                }
            })?;
            info!(directory = %root, "The directory: \"{root}/\" has been created");
        }
        Ok(Self {
            root,
            downloaded: AtomicUsize::new(0),
        })
    }

    /// Attaches to a directory that must already exist; nothing is created.
    pub fn existing(root: impl Into<Utf8PathBuf>) -> Result<Self, HarvestError> {
        let root = root.into();
        let kind = match fs::metadata(root.as_std_path()) {
            Ok(meta) if meta.is_dir() => {
                return Ok(Self {
                    root,
                    downloaded: AtomicUsize::new(0),
                });
            }
            Ok(_) => FsFailureKind::Other(io::ErrorKind::NotADirectory),
            Err(err) => FsFailureKind::from_io(&err),
        };
        error!(directory = %root, %kind, "{kind} when open directory \"{root}/\"");
        Err(HarvestError::StorageRoot { path: root, kind })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn path_for(&self, payload: &AssetPayload) -> StoredFile {
        StoredFile::new(&self.root, payload.fingerprint(), &payload.extension)
    }

    /// Returns whether a new file was written.
    pub fn store(&self, payload: &AssetPayload, id: CatalogId) -> bool {
        matches!(self.place(payload, id), StoreOutcome::Written(_))
    }

    pub fn place(&self, payload: &AssetPayload, id: CatalogId) -> StoreOutcome {
        let target = self.path_for(payload);
        let name = target.file_name().to_string();

        match fs::metadata(target.path.as_std_path()) {
            Ok(meta) if meta.is_dir() => {
                return self.failed(FsFailureKind::IsADirectory, id, &name);
            }
            Ok(_) => {
                info!(%id, file = %name, "File of Comic id: {id} already exists with name: {name}");
                return StoreOutcome::AlreadyPresent(target);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return self.failed(FsFailureKind::from_io(&err), id, &name),
        }

        match self.write_new(&target.path, &payload.bytes) {
            Ok(()) => {
                self.downloaded.fetch_add(1, Ordering::SeqCst);
                info!(%id, file = %name, "Comic id: {id} has been saved with name: {name}");
                StoreOutcome::Written(target)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                info!(%id, file = %name, "File of Comic id: {id} already exists with name: {name}");
                StoreOutcome::AlreadyPresent(target)
            }
            Err(err) => self.failed(FsFailureKind::from_io(&err), id, &name),
        }
    }

    fn failed(&self, kind: FsFailureKind, id: CatalogId, name: &str) -> StoreOutcome {
        error!(
            %id,
            file = name,
            %kind,
            "{kind} when save file image for comic id: {id} with name: {name}"
        );
        StoreOutcome::Failed(kind)
    }

    // The final name is linked only after the bytes are synced, and never over an existing entry.
    fn write_new(&self, dest: &Utf8Path, bytes: &[u8]) -> io::Result<()> {
        let mut builder = Builder::new();
        builder.prefix(PARTIAL_PREFIX);
        // Same mode as a plain create, the umask still applies.
        #[cfg(unix)]
        builder.permissions(fs::Permissions::from_mode(0o666));
        let mut temp = builder.tempfile_in(self.root.as_std_path())?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist_noclobber(dest.as_std_path())
            .map_err(|err| err.error)?;
        Ok(())
    }

    /// Checks every entry of the directory against its content fingerprint.
    pub fn audit(&self) -> Result<AuditReport, HarvestError> {
        let pattern = Regex::new(STORED_NAME).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("read {}: {err}", self.root)))?;

        let mut report = AuditReport::default();
        let mut by_fingerprint = BTreeMap::<String, Vec<Utf8PathBuf>>::new();
        for entry in entries {
            let entry = entry.map_err(|err| HarvestError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|path| HarvestError::Filesystem(format!("non-utf8 path {}", path.display())))?;
            let Some(name) = path.file_name() else {
                continue;
            };
            if name.starts_with(PARTIAL_PREFIX) {
                continue;
            }
            if !path.as_std_path().is_file() {
                report.foreign.push(path);
                continue;
            }
            let Some(captures) = pattern.captures(name) else {
                report.foreign.push(path);
                continue;
            };
            let expected = captures[1].to_string();
            let bytes = fs::read(path.as_std_path())
                .map_err(|err| HarvestError::Filesystem(format!("read {path}: {err}")))?;
            report.files += 1;
            if Fingerprint::of(&bytes).as_str() != expected {
                report.mismatched.push(path.clone());
            }
            by_fingerprint.entry(expected).or_default().push(path);
        }

        report.duplicates = by_fingerprint
            .into_values()
            .filter(|paths| paths.len() > 1)
            .map(|mut paths| {
                paths.sort();
                paths
            })
            .collect();
        report.foreign.sort();
        report.mismatched.sort();
        Ok(report)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub files: usize,
    /// Entries that are not `{md5}.{ext}` regular files.
    pub foreign: Vec<Utf8PathBuf>,
    /// Files whose content no longer hashes to their name.
    pub mismatched: Vec<Utf8PathBuf>,
    /// Same content stored under more than one extension.
    pub duplicates: Vec<Vec<Utf8PathBuf>>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.foreign.is_empty() && self.mismatched.is_empty() && self.duplicates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8], extension: &str) -> AssetPayload {
        AssetPayload {
            bytes: bytes.to_vec(),
            content_type: format!("image/{extension}"),
            extension: extension.to_string(),
        }
    }

    #[test]
    fn open_creates_nested_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("a").join("comics")).unwrap();
        let store = ContentStore::open(root.clone()).unwrap();
        assert!(root.as_std_path().is_dir());
        assert_eq!(store.downloaded(), 0);
        ContentStore::open(root).unwrap();
    }

    #[test]
    fn open_fails_when_root_is_a_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("comics")).unwrap();
        fs::write(root.as_std_path(), b"not a dir").unwrap();
        let err = ContentStore::open(root).unwrap_err();
        assert!(matches!(err, HarvestError::StorageRoot { .. }));
    }

    #[test]
    fn no_partial_files_left_behind() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = ContentStore::open(root.clone()).unwrap();
        let id = CatalogId::new(1).unwrap();
        assert!(store.store(&payload(b"one", "png"), id));
        assert!(!store.store(&payload(b"one", "png"), id));

        let names = fs::read_dir(root.as_std_path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, vec![format!("{}.png", Fingerprint::of(b"one"))]);
    }
}
