use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::error::Result;
use crate::generation::{read_deletable, write_deletable, Generation, SegmentEntry};
use crate::segment::{SegmentCore, SegmentReader};
use crate::util::parse_segment_file;

/// An index directory plus the segment cores open in this process.
///
/// Cores are shared by name, so readers of different generations and the
/// writer map each segment once. A segment that leaves the index while a
/// core is still alive is removed when the last reference drops.
pub struct Directory {
    path: PathBuf,
    cores: Mutex<HashMap<String, Weak<SegmentCore>>>,
}

impl Directory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Directory {
        Directory {
            path: path.into(),
            cores: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open_core(&self, name: &str) -> Result<Arc<SegmentCore>> {
        let mut cores = self.cores.lock();
        if let Some(core) = cores.get(name).and_then(Weak::upgrade) {
            return Ok(core);
        }
        let core = Arc::new(SegmentCore::open(&self.path, name)?);
        cores.retain(|_, weak| weak.strong_count() > 0);
        cores.insert(name.to_string(), Arc::downgrade(&core));
        Ok(core)
    }

    pub fn open_segment(&self, entry: &SegmentEntry) -> Result<SegmentReader> {
        SegmentReader::with_core(self.open_core(&entry.name)?, entry)
    }

    fn live_core(&self, name: &str) -> Option<Arc<SegmentCore>> {
        self.cores.lock().get(name).and_then(Weak::upgrade)
    }

    pub fn is_in_use(&self, name: &str) -> bool {
        self.live_core(name).is_some()
    }

    /// File names in the directory, sorted.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if entry.file_type().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Removes segment files `generation` no longer references. Files of
    /// segments still open in this process are removed once released; files
    /// that cannot be removed are recorded in `deletable` and retried.
    pub fn delete_unreferenced(&self, generation: &Generation) -> Result<()> {
        let mut failed = Vec::new();
        for name in read_deletable(&self.path)? {
            if let Some(name) = self.try_remove(&name) {
                failed.push(name);
            }
        }
        let mut deferred = 0;
        for file_name in self.list_files()? {
            let (segment, del_gen) = match parse_segment_file(&file_name) {
                Some(parsed) => parsed,
                None => continue,
            };
            let referenced = match generation.entry(segment) {
                Some(entry) => del_gen.map(|g| g == entry.del_gen).unwrap_or(true),
                None => false,
            };
            if referenced {
                continue;
            }
            if del_gen.is_none() {
                if let Some(core) = self.live_core(segment) {
                    core.mark_for_deletion();
                    deferred += 1;
                    continue;
                }
            }
            if let Some(name) = self.try_remove(&file_name) {
                if !failed.contains(&name) {
                    failed.push(name);
                }
            }
        }
        if deferred > 0 {
            debug!("deferred deletion of {} files still in use", deferred);
        }
        if !failed.is_empty() {
            info!("{} files could not be deleted, will retry", failed.len());
        }
        write_deletable(&self.path, &failed)
    }

    /// Returns the name back when the file could not be removed.
    fn try_remove(&self, name: &str) -> Option<String> {
        match fs::remove_file(self.path.join(name)) {
            Ok(()) => None,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("could not delete {}: {}", name, e);
                Some(name.to_string())
            }
        }
    }
}
