//! The `segments` file: the ordered list of live segments of the index.
//!
//! Written to `segments.new` and renamed over `segments`, so readers see
//! either the old or the new generation.

use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoContext, Result};

pub const SEGMENTS_FILE: &str = "segments";
pub const SEGMENTS_NEW_FILE: &str = "segments.new";
pub const DELETABLE_FILE: &str = "deletable";
pub const GENERATION_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SegmentEntry {
    pub name: String,
    pub doc_count: u64,
    pub del_gen: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub format: u32,
    /// Incremented on every successful commit.
    pub version: u64,
    /// Next segment name counter.
    pub counter: u64,
    pub segments: Vec<SegmentEntry>,
}

impl Default for Generation {
    fn default() -> Generation {
        Generation {
            format: GENERATION_FORMAT,
            version: 0,
            counter: 0,
            segments: Vec::new(),
        }
    }
}

impl Generation {
    pub fn read(dir: &Path) -> Result<Generation> {
        let path = dir.join(SEGMENTS_FILE);
        let file = File::open(&path).at("open", &path)?;
        let generation: Generation =
            rmp_serde::from_read(file).map_err(|e| Error::corrupt(&path, e))?;
        if generation.format != GENERATION_FORMAT {
            return Err(Error::corrupt(
                &path,
                format!("unknown generation format {}", generation.format),
            ));
        }
        Ok(generation)
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let tmp = dir.join(SEGMENTS_NEW_FILE);
        {
            let mut file = BufWriter::new(File::create(&tmp).at("create", &tmp)?);
            rmp_serde::encode::write(&mut file, self)?;
            file.flush().at("flush", &tmp)?;
            file.get_ref().sync_all().at("sync", &tmp)?;
        }
        let path = dir.join(SEGMENTS_FILE);
        fs::rename(&tmp, &path).at("rename", &path)
    }

    pub fn doc_count(&self) -> u64 {
        self.segments.iter().map(|s| s.doc_count).sum()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.segments.iter().any(|s| s.name == name)
    }

    pub fn entry(&self, name: &str) -> Option<&SegmentEntry> {
        self.segments.iter().find(|s| s.name == name)
    }
}

/// Files whose removal failed, retried on the next commit.
pub fn read_deletable(dir: &Path) -> Result<Vec<String>> {
    let path = dir.join(DELETABLE_FILE);
    match File::open(&path) {
        Ok(file) => rmp_serde::from_read(file).map_err(|e| Error::corrupt(&path, e)),
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).at("open", &path),
    }
}

pub fn write_deletable(dir: &Path, files: &[String]) -> Result<()> {
    let path = dir.join(DELETABLE_FILE);
    if files.is_empty() {
        return match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).at("remove", &path),
        };
    }
    let tmp = dir.join(format!("{}.new", DELETABLE_FILE));
    {
        let mut file = BufWriter::new(File::create(&tmp).at("create", &tmp)?);
        rmp_serde::encode::write(&mut file, &files)?;
        file.flush().at("flush", &tmp)?;
    }
    fs::rename(&tmp, &path).at("rename", &path)
}
