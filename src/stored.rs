//! Stored fields of a segment.
//!
//! `_n.fdv` holds gzip blocks of msgpack encoded documents, 64 per block.
//! `_n.fdo` holds one big-endian u64 per document packing the file offset of
//! its block and its index inside the block.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::document::StoredDocument;
use crate::error::{Error, IoContext, Result};
use crate::segment::MappedFile;
use crate::DocId;

pub const OFFSETS_EXT: &str = "fdo";
pub const VALUES_EXT: &str = "fdv";

const BLOCK_SIZE: u64 = 64;

trait Offsets {
    fn new(file_offset: u64, block_offset: u64) -> Self;
    fn file_offset(&self) -> u64;
    fn block_offset(&self) -> u64;
}

impl Offsets for u64 {
    fn new(file_offset: u64, block_offset: u64) -> Self {
        (file_offset << 12) + block_offset
    }

    fn file_offset(&self) -> u64 {
        self >> 12
    }
    fn block_offset(&self) -> u64 {
        self & 0xFFF
    }
}

pub struct StoredWriter {
    offsets_path: PathBuf,
    values_path: PathBuf,
    offsets: BufWriter<File>,
    values_file: Option<File>,
    encoder: Option<GzEncoder<File>>,
    compression: Compression,
    file_offset: u64,
    block_offset: u64,
}

impl StoredWriter {
    pub fn create(dir: &Path, segment: &str, compression: u32) -> Result<StoredWriter> {
        let offsets_path = dir.join(format!("{}.{}", segment, OFFSETS_EXT));
        let values_path = dir.join(format!("{}.{}", segment, VALUES_EXT));
        let offsets = BufWriter::new(File::create(&offsets_path).at("create", &offsets_path)?);
        let values = File::create(&values_path).at("create", &values_path)?;
        Ok(StoredWriter {
            offsets_path,
            values_path,
            offsets,
            values_file: Some(values),
            encoder: None,
            compression: Compression::new(compression),
            file_offset: 0,
            block_offset: 0,
        })
    }

    pub fn add(&mut self, doc: &StoredDocument) -> Result<()> {
        if self.encoder.is_none() {
            let file = self
                .values_file
                .take()
                .ok_or_else(|| Error::InvalidArgument("stored writer finished".to_string()))?;
            self.encoder = Some(GzEncoder::new(file, self.compression));
        }
        self.offsets
            .write_u64::<BigEndian>(Offsets::new(self.file_offset, self.block_offset))
            .at("write", &self.offsets_path)?;
        if let Some(ref mut encoder) = self.encoder {
            rmp_serde::encode::write(encoder, doc)?;
        }
        self.block_offset += 1;
        if self.block_offset == BLOCK_SIZE {
            self.finish_block()?;
        }
        Ok(())
    }

    fn finish_block(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let mut file = encoder.finish().at("write", &self.values_path)?;
            self.file_offset = file.seek(SeekFrom::Current(0)).at("seek", &self.values_path)?;
            self.values_file = Some(file);
        }
        self.block_offset = 0;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.finish_block()?;
        if let Some(file) = self.values_file.take() {
            file.sync_all().at("sync", &self.values_path)?;
        }
        self.offsets.flush().at("flush", &self.offsets_path)?;
        Ok(())
    }
}

pub struct StoredReader {
    offsets: MappedFile,
    values: MappedFile,
    values_path: PathBuf,
    cache: Mutex<Option<(u64, Vec<StoredDocument>)>>,
}

impl StoredReader {
    pub fn open(dir: &Path, segment: &str) -> Result<StoredReader> {
        let values_path = dir.join(format!("{}.{}", segment, VALUES_EXT));
        Ok(StoredReader {
            offsets: MappedFile::open(&dir.join(format!("{}.{}", segment, OFFSETS_EXT)))?,
            values: MappedFile::open(&values_path)?,
            values_path,
            cache: Mutex::new(None),
        })
    }

    pub fn len(&self) -> u64 {
        (self.offsets.len() / 8) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn document(&self, ordinal: DocId) -> Result<StoredDocument> {
        if ordinal >= self.len() {
            return Err(Error::InvalidArgument(format!(
                "document {} out of range, segment has {}",
                ordinal,
                self.len()
            )));
        }
        let start = (ordinal * 8) as usize;
        let offsets = BigEndian::read_u64(&self.offsets[start..start + 8]);
        let block_start = offsets.file_offset();
        let index = offsets.block_offset() as usize;
        let mut cache = self.cache.lock();
        let cached = match *cache {
            Some((start, _)) => start == block_start,
            None => false,
        };
        if !cached {
            *cache = Some((block_start, self.read_block(block_start)?));
        }
        match *cache {
            Some((_, ref docs)) => docs.get(index).cloned().ok_or_else(|| {
                Error::corrupt(&self.values_path, format!("block too short for {}", ordinal))
            }),
            None => Err(Error::corrupt(&self.values_path, "missing block")),
        }
    }

    fn read_block(&self, block_start: u64) -> Result<Vec<StoredDocument>> {
        let data = self
            .values
            .get(block_start as usize..)
            .ok_or_else(|| Error::corrupt(&self.values_path, "block offset past end"))?;
        let mut deserializer = rmp_serde::Deserializer::new(GzDecoder::new(data));
        let mut docs = Vec::with_capacity(BLOCK_SIZE as usize);
        while docs.len() < BLOCK_SIZE as usize {
            match StoredDocument::deserialize(&mut deserializer) {
                Ok(doc) => docs.push(doc),
                Err(rmp_serde::decode::Error::InvalidMarkerRead(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(Error::corrupt(&self.values_path, e)),
            }
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldValue;
    use tempfile::TempDir;

    fn doc(i: usize) -> StoredDocument {
        StoredDocument {
            uri: format!("file:///{}", i),
            fields: vec![
                ("title".to_string(), FieldValue::Text(format!("doc {}", i))),
                ("size".to_string(), FieldValue::Number(i as i64)),
            ],
        }
    }

    #[test]
    fn reads_across_blocks() {
        let dir = TempDir::new().unwrap();
        let mut writer = StoredWriter::create(dir.path(), "_0", 6).unwrap();
        for i in 0..150 {
            writer.add(&doc(i)).unwrap();
        }
        writer.finish().unwrap();
        let reader = StoredReader::open(dir.path(), "_0").unwrap();
        assert_eq!(150, reader.len());
        for i in &[0, 63, 64, 149, 2, 128, 127] {
            assert_eq!(doc(*i), reader.document(*i as u64).unwrap());
        }
        assert!(reader.document(150).is_err());
    }

    #[test]
    fn full_last_block() {
        let dir = TempDir::new().unwrap();
        let mut writer = StoredWriter::create(dir.path(), "_1", 0).unwrap();
        for i in 0..64 {
            writer.add(&doc(i)).unwrap();
        }
        writer.finish().unwrap();
        let reader = StoredReader::open(dir.path(), "_1").unwrap();
        assert_eq!(doc(63), reader.document(63).unwrap());
    }
}
