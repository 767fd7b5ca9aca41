use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};
use parking_lot::RwLock;

use crate::directory::Directory;
use crate::document::StoredDocument;
use crate::error::{Error, Result};
use crate::generation::{Generation, SegmentEntry};
use crate::query::Term;
use crate::segment::SegmentReader;
use crate::DocId;

const OPEN_ATTEMPTS: usize = 10;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Where a document lives within one reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocAddress {
    /// Position of the segment in the generation.
    pub segment: usize,
    pub ordinal: DocId,
}

/// A point in time view of the index.
///
/// Clones share the view. Commits made after opening are only seen through
/// `reopen`. Closing releases the segments for every clone; hits that are
/// still being iterated then yield `Error::ReaderClosed`.
#[derive(Clone)]
pub struct IndexReader {
    inner: Arc<ReaderInner>,
}

struct ReaderInner {
    directory: Arc<Directory>,
    generation: Generation,
    segments: RwLock<Option<Vec<SegmentReader>>>,
}

impl IndexReader {
    pub fn open(directory: Arc<Directory>) -> Result<IndexReader> {
        IndexReader::open_reusing(directory, None)
    }

    /// Opening races with commits deleting the files of merged segments; a
    /// missing file means a newer generation exists, so start over.
    fn open_reusing(
        directory: Arc<Directory>,
        previous: Option<&[SegmentReader]>,
    ) -> Result<IndexReader> {
        let mut attempt = 1;
        loop {
            match IndexReader::try_open(&directory, previous) {
                Ok(reader) => return Ok(reader),
                Err(ref e) if e.is_not_found() && attempt < OPEN_ATTEMPTS => {
                    debug!("index changed while opening ({}), retrying", e);
                    attempt += 1;
                    thread::sleep(OPEN_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_open(
        directory: &Arc<Directory>,
        previous: Option<&[SegmentReader]>,
    ) -> Result<IndexReader> {
        let generation = Generation::read(directory.path())?;
        let mut segments = Vec::with_capacity(generation.segments.len());
        for entry in &generation.segments {
            let old = previous.and_then(|p| p.iter().find(|s| s.entry().name == entry.name));
            segments.push(match old {
                Some(old) if old.entry().del_gen == entry.del_gen => old.clone(),
                Some(old) => SegmentReader::with_core(old.core().clone(), entry)?,
                None => directory.open_segment(entry)?,
            });
        }
        debug!(
            "opened generation {} with {} segments",
            generation.version,
            segments.len()
        );
        Ok(IndexReader {
            inner: Arc::new(ReaderInner {
                directory: directory.clone(),
                generation,
                segments: RwLock::new(Some(segments)),
            }),
        })
    }

    /// A reader of the latest generation. Unchanged segments are shared with
    /// this reader; this reader stays usable.
    pub fn reopen(&self) -> Result<IndexReader> {
        let segments = self.inner.segments.read();
        if segments.is_some() && self.is_current()? {
            return Ok(self.clone());
        }
        IndexReader::open_reusing(self.inner.directory.clone(), segments.as_deref())
    }

    /// Whether no commit happened since this reader was opened.
    pub fn is_current(&self) -> Result<bool> {
        let latest = Generation::read(self.inner.directory.path())?;
        Ok(latest.version == self.inner.generation.version)
    }

    pub fn close(&self) {
        if let Some(segments) = self.inner.segments.write().take() {
            info!(
                "closed reader of generation {} ({} segments)",
                self.inner.generation.version,
                segments.len()
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.segments.read().is_none()
    }

    pub fn version(&self) -> u64 {
        self.inner.generation.version
    }

    pub fn generation(&self) -> &Generation {
        &self.inner.generation
    }

    pub fn segment_entries(&self) -> &[SegmentEntry] {
        &self.inner.generation.segments
    }

    /// Documents including deleted ones.
    pub fn max_doc(&self) -> u64 {
        self.inner.generation.doc_count()
    }

    pub fn num_docs(&self) -> Result<u64> {
        self.with_segments(|segments| Ok(segments.iter().map(|s| s.num_docs()).sum()))
    }

    /// Live documents containing `term`.
    pub fn doc_freq(&self, term: &Term) -> Result<u64> {
        self.with_segments(|segments| {
            let mut doc_freq = 0;
            for segment in segments {
                doc_freq += segment.live_doc_freq(&term.field, &term.text)?;
            }
            Ok(doc_freq)
        })
    }

    pub fn is_deleted(&self, address: DocAddress) -> Result<bool> {
        self.with_segments(|segments| match segments.get(address.segment) {
            Some(segment) if address.ordinal < segment.max_doc() => {
                Ok(segment.is_deleted(address.ordinal))
            }
            _ => Err(invalid_address(address)),
        })
    }

    pub fn document(&self, address: DocAddress) -> Result<StoredDocument> {
        self.with_segments(|segments| match segments.get(address.segment) {
            Some(segment) => segment.document(address.ordinal),
            None => Err(invalid_address(address)),
        })
    }

    /// Runs `f` on the open segments; blocks `close` meanwhile.
    pub fn with_segments<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&[SegmentReader]) -> Result<T>,
    {
        match *self.inner.segments.read() {
            Some(ref segments) => f(segments),
            None => Err(Error::ReaderClosed),
        }
    }
}

fn invalid_address(address: DocAddress) -> Error {
    Error::InvalidArgument(format!(
        "no document {} in segment {}",
        address.ordinal, address.segment
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::UAX29Analyzer;
    use crate::bit_vector::BitVector;
    use crate::document::Document;
    use crate::segment::write_segment;
    use crate::util::del_file_name;
    use std::path::Path;
    use tempfile::TempDir;

    fn add_segment(dir: &Path, generation: &mut Generation, uris: &[&str]) {
        let name = crate::util::segment_name(generation.counter);
        generation.counter += 1;
        let docs: Vec<Document> = uris.iter().map(|u| Document::new(*u).text("body", "hello")).collect();
        write_segment(dir, &name, &docs, &UAX29Analyzer, 6).unwrap();
        generation.segments.push(SegmentEntry {
            name,
            doc_count: uris.len() as u64,
            del_gen: 0,
        });
        generation.version += 1;
        generation.write(dir).unwrap();
    }

    #[test]
    fn sees_the_generation_it_was_opened_on() {
        let tmp = TempDir::new().unwrap();
        let dir = Arc::new(Directory::new(tmp.path()));
        let mut generation = Generation::default();
        add_segment(tmp.path(), &mut generation, &["a", "b"]);
        let reader = IndexReader::open(dir.clone()).unwrap();
        assert_eq!(2, reader.num_docs().unwrap());
        add_segment(tmp.path(), &mut generation, &["c"]);
        assert_eq!(2, reader.num_docs().unwrap());
        assert!(!reader.is_current().unwrap());
        let reopened = reader.reopen().unwrap();
        assert_eq!(3, reopened.num_docs().unwrap());
        assert_eq!(2, reader.num_docs().unwrap());
        assert_eq!(
            "c",
            reopened
                .document(DocAddress {
                    segment: 1,
                    ordinal: 0
                })
                .unwrap()
                .uri
        );
    }

    #[test]
    fn reopen_shares_cores_and_reloads_deletions() {
        let tmp = TempDir::new().unwrap();
        let dir = Arc::new(Directory::new(tmp.path()));
        let mut generation = Generation::default();
        add_segment(tmp.path(), &mut generation, &["a", "b"]);
        add_segment(tmp.path(), &mut generation, &["c"]);
        let reader = IndexReader::open(dir.clone()).unwrap();

        let mut live = BitVector::full(2);
        live.clear(1);
        live.write_file(&tmp.path().join(del_file_name("_0", 1))).unwrap();
        generation.segments[0].del_gen = 1;
        generation.version += 1;
        generation.write(tmp.path()).unwrap();

        let reopened = reader.reopen().unwrap();
        assert_eq!(2, reopened.num_docs().unwrap());
        reader
            .with_segments(|old| {
                reopened.with_segments(|new| {
                    assert!(Arc::ptr_eq(old[0].core(), new[0].core()));
                    assert!(Arc::ptr_eq(old[1].core(), new[1].core()));
                    assert!(!old[0].is_deleted(1));
                    assert!(new[0].is_deleted(1));
                    Ok(())
                })
            })
            .unwrap();
    }

    #[test]
    fn unchanged_reopen_is_same_view() {
        let tmp = TempDir::new().unwrap();
        let dir = Arc::new(Directory::new(tmp.path()));
        let mut generation = Generation::default();
        add_segment(tmp.path(), &mut generation, &["a"]);
        let reader = IndexReader::open(dir).unwrap();
        let again = reader.reopen().unwrap();
        assert_eq!(reader.version(), again.version());
        assert!(reader.is_current().unwrap());
    }

    #[test]
    fn closed_reader_refuses_access() {
        let tmp = TempDir::new().unwrap();
        let dir = Arc::new(Directory::new(tmp.path()));
        let mut generation = Generation::default();
        add_segment(tmp.path(), &mut generation, &["a"]);
        let reader = IndexReader::open(dir).unwrap();
        let clone = reader.clone();
        reader.close();
        assert!(clone.is_closed());
        match clone.document(DocAddress {
            segment: 0,
            ordinal: 0,
        }) {
            Err(Error::ReaderClosed) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_index_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let dir = Arc::new(Directory::new(tmp.path()));
        match IndexReader::open(dir) {
            Err(ref e) if e.is_not_found() => (),
            Err(e) => panic!("unexpected {}", e),
            Ok(_) => panic!("opened a missing index"),
        }
    }
}
