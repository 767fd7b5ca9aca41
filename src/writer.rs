//! Buffers document additions and deletions and commits them as a new
//! generation.
//!
//! A commit holds the write lock while it flushes, applies deletions and
//! merges, and additionally the commit lock while it replaces the
//! `segments` file. Until that replacement nothing a reader can see has
//! changed, so a failed commit only has to remove the files it created.

use std::fs;
use std::io;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::analysis::Analyzer;
use crate::bit_vector::BitVector;
use crate::config::IndexConfig;
use crate::directory::Directory;
use crate::document::{Document, URI_FIELD};
use crate::error::{Error, Result};
use crate::generation::{Generation, SegmentEntry};
use crate::lock::{index_lock, with_lock, Lock, COMMIT_LOCK_NAME, WRITE_LOCK_NAME};
use crate::query::Term;
use crate::reader::IndexReader;
use crate::segment::{merge_segments, remove_segment_files, write_segment, SegmentCore, SegmentReader};
use crate::util::{del_file_name, segment_name};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    /// Uncommitted additions or deletions exist.
    Buffering,
    /// A commit is running.
    Flushing,
}

pub struct IndexWriter {
    directory: Arc<Directory>,
    config: IndexConfig,
    analyzer: Box<dyn Analyzer>,
    write_lock: Box<dyn Lock>,
    commit_lock: Box<dyn Lock>,
    inner: Mutex<WriterInner>,
    status: Mutex<WriterState>,
    merging: AtomicBool,
}

struct WriterInner {
    buffer: Vec<Document>,
    pending_deletes: Vec<Term>,
    /// Committed segments with the deletions made since, loaded on the first
    /// deletion after a commit.
    view: Option<Vec<(SegmentReader, BitVector)>>,
}

/// A segment of the generation being built by a commit.
struct PendingSegment {
    entry: SegmentEntry,
    core: Arc<SegmentCore>,
    live: BitVector,
    dirty: bool,
}

impl PendingSegment {
    fn from_reader(reader: &SegmentReader) -> PendingSegment {
        PendingSegment {
            entry: reader.entry().clone(),
            core: reader.core().clone(),
            live: reader.live().clone(),
            dirty: false,
        }
    }

    fn fresh(core: Arc<SegmentCore>) -> PendingSegment {
        let doc_count = core.doc_count();
        PendingSegment {
            entry: SegmentEntry {
                name: core.name().to_string(),
                doc_count,
                del_gen: 0,
            },
            core,
            live: BitVector::full(doc_count as usize),
            dirty: false,
        }
    }
}

impl IndexWriter {
    pub fn new(directory: Arc<Directory>, config: IndexConfig, analyzer: Box<dyn Analyzer>) -> IndexWriter {
        let poll = config.lock_poll_interval();
        let write_lock = index_lock(directory.path(), WRITE_LOCK_NAME, config.disable_locks, poll);
        let commit_lock = index_lock(directory.path(), COMMIT_LOCK_NAME, config.disable_locks, poll);
        IndexWriter {
            directory,
            config,
            analyzer,
            write_lock,
            commit_lock,
            inner: Mutex::new(WriterInner {
                buffer: Vec::new(),
                pending_deletes: Vec::new(),
                view: None,
            }),
            status: Mutex::new(WriterState::Idle),
            merging: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn state(&self) -> WriterState {
        *self.status.lock()
    }

    pub fn is_merging(&self) -> bool {
        self.merging.load(Ordering::SeqCst)
    }

    pub fn buffered_docs(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn has_uncommitted_changes(&self) -> bool {
        let inner = self.inner.lock();
        !inner.buffer.is_empty() || !inner.pending_deletes.is_empty()
    }

    fn set_status(&self, state: WriterState) {
        *self.status.lock() = state;
    }

    /// Buffers `doc`. With auto commit on, a full buffer is committed right
    /// away and a failing commit is reported here.
    pub fn add_document(&self, doc: Document) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.buffer.push(doc);
        self.set_status(WriterState::Buffering);
        if self.config.auto_commit && inner.buffer.len() >= self.config.max_buffered_docs {
            debug!("buffer full with {} documents", inner.buffer.len());
            self.commit_locked(&mut inner, false)?;
        }
        Ok(())
    }

    pub fn delete_document(&self, uri: &str) -> Result<u64> {
        self.delete_documents(Term::new(URI_FIELD, uri))
    }

    /// Deletes every document containing `term`, buffered or committed.
    /// Returns how many documents were visible with the term. Committed
    /// documents stay visible to readers until the next commit.
    pub fn delete_documents(&self, term: Term) -> Result<u64> {
        let mut inner = self.inner.lock();
        let before = inner.buffer.len();
        let analyzer = &*self.analyzer;
        inner.buffer.retain(|doc| !doc.contains_term(&term, analyzer));
        let mut deleted = (before - inner.buffer.len()) as u64;

        if inner.view.is_none() {
            inner.view = Some(self.load_view()?);
        }
        if let Some(ref mut view) = inner.view {
            for (segment, live) in view.iter_mut() {
                if let Some(mut postings) = segment.term_docs(&term.field, &term.text)? {
                    while let Some(doc) = postings.next_doc()? {
                        if live.get(doc as usize) {
                            live.clear(doc as usize);
                            deleted += 1;
                        }
                    }
                }
            }
        }
        debug!("deleted {} documents matching {}", deleted, term);
        inner.pending_deletes.push(term);
        self.set_status(WriterState::Buffering);
        Ok(deleted)
    }

    fn load_view(&self) -> Result<Vec<(SegmentReader, BitVector)>> {
        let reader = IndexReader::open(self.directory.clone())?;
        reader.with_segments(|segments| {
            Ok(segments
                .iter()
                .map(|s| (s.clone(), s.live().clone()))
                .collect())
        })
    }

    /// Live documents as they will be after the next commit.
    pub fn num_docs(&self) -> Result<u64> {
        let inner = self.inner.lock();
        let committed = match inner.view {
            Some(ref view) => view.iter().map(|(_, live)| live.count() as u64).sum(),
            None => IndexReader::open(self.directory.clone())?.num_docs()?,
        };
        Ok(committed + inner.buffer.len() as u64)
    }

    /// Makes buffered additions and deletions visible to new readers. A
    /// no-op without changes.
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.commit_locked(&mut inner, false)
    }

    /// Commits and merges the whole index into one segment without deleted
    /// documents.
    pub fn force_merge(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.commit_locked(&mut inner, true)
    }

    /// Commits pending changes and consumes the writer.
    pub fn close(self) -> Result<()> {
        self.commit()
    }

    fn commit_locked(&self, inner: &mut WriterInner, force_merge: bool) -> Result<()> {
        if inner.buffer.is_empty() && inner.pending_deletes.is_empty() && !force_merge {
            debug!("nothing to commit");
            return Ok(());
        }
        self.set_status(WriterState::Flushing);
        let result = with_lock(&*self.write_lock, self.config.write_lock_timeout(), || {
            let mut created = Vec::new();
            let result = self.write_generation(inner, force_merge, &mut created);
            match result {
                Ok(generation) => {
                    if let Err(e) = self.directory.delete_unreferenced(&generation) {
                        warn!("could not delete unreferenced files: {}", e);
                    }
                    Ok(generation)
                }
                Err(e) => {
                    self.remove_created(&created);
                    Err(e)
                }
            }
        });
        self.merging.store(false, Ordering::SeqCst);
        match result {
            Ok(generation) => {
                info!(
                    "committed generation {} with {} segments and {} documents",
                    generation.version,
                    generation.segments.len(),
                    generation.doc_count()
                );
                inner.buffer.clear();
                inner.pending_deletes.clear();
                inner.view = None;
                self.set_status(WriterState::Idle);
                Ok(())
            }
            Err(e) => {
                warn!("commit failed: {}", e);
                self.set_status(WriterState::Buffering);
                Err(Error::commit_failure(e))
            }
        }
    }

    /// Everything a commit writes; called with the write lock held.
    fn write_generation(
        &self,
        inner: &WriterInner,
        force_merge: bool,
        created: &mut Vec<String>,
    ) -> Result<Generation> {
        let dir = self.directory.path();
        let mut generation = Generation::read(dir)?;
        let mut segments = Vec::with_capacity(generation.segments.len() + 1);
        for entry in &generation.segments {
            segments.push(PendingSegment::from_reader(&self.directory.open_segment(entry)?));
        }

        for term in &inner.pending_deletes {
            for segment in segments.iter_mut() {
                if let Some(mut postings) = segment.core.term_docs(&term.field, &term.text)? {
                    while let Some(doc) = postings.next_doc()? {
                        if segment.live.get(doc as usize) {
                            segment.live.clear(doc as usize);
                            segment.dirty = true;
                        }
                    }
                }
            }
        }
        let before = segments.len();
        segments.retain(|s| s.live.count() > 0);
        if segments.len() < before {
            debug!("dropping {} fully deleted segments", before - segments.len());
        }

        if !inner.buffer.is_empty() {
            let name = segment_name(generation.counter);
            generation.counter += 1;
            created.push(name.clone());
            write_segment(
                dir,
                &name,
                &inner.buffer,
                &*self.analyzer,
                self.config.stored_compression,
            )?;
            info!("flushed {} documents to segment {}", inner.buffer.len(), name);
            segments.push(PendingSegment::fresh(self.directory.open_core(&name)?));
        }

        let needs_force = segments.len() > 1 || segments.iter().any(|s| s.live.count() < s.live.len());
        if force_merge && needs_force {
            let all = 0..segments.len();
            self.merge(&mut generation, &mut segments, all, created)?;
        } else if self.config.auto_merge {
            loop {
                let counts: Vec<u64> = segments.iter().map(|s| s.entry.doc_count).collect();
                match find_merge(&counts, self.config.merge_factor, self.config.max_merge_docs) {
                    Some(range) => self.merge(&mut generation, &mut segments, range, created)?,
                    None => break,
                }
            }
        }

        for segment in segments.iter_mut().filter(|s| s.dirty) {
            segment.entry.del_gen += 1;
            let file = del_file_name(&segment.entry.name, segment.entry.del_gen);
            created.push(file.clone());
            segment.live.write_file(&dir.join(&file))?;
        }

        generation.segments = segments.iter().map(|s| s.entry.clone()).collect();
        generation.version += 1;
        with_lock(&*self.commit_lock, self.config.commit_lock_timeout(), || {
            generation.write(dir)
        })?;
        Ok(generation)
    }

    fn merge(
        &self,
        generation: &mut Generation,
        segments: &mut Vec<PendingSegment>,
        range: Range<usize>,
        created: &mut Vec<String>,
    ) -> Result<()> {
        self.merging.store(true, Ordering::SeqCst);
        let name = segment_name(generation.counter);
        generation.counter += 1;
        created.push(name.clone());
        let live_docs: usize = segments[range.clone()].iter().map(|s| s.live.count()).sum();
        info!("Merging {} segments with {} docs.", range.len(), live_docs);
        {
            let sources: Vec<(&SegmentCore, &BitVector)> = segments[range.clone()]
                .iter()
                .map(|s| (&*s.core, &s.live))
                .collect();
            merge_segments(self.directory.path(), &name, &sources, self.config.stored_compression)?;
        }
        let merged = PendingSegment::fresh(self.directory.open_core(&name)?);
        segments.splice(range, std::iter::once(merged));
        Ok(())
    }

    fn remove_created(&self, created: &[String]) {
        let dir = self.directory.path();
        for name in created {
            let removed = if name.ends_with(".del") {
                match fs::remove_file(dir.join(name)) {
                    Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    other => other.map_err(Error::from),
                }
            } else {
                remove_segment_files(dir, name)
            };
            if let Err(e) = removed {
                warn!("could not remove {} after failed commit: {}", name, e);
            }
        }
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        if !inner.buffer.is_empty() || !inner.pending_deletes.is_empty() {
            warn!(
                "index writer dropped with {} documents and {} deletions uncommitted",
                inner.buffer.len(),
                inner.pending_deletes.len()
            );
        }
    }
}

/// Picks the next run of segments to merge.
///
/// For targets `merge_factor`, `merge_factor^2`, ... up to
/// `max_merge_docs`, the run of trailing segments smaller than the target is
/// merged once it holds at least two segments and `target` documents.
pub fn find_merge(counts: &[u64], merge_factor: usize, max_merge_docs: u64) -> Option<Range<usize>> {
    let factor = merge_factor.max(2) as u64;
    let mut target = factor;
    while target <= max_merge_docs {
        let mut start = counts.len();
        let mut docs = 0;
        while start > 0 && counts[start - 1] < target {
            start -= 1;
            docs += counts[start];
        }
        if counts.len() - start >= 2 && docs >= target {
            return Some(start..counts.len());
        }
        match target.checked_mul(factor) {
            Some(next) => target = next,
            None => break,
        }
    }
    None
}
