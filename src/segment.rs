use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use fst::map::OpBuilder;
use fst::Streamer;
use log::{debug, warn};
use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::Analyzer;
use crate::bit_vector::BitVector;
use crate::document::{Document, FieldKind, StoredDocument, URI_FIELD};
use crate::error::{Error, IoContext, Result};
use crate::generation::SegmentEntry;
use crate::postings::{write_field, FieldIndex, FieldWriter, PostingsIter, TermPostings};
use crate::stored::{StoredReader, StoredWriter};
use crate::util::{del_file_name, parse_segment_file};
use crate::DocId;

pub const SEGMENT_FORMAT: u32 = 1;
pub const META_EXT: &str = "seg";
pub const NORMS_EXT: &str = "nrm";

/// A read-only memory map. Empty files cannot be mapped and read as an
/// empty slice.
pub enum MappedFile {
    Mapped(Mmap),
    Empty,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<MappedFile> {
        let file = File::open(path).at("open", path)?;
        let len = file.metadata().at("stat", path)?.len();
        if len == 0 {
            return Ok(MappedFile::Empty);
        }
        let mmap = unsafe { Mmap::map(&file) }.at("mmap", path)?;
        Ok(MappedFile::Mapped(mmap))
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            MappedFile::Mapped(ref mmap) => &mmap[..],
            MappedFile::Empty => &[],
        }
    }
}

impl AsRef<[u8]> for MappedFile {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub has_terms: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SegmentMeta {
    pub format: u32,
    pub doc_count: u64,
    pub fields: Vec<FieldInfo>,
}

fn meta_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, META_EXT))
}

fn norms_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, NORMS_EXT))
}

impl SegmentMeta {
    pub fn read(dir: &Path, name: &str) -> Result<SegmentMeta> {
        let path = meta_path(dir, name);
        let file = File::open(&path).at("open", &path)?;
        let meta: SegmentMeta =
            rmp_serde::from_read(file).map_err(|e| Error::corrupt(&path, e))?;
        if meta.format != SEGMENT_FORMAT {
            return Err(Error::corrupt(
                &path,
                format!("unknown segment format {}", meta.format),
            ));
        }
        Ok(meta)
    }

    fn write(&self, dir: &Path, name: &str) -> Result<()> {
        let path = meta_path(dir, name);
        let mut file = BufWriter::new(File::create(&path).at("create", &path)?);
        rmp_serde::encode::write(&mut file, self)?;
        file.flush().at("flush", &path)?;
        file.get_ref().sync_all().at("sync", &path)
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Field lengths, one big-endian u32 per (field, document), fields in the
/// order of the field infos.
struct Norms {
    data: MappedFile,
    doc_count: usize,
}

impl Norms {
    fn length(&self, slot: usize, ordinal: DocId) -> u32 {
        let start = (slot * self.doc_count + ordinal as usize) * 4;
        match self.data.get(start..start + 4) {
            Some(bytes) => BigEndian::read_u32(bytes),
            None => 0,
        }
    }
}

/// Length norms of one field, handed to scorers.
#[derive(Clone, Copy)]
pub struct FieldNorms<'a> {
    norms: &'a [u8],
    base: usize,
}

impl<'a> FieldNorms<'a> {
    pub fn length(&self, ordinal: DocId) -> u32 {
        let start = self.base + ordinal as usize * 4;
        match self.norms.get(start..start + 4) {
            Some(bytes) => BigEndian::read_u32(bytes),
            None => 0,
        }
    }
}

/// The immutable part of a segment. Shared between readers; files are
/// removed on drop once the segment left the index.
pub struct SegmentCore {
    name: String,
    dir: PathBuf,
    meta: SegmentMeta,
    fields: HashMap<String, FieldIndex>,
    norms: Norms,
    stored: StoredReader,
    delete_on_drop: AtomicBool,
}

impl SegmentCore {
    pub fn open(dir: &Path, name: &str) -> Result<SegmentCore> {
        let meta = SegmentMeta::read(dir, name)?;
        let mut fields = HashMap::new();
        for info in meta.fields.iter().filter(|f| f.has_terms) {
            let field = FieldIndex::open(dir, name, info.number, meta.doc_count)?;
            fields.insert(info.name.clone(), field);
        }
        let norms_file = norms_path(dir, name);
        let norms = MappedFile::open(&norms_file)?;
        if norms.len() as u64 != meta.fields.len() as u64 * meta.doc_count * 4 {
            return Err(Error::corrupt(&norms_file, "norms size does not match doc count"));
        }
        let stored = StoredReader::open(dir, name)?;
        if stored.len() != meta.doc_count {
            return Err(Error::corrupt(
                meta_path(dir, name),
                format!("{} stored documents, expected {}", stored.len(), meta.doc_count),
            ));
        }
        Ok(SegmentCore {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            norms: Norms {
                data: norms,
                doc_count: meta.doc_count as usize,
            },
            meta,
            fields,
            stored,
            delete_on_drop: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc_count(&self) -> u64 {
        self.meta.doc_count
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.meta.field(field).map(|f| f.kind)
    }

    pub fn field(&self, field: &str) -> Option<&FieldIndex> {
        self.fields.get(field)
    }

    pub fn term_docs(&self, field: &str, token: &str) -> Result<Option<PostingsIter>> {
        match self.fields.get(field) {
            Some(index) => index.postings(token),
            None => Ok(None),
        }
    }

    pub fn doc_freq(&self, field: &str, token: &str) -> Result<u64> {
        match self.fields.get(field) {
            Some(index) => index.doc_freq(token),
            None => Ok(0),
        }
    }

    pub fn norms(&self, field: &str) -> Option<FieldNorms> {
        let slot = self.meta.fields.iter().position(|f| f.name == field)?;
        Some(FieldNorms {
            norms: &self.norms.data,
            base: slot * self.norms.doc_count * 4,
        })
    }

    pub fn field_length(&self, field: &str, ordinal: DocId) -> u32 {
        match self.meta.fields.iter().position(|f| f.name == field) {
            Some(slot) => self.norms.length(slot, ordinal),
            None => 0,
        }
    }

    pub fn document(&self, ordinal: DocId) -> Result<StoredDocument> {
        self.stored.document(ordinal)
    }

    /// Live bits for a deletion generation; generation 0 has no deletions.
    pub fn read_live(&self, del_gen: u64) -> Result<BitVector> {
        if del_gen == 0 {
            return Ok(BitVector::full(self.meta.doc_count as usize));
        }
        let path = self.dir.join(del_file_name(&self.name, del_gen));
        let live = BitVector::read_file(&path)?;
        if live.len() as u64 != self.meta.doc_count {
            return Err(Error::corrupt(
                &path,
                format!("{} bits for {} documents", live.len(), self.meta.doc_count),
            ));
        }
        Ok(live)
    }

    pub fn mark_for_deletion(&self) {
        self.delete_on_drop.store(true, Ordering::SeqCst);
    }
}

impl Drop for SegmentCore {
    fn drop(&mut self) {
        if self.delete_on_drop.load(Ordering::SeqCst) {
            debug!("removing files of released segment {}", self.name);
            if let Err(e) = remove_segment_files(&self.dir, &self.name) {
                warn!("could not remove files of segment {}: {}", self.name, e);
            }
        }
    }
}

/// Removes every file of a segment, deletion files included.
pub fn remove_segment_files(dir: &Path, name: &str) -> Result<()> {
    let entries = fs::read_dir(dir).at("list", dir)?;
    let mut first_error = None;
    for entry in entries {
        let entry = entry.at("list", dir)?;
        let file_name = entry.file_name();
        let belongs = file_name
            .to_str()
            .and_then(parse_segment_file)
            .map(|(segment, _)| segment == name)
            .unwrap_or(false);
        if belongs {
            if let Err(e) = fs::remove_file(entry.path()) {
                if e.kind() != std::io::ErrorKind::NotFound && first_error.is_none() {
                    first_error = Some(Error::Io {
                        op: "remove",
                        path: Some(entry.path()),
                        source: e,
                    });
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// A segment as seen by one reader: the shared core plus the live bits of a
/// deletion generation.
#[derive(Clone)]
pub struct SegmentReader {
    core: Arc<SegmentCore>,
    live: Arc<BitVector>,
    entry: SegmentEntry,
}

impl SegmentReader {
    pub fn open(dir: &Path, entry: &SegmentEntry) -> Result<SegmentReader> {
        let core = Arc::new(SegmentCore::open(dir, &entry.name)?);
        SegmentReader::with_core(core, entry)
    }

    pub fn with_core(core: Arc<SegmentCore>, entry: &SegmentEntry) -> Result<SegmentReader> {
        let live = Arc::new(core.read_live(entry.del_gen)?);
        Ok(SegmentReader {
            core,
            live,
            entry: entry.clone(),
        })
    }

    pub fn core(&self) -> &Arc<SegmentCore> {
        &self.core
    }

    pub fn entry(&self) -> &SegmentEntry {
        &self.entry
    }

    pub fn live(&self) -> &BitVector {
        &self.live
    }

    pub fn max_doc(&self) -> u64 {
        self.core.doc_count()
    }

    pub fn num_docs(&self) -> u64 {
        self.live.count() as u64
    }

    pub fn is_deleted(&self, ordinal: DocId) -> bool {
        !self.live.get(ordinal as usize)
    }

    pub fn term_docs(&self, field: &str, token: &str) -> Result<Option<PostingsIter>> {
        self.core.term_docs(field, token)
    }

    /// Number of live documents containing the token.
    pub fn live_doc_freq(&self, field: &str, token: &str) -> Result<u64> {
        let mut postings = match self.core.term_docs(field, token)? {
            Some(postings) => postings,
            None => return Ok(0),
        };
        if self.live.count() as u64 == self.max_doc() {
            return Ok(postings.doc_freq());
        }
        let mut count = 0;
        while let Some(doc) = postings.next_doc()? {
            if !self.is_deleted(doc) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn document(&self, ordinal: DocId) -> Result<StoredDocument> {
        self.core.document(ordinal)
    }
}

struct FieldBuild {
    info: FieldInfo,
    terms: BTreeMap<String, TermPostings>,
    lengths: Vec<u32>,
}

fn field_slot(fields: &mut Vec<FieldBuild>, name: &str, kind: FieldKind, doc_count: usize) -> usize {
    match fields.iter().position(|f| f.info.name == name) {
        Some(slot) => slot,
        None => {
            fields.push(FieldBuild {
                info: FieldInfo {
                    name: name.to_string(),
                    number: fields.len() as u32,
                    kind,
                    has_terms: false,
                },
                terms: BTreeMap::new(),
                lengths: vec![0; doc_count],
            });
            fields.len() - 1
        }
    }
}

fn add_token(build: &mut FieldBuild, token: &str, doc: DocId, pos: u32) {
    let postings = build.terms.entry(token.to_string()).or_insert_with(Vec::new);
    match postings.last_mut() {
        Some((last, positions)) if *last == doc => positions.push(pos),
        _ => postings.push((doc, vec![pos])),
    }
}

/// Inverts `docs` into a new segment `name`. Ordinals follow the order of
/// `docs`. The meta file is written last.
pub fn write_segment(
    dir: &Path,
    name: &str,
    docs: &[Document],
    analyzer: &dyn Analyzer,
    compression: u32,
) -> Result<SegmentMeta> {
    let mut fields: Vec<FieldBuild> = Vec::new();
    let uri_slot = field_slot(&mut fields, URI_FIELD, FieldKind::Keyword, docs.len());
    for (ordinal, doc) in docs.iter().enumerate() {
        let ordinal = ordinal as DocId;
        add_token(&mut fields[uri_slot], doc.uri(), ordinal, 0);
        fields[uri_slot].lengths[ordinal as usize] = 1;
        for field in doc.fields().iter().filter(|f| f.kind.is_indexed()) {
            if field.name == URI_FIELD {
                continue;
            }
            let slot = field_slot(&mut fields, &field.name, field.kind, docs.len());
            let build = &mut fields[slot];
            let mut pos = build.lengths[ordinal as usize];
            for token in field.tokens(analyzer) {
                add_token(build, &token, ordinal, pos);
                pos += 1;
            }
            build.lengths[ordinal as usize] = pos;
        }
    }
    for build in fields.iter_mut() {
        build.info.has_terms = !build.terms.is_empty();
    }

    fields
        .par_iter()
        .filter(|f| f.info.has_terms)
        .try_for_each(|f| write_field(dir, name, f.info.number, &f.terms).map(|_| ()))?;

    let norms_file = norms_path(dir, name);
    let mut norms = BufWriter::new(File::create(&norms_file).at("create", &norms_file)?);
    for build in &fields {
        for length in &build.lengths {
            norms.write_u32::<BigEndian>(*length).at("write", &norms_file)?;
        }
    }
    norms.flush().at("flush", &norms_file)?;

    let mut stored = StoredWriter::create(dir, name, compression)?;
    for doc in docs {
        stored.add(&doc.to_stored())?;
    }
    stored.finish()?;

    let meta = SegmentMeta {
        format: SEGMENT_FORMAT,
        doc_count: docs.len() as u64,
        fields: fields.into_iter().map(|f| f.info).collect(),
    };
    meta.write(dir, name)?;
    debug!("wrote segment {} with {} docs", name, meta.doc_count);
    Ok(meta)
}

/// Maps the ordinals of one merge source into the merged segment; deleted
/// documents map to `None`.
fn doc_map(live: &BitVector, base: DocId) -> Vec<Option<DocId>> {
    let mut next = base;
    (0..live.len())
        .map(|i| {
            if live.get(i) {
                next += 1;
                Some(next - 1)
            } else {
                None
            }
        })
        .collect()
}

/// Merges `sources` in order into segment `name`, dropping deleted
/// documents. Terms left without postings are dropped.
pub fn merge_segments(
    dir: &Path,
    name: &str,
    sources: &[(&SegmentCore, &BitVector)],
    compression: u32,
) -> Result<SegmentMeta> {
    let mut doc_maps = Vec::with_capacity(sources.len());
    let mut bases = Vec::with_capacity(sources.len());
    let mut doc_count = 0u64;
    for (_, live) in sources {
        doc_maps.push(doc_map(live, doc_count));
        bases.push(doc_count);
        doc_count += live.count() as u64;
    }

    let mut infos: Vec<FieldInfo> = Vec::new();
    for (core, _) in sources {
        for info in &core.meta().fields {
            if infos.iter().all(|f| f.name != info.name) {
                infos.push(FieldInfo {
                    name: info.name.clone(),
                    number: infos.len() as u32,
                    kind: info.kind,
                    has_terms: false,
                });
            }
        }
    }

    let written: Vec<bool> = infos
        .par_iter()
        .map(|info| merge_field(dir, name, info, sources, &doc_maps))
        .collect::<Result<Vec<bool>>>()?;
    for (info, has_terms) in infos.iter_mut().zip(written) {
        info.has_terms = has_terms;
    }

    let norms_file = norms_path(dir, name);
    let mut norms = BufWriter::new(File::create(&norms_file).at("create", &norms_file)?);
    for info in &infos {
        for (core, live) in sources {
            for ordinal in 0..live.len() {
                if live.get(ordinal) {
                    let length = core.field_length(&info.name, ordinal as DocId);
                    norms.write_u32::<BigEndian>(length).at("write", &norms_file)?;
                }
            }
        }
    }
    norms.flush().at("flush", &norms_file)?;

    let mut stored = StoredWriter::create(dir, name, compression)?;
    for (core, live) in sources {
        for ordinal in 0..live.len() {
            if live.get(ordinal) {
                stored.add(&core.document(ordinal as DocId)?)?;
            }
        }
    }
    stored.finish()?;

    let meta = SegmentMeta {
        format: SEGMENT_FORMAT,
        doc_count,
        fields: infos,
    };
    meta.write(dir, name)?;
    Ok(meta)
}

/// k-way merge of one field's dictionaries. Returns whether any term was
/// written.
fn merge_field(
    dir: &Path,
    name: &str,
    info: &FieldInfo,
    sources: &[(&SegmentCore, &BitVector)],
    doc_maps: &[Vec<Option<DocId>>],
) -> Result<bool> {
    let inputs: Vec<(usize, &FieldIndex)> = sources
        .iter()
        .enumerate()
        .filter_map(|(i, (core, _))| core.field(&info.name).map(|f| (i, f)))
        .collect();
    if inputs.is_empty() {
        return Ok(false);
    }
    let mut op = OpBuilder::new();
    for (_, field) in &inputs {
        op.push(field.map().stream());
    }
    let mut union = op.union();
    let mut writer = FieldWriter::create(dir, name, info.number)?;
    let mut any = false;
    let mut merged: Vec<(DocId, Vec<u32>)> = Vec::new();
    while let Some((token, offsets)) = union.next() {
        let mut offsets = offsets.to_vec();
        offsets.sort_by_key(|o| o.index);
        merged.clear();
        for offset in &offsets {
            let (source, field) = inputs[offset.index];
            let mut postings = field.postings_for_offset(offset.value)?;
            while let Some(doc) = postings.next_doc()? {
                if let Some(new_doc) = doc_maps[source][doc as usize] {
                    merged.push((new_doc, postings.positions()?));
                }
            }
        }
        if merged.is_empty() {
            continue;
        }
        writer.add_term(token, merged.iter().map(|(d, p)| (*d, p.as_slice())))?;
        any = true;
    }
    writer.finish()?;
    if !any {
        for ext in &[
            crate::postings::TERMS_EXT,
            crate::postings::FREQ_EXT,
            crate::postings::PROX_EXT,
        ] {
            let path = crate::postings::field_file(dir, name, info.number, ext);
            fs::remove_file(&path).at("remove", &path)?;
        }
    }
    Ok(any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::UAX29Analyzer;
    use crate::generation::SegmentEntry;
    use tempfile::TempDir;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("file:///a").text("title", "the quick fox"),
            Document::new("file:///b")
                .text("title", "lazy dog")
                .number("size", 7),
            Document::new("file:///c").text("title", "quick quick dog"),
        ]
    }

    fn entry(name: &str, doc_count: u64, del_gen: u64) -> SegmentEntry {
        SegmentEntry {
            name: name.to_string(),
            doc_count,
            del_gen,
        }
    }

    #[test]
    fn writes_and_reads_segment() {
        let dir = TempDir::new().unwrap();
        let meta = write_segment(dir.path(), "_0", &docs(), &UAX29Analyzer, 6).unwrap();
        assert_eq!(3, meta.doc_count);
        let reader = SegmentReader::open(dir.path(), &entry("_0", 3, 0)).unwrap();
        assert_eq!(3, reader.num_docs());
        let mut quick = reader.term_docs("title", "quick").unwrap().unwrap();
        assert_eq!(Some(0), quick.next_doc().unwrap());
        assert_eq!(Some(2), quick.next_doc().unwrap());
        assert_eq!(2, quick.freq());
        assert_eq!(vec![0, 1], quick.positions().unwrap());
        assert_eq!(3, reader.core().field_length("title", 2));
        assert_eq!(Some(FieldKind::Number), reader.core().field_kind("size"));
        assert_eq!("file:///b", reader.document(1).unwrap().uri);
        assert_eq!(1, reader.core().doc_freq("uri", "file:///c").unwrap());
    }

    #[test]
    fn merge_drops_deleted_and_renumbers() {
        let dir = TempDir::new().unwrap();
        write_segment(dir.path(), "_0", &docs(), &UAX29Analyzer, 6).unwrap();
        let second = vec![Document::new("file:///d").text("title", "fox hunt")];
        write_segment(dir.path(), "_1", &second, &UAX29Analyzer, 6).unwrap();
        let a = SegmentCore::open(dir.path(), "_0").unwrap();
        let b = SegmentCore::open(dir.path(), "_1").unwrap();
        let mut live_a = BitVector::full(3);
        live_a.clear(1);
        let live_b = BitVector::full(1);
        let meta =
            merge_segments(dir.path(), "_2", &[(&a, &live_a), (&b, &live_b)], 6).unwrap();
        assert_eq!(3, meta.doc_count);
        let merged = SegmentReader::open(dir.path(), &entry("_2", 3, 0)).unwrap();
        assert!(merged.term_docs("title", "lazy").unwrap().is_none());
        assert!(merged.term_docs("size", &crate::document::encode_number(7)).unwrap().is_none());
        let mut fox = merged.term_docs("title", "fox").unwrap().unwrap();
        assert_eq!(Some(0), fox.next_doc().unwrap());
        assert_eq!(vec![2], fox.positions().unwrap());
        assert_eq!(Some(2), fox.next_doc().unwrap());
        assert_eq!(vec![0], fox.positions().unwrap());
        assert_eq!("file:///c", merged.document(1).unwrap().uri);
        assert_eq!("file:///d", merged.document(2).unwrap().uri);
        assert_eq!(3, merged.core().field_length("title", 1));
        assert_eq!(Some(FieldKind::Number), merged.core().field_kind("size"));
    }

    #[test]
    fn bad_format_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let meta = SegmentMeta {
            format: 99,
            doc_count: 0,
            fields: Vec::new(),
        };
        meta.write(dir.path(), "_5").unwrap();
        match SegmentCore::open(dir.path(), "_5") {
            Err(Error::CorruptSegment { .. }) => (),
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("opened corrupt segment"),
        }
    }

    #[test]
    fn released_core_removes_files_on_drop() {
        let dir = TempDir::new().unwrap();
        write_segment(dir.path(), "_0", &docs(), &UAX29Analyzer, 6).unwrap();
        let core = SegmentCore::open(dir.path(), "_0").unwrap();
        let mut live = BitVector::full(3);
        live.clear(0);
        live.write_file(&dir.path().join(del_file_name("_0", 1))).unwrap();
        core.mark_for_deletion();
        assert!(dir.path().join("_0.seg").exists());
        drop(core);
        assert_eq!(0, fs::read_dir(dir.path()).unwrap().count());
    }

    #[test]
    fn postings_past_doc_count_are_corrupt() {
        let dir = TempDir::new().unwrap();
        let dogs: Vec<Document> = (0..3)
            .map(|i| Document::new(format!("file:///{}", i)).text("title", "dog"))
            .collect();
        write_segment(dir.path(), "_0", &dogs, &UAX29Analyzer, 6).unwrap();
        for file in fs::read_dir(dir.path()).unwrap() {
            let path = file.unwrap().path();
            if path.extension().map_or(false, |e| e == crate::postings::FREQ_EXT) {
                let mut bytes = fs::read(&path).unwrap();
                bytes[1] = 0x7f;
                fs::write(&path, bytes).unwrap();
            }
        }
        let mut live = BitVector::full(3);
        live.clear(1);
        live.write_file(&dir.path().join(del_file_name("_0", 1))).unwrap();
        let reader = SegmentReader::open(dir.path(), &entry("_0", 3, 1)).unwrap();
        match reader.live_doc_freq("title", "dog") {
            Err(Error::CorruptSegment { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
        match merge_segments(dir.path(), "_1", &[(reader.core().as_ref(), reader.live())], 6) {
            Err(Error::CorruptSegment { .. }) => (),
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("merged corrupt postings"),
        }
    }
}
