//! Per-field inverted index of a segment.
//!
//! `_n.<f>.tid` is an fst map from token to the offset of its postings in
//! `_n.<f>.frq`. A postings list is a vint document frequency followed by, per
//! document, the ordinal delta, the term frequency and the delta of the
//! offset of its positions in `_n.<f>.prx`. Positions are stored as
//! `freq` vint deltas.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fst::automaton::{Levenshtein, Str};
use fst::{Automaton, IntoStreamer, Map, MapBuilder, Streamer};
use log::debug;
use regex::Regex;

use crate::error::{Error, IoContext, Result};
use crate::segment::MappedFile;
use crate::util::{write_vint, VintCursor};
use crate::DocId;

pub const TERMS_EXT: &str = "tid";
pub const FREQ_EXT: &str = "frq";
pub const PROX_EXT: &str = "prx";

pub fn field_file(dir: &Path, segment: &str, field_number: u32, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}.{}", segment, field_number, ext))
}

/// Postings of one token inside a segment, in ordinal order.
pub type TermPostings = Vec<(DocId, Vec<u32>)>;

/// Writes the three files of one field from an in-memory inverted index.
pub fn write_field(
    dir: &Path,
    segment: &str,
    field_number: u32,
    terms: &BTreeMap<String, TermPostings>,
) -> Result<Vec<PathBuf>> {
    let mut writer = FieldWriter::create(dir, segment, field_number)?;
    for (token, postings) in terms {
        writer.add_term(token.as_bytes(), postings.iter().map(|(d, p)| (*d, p.as_slice())))?;
    }
    writer.finish()
}

/// Streams terms in increasing order into the files of one field.
pub struct FieldWriter {
    paths: [PathBuf; 3],
    terms: MapBuilder<BufWriter<File>>,
    postings: BufWriter<File>,
    positions: BufWriter<File>,
    postings_offset: u64,
    positions_offset: u64,
}

impl FieldWriter {
    pub fn create(dir: &Path, segment: &str, field_number: u32) -> Result<FieldWriter> {
        let tid = field_file(dir, segment, field_number, TERMS_EXT);
        let frq = field_file(dir, segment, field_number, FREQ_EXT);
        let prx = field_file(dir, segment, field_number, PROX_EXT);
        let terms = MapBuilder::new(BufWriter::new(File::create(&tid).at("create", &tid)?))?;
        let postings = BufWriter::new(File::create(&frq).at("create", &frq)?);
        let positions = BufWriter::new(File::create(&prx).at("create", &prx)?);
        Ok(FieldWriter {
            paths: [tid, frq, prx],
            terms,
            postings,
            positions,
            postings_offset: 0,
            positions_offset: 0,
        })
    }

    /// `docs` must be in increasing ordinal order and non-empty.
    pub fn add_term<'p, I>(&mut self, token: &[u8], docs: I) -> Result<()>
    where
        I: ExactSizeIterator<Item = (DocId, &'p [u32])>,
    {
        self.terms.insert(token, self.postings_offset)?;
        let frq = &self.paths[1];
        let prx = &self.paths[2];
        self.postings_offset +=
            u64::from(write_vint(&mut self.postings, docs.len() as u64).at("write", frq)?);
        let mut prev_doc = 0u64;
        let mut prev_pos_offset = 0u64;
        for (doc, positions) in docs {
            self.postings_offset +=
                u64::from(write_vint(&mut self.postings, doc - prev_doc).at("write", frq)?);
            self.postings_offset += u64::from(
                write_vint(&mut self.postings, positions.len() as u64).at("write", frq)?,
            );
            self.postings_offset += u64::from(
                write_vint(&mut self.postings, self.positions_offset - prev_pos_offset)
                    .at("write", frq)?,
            );
            prev_pos_offset = self.positions_offset;
            let mut last_pos = 0u32;
            for pos in positions {
                self.positions_offset += u64::from(
                    write_vint(&mut self.positions, u64::from(pos - last_pos)).at("write", prx)?,
                );
                last_pos = *pos;
            }
            prev_doc = doc;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.postings.flush().at("flush", &self.paths[1])?;
        self.positions.flush().at("flush", &self.paths[2])?;
        self.terms.finish()?;
        Ok(self.paths.to_vec())
    }
}

/// Read side of one field, memory mapped.
pub struct FieldIndex {
    terms: Map<MappedFile>,
    postings: MappedFile,
    positions: MappedFile,
    postings_path: PathBuf,
    max_doc: u64,
}

impl FieldIndex {
    /// Opens the files of one field of a segment holding `max_doc` documents.
    pub fn open(dir: &Path, segment: &str, field_number: u32, max_doc: u64) -> Result<FieldIndex> {
        let tid = field_file(dir, segment, field_number, TERMS_EXT);
        let terms = Map::new(MappedFile::open(&tid)?).map_err(|e| Error::corrupt(&tid, e))?;
        let postings_path = field_file(dir, segment, field_number, FREQ_EXT);
        Ok(FieldIndex {
            terms,
            postings: MappedFile::open(&postings_path)?,
            positions: MappedFile::open(&field_file(dir, segment, field_number, PROX_EXT))?,
            postings_path,
            max_doc,
        })
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn postings(&self, token: &str) -> Result<Option<PostingsIter>> {
        match self.terms.get(token) {
            Some(offset) => self.postings_at(offset).map(Some),
            None => Ok(None),
        }
    }

    pub fn doc_freq(&self, token: &str) -> Result<u64> {
        Ok(match self.postings(token)? {
            Some(iter) => iter.doc_freq(),
            None => 0,
        })
    }

    fn postings_at(&self, offset: u64) -> Result<PostingsIter> {
        let mut cursor = VintCursor::new(&self.postings, offset as usize);
        let doc_freq = cursor
            .read()
            .ok_or_else(|| Error::corrupt(&self.postings_path, "truncated postings header"))?;
        Ok(PostingsIter {
            cursor,
            positions: &self.positions,
            path: &self.postings_path,
            max_doc: self.max_doc,
            doc_freq,
            left: doc_freq,
            doc: 0,
            freq: 0,
            pos_offset: 0,
            started: false,
            finished: false,
        })
    }

    pub(crate) fn map(&self) -> &Map<MappedFile> {
        &self.terms
    }

    pub(crate) fn postings_for_offset(&self, offset: u64) -> Result<PostingsIter> {
        self.postings_at(offset)
    }

    pub fn terms_range(
        &self,
        lower: Option<&str>,
        upper: Option<&str>,
        include_lower: bool,
        include_upper: bool,
    ) -> Vec<String> {
        let mut range = self.terms.range();
        if let Some(lower) = lower {
            range = if include_lower { range.ge(lower) } else { range.gt(lower) };
        }
        if let Some(upper) = upper {
            range = if include_upper { range.le(upper) } else { range.lt(upper) };
        }
        collect_keys(range.into_stream())
    }

    pub fn terms_prefix(&self, prefix: &str) -> Vec<String> {
        let automaton = Str::new(prefix).starts_with();
        collect_keys(self.terms.search(automaton).into_stream())
    }

    /// Terms within `distance` edits of `token`. Automata too large for fst
    /// fall back to scanning the dictionary.
    pub fn terms_fuzzy(&self, token: &str, distance: u32) -> Vec<String> {
        match Levenshtein::new(token, distance) {
            Ok(automaton) => collect_keys(self.terms.search(automaton).into_stream()),
            Err(e) => {
                debug!("fuzzy {:?}~{} scans all terms: {}", token, distance, e);
                let target: Vec<char> = token.chars().collect();
                collect_keys(self.terms.stream())
                    .into_iter()
                    .filter(|t| within_distance(&target, t, distance as usize))
                    .collect()
            }
        }
    }

    /// `*` matches any sequence, `?` a single character.
    pub fn terms_wildcard(&self, pattern: &str) -> Result<Vec<String>> {
        let regex = wildcard_regex(pattern)?;
        let literal: String = pattern.chars().take_while(|c| *c != '*' && *c != '?').collect();
        Ok(self
            .terms_prefix(&literal)
            .into_iter()
            .filter(|t| regex.is_match(t))
            .collect())
    }
}

fn collect_keys<S>(mut stream: S) -> Vec<String>
where
    S: for<'s> Streamer<'s, Item = (&'s [u8], u64)>,
{
    let mut keys = Vec::new();
    while let Some((key, _)) = stream.next() {
        keys.push(String::from_utf8_lossy(key).into_owned());
    }
    keys
}

/// Bounded Levenshtein check, giving up on a row once every cell exceeds `max`.
fn within_distance(target: &[char], candidate: &str, max: usize) -> bool {
    let candidate: Vec<char> = candidate.chars().collect();
    let (n, m) = (target.len(), candidate.len());
    if n.max(m) - n.min(m) > max {
        return false;
    }
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut row = vec![0; m + 1];
    for i in 1..=n {
        row[0] = i;
        let mut best = row[0];
        for j in 1..=m {
            let cost = if target[i - 1] == candidate[j - 1] { 0 } else { 1 };
            row[j] = (prev[j - 1] + cost).min(prev[j] + 1).min(row[j - 1] + 1);
            best = best.min(row[j]);
        }
        if best > max {
            return false;
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[m] <= max
}

pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str("^(?s:");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push_str(")$");
    Regex::new(&re).map_err(|e| Error::InvalidArgument(format!("wildcard {:?}: {}", pattern, e)))
}

/// Lazy iterator over the postings of one token.
pub struct PostingsIter<'a> {
    cursor: VintCursor<'a>,
    positions: &'a [u8],
    path: &'a Path,
    max_doc: u64,
    doc_freq: u64,
    left: u64,
    doc: DocId,
    freq: u32,
    pos_offset: u64,
    started: bool,
    finished: bool,
}

impl<'a> PostingsIter<'a> {
    pub fn doc_freq(&self) -> u64 {
        self.doc_freq
    }

    pub fn doc(&self) -> Option<DocId> {
        if self.started && !self.finished {
            Some(self.doc)
        } else {
            None
        }
    }

    pub fn freq(&self) -> u32 {
        self.freq
    }

    pub fn next_doc(&mut self) -> Result<Option<DocId>> {
        if self.left == 0 {
            self.finished = true;
            return Ok(None);
        }
        self.left -= 1;
        let delta = self.read()?;
        let freq = self.read()?;
        let pos_delta = self.read()?;
        if self.started && delta == 0 {
            return Err(Error::corrupt(self.path, "postings not increasing"));
        }
        let doc = if self.started {
            self.doc.checked_add(delta)
        } else {
            Some(delta)
        };
        match doc {
            Some(doc) if doc < self.max_doc => self.doc = doc,
            _ => return Err(Error::corrupt(self.path, "doc out of range")),
        }
        self.started = true;
        self.freq = freq as u32;
        self.pos_offset = self
            .pos_offset
            .checked_add(pos_delta)
            .ok_or_else(|| Error::corrupt(self.path, "positions offset out of range"))?;
        Ok(Some(self.doc))
    }

    pub fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        if let Some(doc) = self.doc() {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        loop {
            match self.next_doc()? {
                Some(doc) if doc < target => continue,
                other => return Ok(other),
            }
        }
    }

    /// Positions of the current document.
    pub fn positions(&self) -> Result<Vec<u32>> {
        let mut cursor = VintCursor::new(self.positions, self.pos_offset as usize);
        let mut out = Vec::with_capacity(self.freq as usize);
        let mut pos = 0u64;
        for _ in 0..self.freq {
            pos += cursor
                .read()
                .ok_or_else(|| Error::corrupt(self.path, "truncated positions"))?;
            out.push(pos as u32);
        }
        Ok(out)
    }

    fn read(&mut self) -> Result<u64> {
        self.cursor
            .read()
            .ok_or_else(|| Error::corrupt(self.path, "truncated postings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(dir: &Path) -> FieldIndex {
        let mut terms: BTreeMap<String, TermPostings> = BTreeMap::new();
        terms.insert("beagle".to_string(), vec![(0, vec![1, 4]), (3, vec![0])]);
        terms.insert("bear".to_string(), vec![(2, vec![7])]);
        terms.insert("cat".to_string(), vec![(1, vec![0, 1, 2])]);
        terms.insert("dog".to_string(), vec![(0, vec![0]), (1, vec![3])]);
        write_field(dir, "_0", 1, &terms).unwrap();
        FieldIndex::open(dir, "_0", 1, 4).unwrap()
    }

    #[test]
    fn reads_postings_and_positions() {
        let dir = TempDir::new().unwrap();
        let field = sample(dir.path());
        let mut iter = field.postings("beagle").unwrap().unwrap();
        assert_eq!(2, iter.doc_freq());
        assert_eq!(Some(0), iter.next_doc().unwrap());
        assert_eq!(2, iter.freq());
        assert_eq!(vec![1, 4], iter.positions().unwrap());
        assert_eq!(Some(3), iter.next_doc().unwrap());
        assert_eq!(vec![0], iter.positions().unwrap());
        assert_eq!(None, iter.next_doc().unwrap());
        assert_eq!(None, iter.next_doc().unwrap());
        assert!(field.postings("wolf").unwrap().is_none());
    }

    #[test]
    fn advance_stops_at_or_after_target() {
        let dir = TempDir::new().unwrap();
        let field = sample(dir.path());
        let mut iter = field.postings("dog").unwrap().unwrap();
        assert_eq!(Some(1), iter.advance(1).unwrap());
        assert_eq!(Some(1), iter.advance(1).unwrap());
        assert_eq!(None, iter.advance(2).unwrap());
    }

    #[test]
    fn expands_terms() {
        let dir = TempDir::new().unwrap();
        let field = sample(dir.path());
        assert_eq!(vec!["beagle", "bear"], field.terms_prefix("be"));
        assert_eq!(vec!["bear"], field.terms_wildcard("b?ar").unwrap());
        assert_eq!(vec!["beagle", "bear"], field.terms_wildcard("b*").unwrap());
        assert_eq!(vec!["cat"], field.terms_fuzzy("bat", 1));
        assert_eq!(
            vec!["bear", "cat"],
            field.terms_range(Some("beagle"), Some("cat"), false, true)
        );
        assert_eq!(
            vec!["beagle", "bear", "cat"],
            field.terms_range(None, Some("dog"), true, false)
        );
    }

    #[test]
    fn truncated_postings_are_corrupt() {
        let dir = TempDir::new().unwrap();
        let field = sample(dir.path());
        drop(field);
        let frq = field_file(dir.path(), "_0", 1, FREQ_EXT);
        let len = std::fs::metadata(&frq).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&frq).unwrap();
        file.set_len(len - 2).unwrap();
        drop(file);
        let field = FieldIndex::open(dir.path(), "_0", 1, 4).unwrap();
        let mut iter = field.postings("dog").unwrap().unwrap();
        let mut result = Ok(None);
        for _ in 0..3 {
            result = iter.next_doc();
            if result.is_err() {
                break;
            }
        }
        match result {
            Err(Error::CorruptSegment { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fuzzy_beyond_automaton_limit_scans_terms() {
        let dir = TempDir::new().unwrap();
        let mut terms: BTreeMap<String, TermPostings> = BTreeMap::new();
        terms.insert("internationalisation".to_string(), vec![(0, vec![0])]);
        terms.insert("internationalization".to_string(), vec![(1, vec![0])]);
        terms.insert("nationalization".to_string(), vec![(2, vec![0])]);
        write_field(dir.path(), "_0", 1, &terms).unwrap();
        let field = FieldIndex::open(dir.path(), "_0", 1, 3).unwrap();
        for distance in 3..9 {
            let found = field.terms_fuzzy("internationalizaton", distance);
            assert!(found.contains(&"internationalization".to_string()));
            assert!(found.contains(&"internationalisation".to_string()));
        }
        assert_eq!(2, field.terms_fuzzy("internationalizaton", 5).len());
        assert_eq!(3, field.terms_fuzzy("internationalizaton", 6).len());
    }

    #[test]
    fn bounded_distance() {
        let target: Vec<char> = "kitten".chars().collect();
        assert!(within_distance(&target, "sitting", 3));
        assert!(!within_distance(&target, "sitting", 2));
        assert!(within_distance(&target, "kitten", 0));
        assert!(!within_distance(&target, "kit", 2));
    }

    #[test]
    fn out_of_range_docs_are_corrupt() {
        let dir = TempDir::new().unwrap();
        drop(sample(dir.path()));
        let field = FieldIndex::open(dir.path(), "_0", 1, 2).unwrap();
        let mut iter = field.postings("beagle").unwrap().unwrap();
        assert_eq!(Some(0), iter.next_doc().unwrap());
        match iter.next_doc() {
            Err(Error::CorruptSegment { reason, .. }) => assert_eq!("doc out of range", reason),
            other => panic!("unexpected {:?}", other),
        }
    }
}
