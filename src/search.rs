use std::cmp::Ordering;
use std::vec;

use log::debug;

use crate::document::StoredDocument;
use crate::error::Result;
use crate::query::{Query, QueryParser};
use crate::reader::{DocAddress, IndexReader};
use crate::scorer::{SearchContext, Weight};
use crate::segment::SegmentReader;
use crate::DocId;

/// Evaluates `query` over `segments`, handing every live match to the
/// collector.
pub fn search(segments: &[SegmentReader], query: &Query, collector: &mut dyn Collector) -> Result<()> {
    let ctx = SearchContext::new(segments);
    let weight = Weight::build(query, &ctx)?;
    for (index, segment) in segments.iter().enumerate() {
        collector.set_segment(index, segment)?;
        if let Some(mut scorer) = weight.scorer(segment)? {
            while let Some(doc) = scorer.next_doc()? {
                if !segment.is_deleted(doc) {
                    let score = scorer.score()?;
                    collector.collect(doc, score)?;
                }
            }
        }
    }
    Ok(())
}

pub trait Collector {
    fn set_segment(&mut self, index: usize, segment: &SegmentReader) -> Result<()>;
    fn collect(&mut self, doc: DocId, score: f32) -> Result<()>;
}

#[derive(Default)]
pub struct CountCollector {
    count: u64,
}

impl CountCollector {
    pub fn new() -> CountCollector {
        CountCollector::default()
    }

    pub fn total_count(&self) -> u64 {
        self.count
    }
}

impl Collector for CountCollector {
    fn set_segment(&mut self, _index: usize, _segment: &SegmentReader) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc: DocId, _score: f32) -> Result<()> {
        self.count += 1;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredDoc {
    pub address: DocAddress,
    pub score: f32,
}

/// Keeps every match, ranked on `into_ranked`.
#[derive(Default)]
pub struct RankingCollector {
    docs: Vec<ScoredDoc>,
    segment: usize,
}

impl RankingCollector {
    pub fn new() -> RankingCollector {
        RankingCollector::default()
    }

    /// By descending score; equal scores keep insertion order.
    pub fn into_ranked(mut self) -> Vec<ScoredDoc> {
        self.docs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.address.cmp(&b.address))
        });
        self.docs
    }
}

impl Collector for RankingCollector {
    fn set_segment(&mut self, index: usize, _segment: &SegmentReader) -> Result<()> {
        self.segment = index;
        Ok(())
    }

    fn collect(&mut self, doc: DocId, score: f32) -> Result<()> {
        self.docs.push(ScoredDoc {
            address: DocAddress {
                segment: self.segment,
                ordinal: doc,
            },
            score,
        });
        Ok(())
    }
}

/// Runs queries against one reader.
#[derive(Clone)]
pub struct Searcher {
    reader: IndexReader,
    parser: QueryParser,
}

impl Searcher {
    pub fn new(reader: IndexReader, parser: QueryParser) -> Searcher {
        Searcher { reader, parser }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn parser(&self) -> &QueryParser {
        &self.parser
    }

    pub fn search(&self, query: &Query) -> Result<Hits> {
        let mut collector = RankingCollector::new();
        self.collect(query, &mut collector)?;
        let docs = collector.into_ranked();
        debug!("{} hits for {}", docs.len(), query);
        Ok(Hits {
            reader: self.reader.clone(),
            total: docs.len(),
            docs: docs.into_iter(),
        })
    }

    pub fn search_str(&self, query: &str) -> Result<Hits> {
        let query = self.parser.parse(query)?;
        self.search(&query)
    }

    pub fn count(&self, query: &Query) -> Result<u64> {
        let mut collector = CountCollector::new();
        self.collect(query, &mut collector)?;
        Ok(collector.total_count())
    }

    pub fn collect(&self, query: &Query, collector: &mut dyn Collector) -> Result<()> {
        self.reader
            .with_segments(|segments| search(segments, query, collector))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub uri: String,
    pub score: f32,
    pub address: DocAddress,
    pub document: StoredDocument,
}

/// Ranked results. Stored fields are read as the iterator advances.
pub struct Hits {
    reader: IndexReader,
    docs: vec::IntoIter<ScoredDoc>,
    total: usize,
}

impl Hits {
    /// Number of matching documents, consumed or not.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for Hits {
    type Item = Result<Hit>;

    fn next(&mut self) -> Option<Result<Hit>> {
        let scored = self.docs.next()?;
        Some(self.reader.document(scored.address).map(|document| Hit {
            uri: document.uri.clone(),
            score: scored.score,
            address: scored.address,
            document,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.docs.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::UAX29Analyzer;
    use crate::bit_vector::BitVector;
    use crate::directory::Directory;
    use crate::document::Document;
    use crate::error::Error;
    use crate::generation::{Generation, SegmentEntry};
    use crate::segment::write_segment;
    use crate::util::{del_file_name, segment_name};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn index(dir: &TempDir, segments: &[&[(&str, &str)]]) -> IndexReader {
        let mut generation = Generation::default();
        for docs in segments {
            let name = segment_name(generation.counter);
            generation.counter += 1;
            let docs: Vec<Document> = docs
                .iter()
                .map(|(uri, body)| Document::new(*uri).text("body", *body))
                .collect();
            write_segment(dir.path(), &name, &docs, &UAX29Analyzer, 6).unwrap();
            generation.segments.push(SegmentEntry {
                name,
                doc_count: docs.len() as u64,
                del_gen: 0,
            });
        }
        generation.write(dir.path()).unwrap();
        IndexReader::open(Arc::new(Directory::new(dir.path()))).unwrap()
    }

    fn uris(hits: Hits) -> Vec<String> {
        hits.map(|h| h.unwrap().uri).collect()
    }

    #[test]
    fn ranks_by_score_then_insertion() {
        let dir = TempDir::new().unwrap();
        let reader = index(
            &dir,
            &[
                &[("a", "rust"), ("b", "rust rust go")],
                &[("c", "rust"), ("d", "go")],
            ],
        );
        let searcher = Searcher::new(reader, QueryParser::new("body", Box::new(UAX29Analyzer)));
        let hits = searcher.search_str("body:rust").unwrap();
        assert_eq!(3, hits.total());
        assert_eq!(vec!["a", "c", "b"], uris(hits));
        assert_eq!(2, searcher.count(&Query::term("body", "go")).unwrap());
    }

    #[test]
    fn skips_deleted_documents() {
        let dir = TempDir::new().unwrap();
        let reader = index(&dir, &[&[("a", "x"), ("b", "x")]]);
        let mut live = BitVector::full(2);
        live.clear(0);
        live.write_file(&dir.path().join(del_file_name("_0", 1))).unwrap();
        let mut generation = Generation::read(dir.path()).unwrap();
        generation.segments[0].del_gen = 1;
        generation.version += 1;
        generation.write(dir.path()).unwrap();
        let searcher = Searcher::new(reader.reopen().unwrap(), QueryParser::default());
        assert_eq!(vec!["b"], uris(searcher.search(&Query::term("body", "x")).unwrap()));
        assert_eq!(vec!["b"], uris(searcher.search(&Query::MatchAll { boost: 1.0 }).unwrap()));
    }

    #[test]
    fn hits_fail_after_close() {
        let dir = TempDir::new().unwrap();
        let reader = index(&dir, &[&[("a", "x"), ("b", "x")]]);
        let searcher = Searcher::new(reader.clone(), QueryParser::default());
        let mut hits = searcher.search(&Query::term("body", "x")).unwrap();
        assert!(hits.next().unwrap().is_ok());
        reader.close();
        match hits.next() {
            Some(Err(Error::ReaderClosed)) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(hits.next().is_none());
        match searcher.search(&Query::term("body", "x")) {
            Err(Error::ReaderClosed) => (),
            _ => panic!("searched a closed reader"),
        }
    }
}
