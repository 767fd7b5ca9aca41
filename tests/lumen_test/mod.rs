use std::collections::BTreeSet;
use std::path::PathBuf;

use proptest::collection::vec;
use proptest::prelude::*;
use tempfile::TempDir;

use lumen::{Clause, Document, Index, IndexBuilder, IndexWriter, Query};

pub const TAGS: &[&str] = &["red", "green", "blue"];
pub const WORDS: &[&str] = &["apple", "banana", "cherry", "date"];

/// A document before it gets a uri: its tag and body words.
#[derive(Debug, Clone, PartialEq)]
pub struct TestDoc {
    pub tag: String,
    pub words: Vec<String>,
}

impl TestDoc {
    fn matches(&self, query: &TestQuery) -> bool {
        match query {
            TestQuery::Tag(tag) => &self.tag == tag,
            TestQuery::Word(word) => self.words.contains(word),
            TestQuery::WordNotWord(yes, no) => self.words.contains(yes) && !self.words.contains(no),
            TestQuery::WordPrefix(prefix) => self.words.iter().any(|w| w.starts_with(prefix.as_str())),
        }
    }

    fn to_document(&self, uri: &str) -> Document {
        Document::new(uri)
            .keyword("tag", self.tag.as_str())
            .text("body", self.words.join(" "))
    }
}

#[derive(Debug, Clone)]
pub enum TestQuery {
    Tag(String),
    Word(String),
    WordNotWord(String, String),
    WordPrefix(String),
}

impl TestQuery {
    pub fn to_query(&self) -> Query {
        match self {
            TestQuery::Tag(tag) => Query::term("tag", tag.as_str()),
            TestQuery::Word(word) => Query::term("body", word.as_str()),
            TestQuery::WordNotWord(yes, no) => Query::boolean(vec![
                Clause::must(Query::term("body", yes.as_str())),
                Clause::must_not(Query::term("body", no.as_str())),
            ]),
            TestQuery::WordPrefix(prefix) => Query::Prefix {
                term: lumen::Term::new("body", prefix.as_str()),
                boost: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum IndexOperation {
    Index(Vec<TestDoc>),
    Commit,
    ForceMerge,
    ReOpen,
    /// Deletes the n-th document ever added, if it exists.
    DeleteNth(usize),
    DeleteTag(String),
}

pub fn arb_doc() -> BoxedStrategy<TestDoc> {
    (
        proptest::sample::select(TAGS),
        vec(proptest::sample::select(WORDS), 1..6),
    )
        .prop_map(|(tag, words)| TestDoc {
            tag: tag.to_string(),
            words: words.into_iter().map(str::to_string).collect(),
        })
        .boxed()
}

pub fn arb_query() -> BoxedStrategy<TestQuery> {
    let word = || proptest::sample::select(WORDS).prop_map(str::to_string);
    prop_oneof![
        proptest::sample::select(TAGS).prop_map(|t| TestQuery::Tag(t.to_string())),
        word().prop_map(TestQuery::Word),
        (word(), word()).prop_map(|(a, b)| TestQuery::WordNotWord(a, b)),
        word().prop_map(|w| TestQuery::WordPrefix(w[..2].to_string())),
    ]
    .boxed()
}

pub fn arb_index_op() -> BoxedStrategy<IndexOperation> {
    prop_oneof![
        3 => vec(arb_doc(), 1..20).prop_map(IndexOperation::Index),
        2 => Just(IndexOperation::Commit),
        1 => Just(IndexOperation::ForceMerge),
        1 => Just(IndexOperation::ReOpen),
        1 => (0..100usize).prop_map(IndexOperation::DeleteNth),
        1 => proptest::sample::select(TAGS).prop_map(|t| IndexOperation::DeleteTag(t.to_string())),
    ]
    .boxed()
}

#[derive(Debug, Clone)]
enum Deletion {
    Uri(String),
    Tag(String),
}

fn commit_model(
    committed: &mut Vec<(String, TestDoc)>,
    buffered: &mut Vec<(String, TestDoc)>,
    pending: &mut Vec<Deletion>,
) {
    committed.retain(|(uri, doc)| {
        !pending.iter().any(|deletion| match deletion {
            Deletion::Uri(target) => uri == target,
            Deletion::Tag(tag) => &doc.tag == tag,
        })
    });
    committed.append(buffered);
    pending.clear();
}

fn open(path: &PathBuf) -> (Index, IndexWriter) {
    let index = IndexBuilder::new()
        .auto_commit(false)
        .open(path.clone())
        .expect("Could not open index.");
    let writer = index.writer();
    (index, writer)
}

/// Applies `ops` to a fresh index and to a model of it, then checks that
/// every query finds exactly the committed documents the model expects.
pub fn index_and_assert_search_matches(ops: &[IndexOperation], queries: &[TestQuery]) {
    let index_dir = TempDir::new().unwrap();
    let path = index_dir.path().to_path_buf();
    IndexBuilder::new()
        .merge_factor(3)
        .auto_commit(false)
        .create(path.clone())
        .expect("Could not create index.");
    let (mut index, mut writer) = open(&path);

    let mut added: Vec<String> = Vec::new();
    let mut committed: Vec<(String, TestDoc)> = Vec::new();
    let mut buffered: Vec<(String, TestDoc)> = Vec::new();
    let mut pending_deletes: Vec<Deletion> = Vec::new();

    for op in ops {
        match op {
            IndexOperation::Index(docs) => {
                for doc in docs {
                    let uri = format!("doc{}", added.len());
                    writer.add_document(doc.to_document(&uri)).unwrap();
                    added.push(uri.clone());
                    buffered.push((uri, doc.clone()));
                }
            }
            IndexOperation::Commit => {
                writer.commit().expect("Could not commit.");
                commit_model(&mut committed, &mut buffered, &mut pending_deletes);
            }
            IndexOperation::ForceMerge => {
                writer.force_merge().expect("Could not merge segments.");
                commit_model(&mut committed, &mut buffered, &mut pending_deletes);
                let segments = index.reader().unwrap().segment_entries().len();
                assert!(segments <= 1, "{} segments after force merge", segments);
            }
            IndexOperation::ReOpen => {
                writer.commit().expect("Could not commit.");
                commit_model(&mut committed, &mut buffered, &mut pending_deletes);
                drop(writer);
                let reopened = open(&path);
                index = reopened.0;
                writer = reopened.1;
            }
            IndexOperation::DeleteNth(n) => {
                if let Some(uri) = added.get(*n) {
                    writer.delete_document(uri).unwrap();
                    buffered.retain(|(u, _)| u != uri);
                    pending_deletes.push(Deletion::Uri(uri.clone()));
                }
            }
            IndexOperation::DeleteTag(tag) => {
                writer.delete_documents(lumen::Term::new("tag", tag.as_str())).unwrap();
                buffered.retain(|(_, d)| &d.tag != tag);
                pending_deletes.push(Deletion::Tag(tag.clone()));
            }
        }
    }

    let searcher = index.searcher().unwrap();
    for query in queries {
        let expected: BTreeSet<String> = committed
            .iter()
            .filter(|(_, doc)| doc.matches(query))
            .map(|(uri, _)| uri.clone())
            .collect();
        let actual: BTreeSet<String> = searcher
            .search(&query.to_query())
            .unwrap()
            .map(|hit| hit.unwrap().uri)
            .collect();
        assert_eq!(expected, actual, "query {:?}", query);
    }
    let num_docs = index.reader().unwrap().num_docs().unwrap();
    assert_eq!(committed.len() as u64, num_docs);
    drop(writer);
    index_dir.close().unwrap();
}
