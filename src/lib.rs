pub mod analysis;
pub mod bit_vector;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod generation;
pub mod index;
pub mod lock;
pub mod postings;
pub mod query;
pub mod queue;
pub mod reader;
pub mod scorer;
pub mod search;
pub mod segment;
pub mod similarity;
pub mod stored;
mod util;
pub mod writer;

pub use crate::config::IndexConfig;
pub use crate::document::{Document, FieldValue, StoredDocument};
pub use crate::error::{Error, Result};
pub use crate::index::{Index, IndexBuilder};
pub use crate::query::{Clause, Occur, Operator, Query, QueryParseError, QueryParser, Term};
pub use crate::queue::{IndexTask, IndexingQueue, Priority};
pub use crate::reader::{DocAddress, IndexReader};
pub use crate::search::{Hit, Hits, Searcher};
pub use crate::writer::IndexWriter;

pub type DocId = u64;
