use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::{self, Analyzer};
use crate::config::IndexConfig;
use crate::directory::Directory;
use crate::error::{Error, IoContext, Result};
use crate::generation::{Generation, SEGMENTS_FILE};
use crate::lock::{index_lock, with_lock, WRITE_LOCK_NAME};
use crate::query::{Operator, QueryParser};
use crate::queue::IndexingQueue;
use crate::reader::IndexReader;
use crate::search::Searcher;
use crate::writer::IndexWriter;

pub const INDEX_META_FILE: &str = "index_meta";
const INDEX_META_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize, Debug)]
pub struct IndexMeta {
    pub format: u32,
    pub config: IndexConfig,
}

pub fn read_index_meta(path: &Path) -> Result<IndexMeta> {
    let meta_path = path.join(INDEX_META_FILE);
    let file = File::open(&meta_path).at("open index meta", &meta_path)?;
    let meta: IndexMeta = rmp_serde::from_read(BufReader::new(file))?;
    if meta.format != INDEX_META_FORMAT {
        return Err(Error::corrupt(
            &meta_path,
            format!("unknown index meta format {}", meta.format),
        ));
    }
    Ok(meta)
}

pub fn write_index_meta(path: &Path, meta: &IndexMeta) -> Result<()> {
    let meta_path = path.join(INDEX_META_FILE);
    let file = File::create(&meta_path).at("create index meta", &meta_path)?;
    let mut writer = BufWriter::new(file);
    rmp_serde::encode::write_named(&mut writer, meta)?;
    writer.flush().at("write index meta", &meta_path)?;
    Ok(())
}

/// Settings an index can be opened with regardless of what it was created
/// with.
#[derive(Clone, Debug, Default)]
struct Overrides {
    auto_commit: Option<bool>,
    auto_merge: Option<bool>,
    disable_locks: Option<bool>,
    default_operator: Option<Operator>,
}

impl Overrides {
    fn apply(&self, config: &mut IndexConfig) {
        if let Some(auto_commit) = self.auto_commit {
            config.auto_commit = auto_commit;
        }
        if let Some(auto_merge) = self.auto_merge {
            config.auto_merge = auto_merge;
        }
        if let Some(disable_locks) = self.disable_locks {
            config.disable_locks = disable_locks;
        }
        if let Some(operator) = self.default_operator {
            config.default_operator = operator;
        }
    }
}

pub struct IndexBuilder {
    config: IndexConfig,
    overrides: Overrides,
}

impl Default for IndexBuilder {
    fn default() -> IndexBuilder {
        IndexBuilder::new()
    }
}

impl IndexBuilder {
    pub fn new() -> IndexBuilder {
        IndexBuilder::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> IndexBuilder {
        IndexBuilder {
            config,
            overrides: Overrides::default(),
        }
    }

    pub fn max_buffered_docs(mut self, val: usize) -> IndexBuilder {
        self.config.max_buffered_docs = val;
        self
    }

    pub fn merge_factor(mut self, val: usize) -> IndexBuilder {
        self.config.merge_factor = val;
        self
    }

    pub fn max_merge_docs(mut self, val: u64) -> IndexBuilder {
        self.config.max_merge_docs = val;
        self
    }

    pub fn write_lock_timeout_ms(mut self, val: u64) -> IndexBuilder {
        self.config.write_lock_timeout_ms = val;
        self
    }

    pub fn commit_lock_timeout_ms(mut self, val: u64) -> IndexBuilder {
        self.config.commit_lock_timeout_ms = val;
        self
    }

    pub fn analyzer<S: Into<String>>(mut self, name: S) -> IndexBuilder {
        self.config.analyzer = name.into();
        self
    }

    pub fn default_field<S: Into<String>>(mut self, field: S) -> IndexBuilder {
        self.config.default_field = field.into();
        self
    }

    pub fn keyword_field<S: Into<String>>(mut self, field: S) -> IndexBuilder {
        self.config.keyword_fields.push(field.into());
        self
    }

    pub fn stored_compression(mut self, level: u32) -> IndexBuilder {
        self.config.stored_compression = level;
        self
    }

    pub fn default_operator(mut self, operator: Operator) -> IndexBuilder {
        self.config.default_operator = operator;
        self.overrides.default_operator = Some(operator);
        self
    }

    pub fn auto_commit(mut self, val: bool) -> IndexBuilder {
        self.config.auto_commit = val;
        self.overrides.auto_commit = Some(val);
        self
    }

    pub fn auto_merge(mut self, val: bool) -> IndexBuilder {
        self.config.auto_merge = val;
        self.overrides.auto_merge = Some(val);
        self
    }

    pub fn disable_locks(mut self, val: bool) -> IndexBuilder {
        self.config.disable_locks = val;
        self.overrides.disable_locks = Some(val);
        self
    }

    /// Opens an existing index with its stored configuration. Runtime
    /// switches set on the builder (auto commit, auto merge, locking and the
    /// default operator) take precedence.
    pub fn open<P: Into<PathBuf>>(self, path: P) -> Result<Index> {
        let path = path.into();
        let mut config = read_index_meta(&path)?.config;
        self.overrides.apply(&mut config);
        Index::from_parts(path, config)
    }

    pub fn create<P: Into<PathBuf>>(self, path: P) -> Result<Index> {
        let path = path.into();
        self.config.validate()?;
        fs::create_dir_all(&path).at("create index dir", &path)?;
        let lock = index_lock(
            &path,
            WRITE_LOCK_NAME,
            self.config.disable_locks,
            self.config.lock_poll_interval(),
        );
        with_lock(&*lock, self.config.write_lock_timeout(), || {
            if Index::exists(&path) {
                return Err(Error::InvalidArgument(format!(
                    "an index already exists at {:?}",
                    path
                )));
            }
            write_index_meta(
                &path,
                &IndexMeta {
                    format: INDEX_META_FORMAT,
                    config: self.config.clone(),
                },
            )?;
            Generation::default().write(&path)
        })?;
        info!("created index at {:?}", path);
        Index::from_parts(path, self.config)
    }
}

/// An index directory together with its configuration. Cheap to clone.
#[derive(Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

struct IndexInner {
    path: PathBuf,
    config: IndexConfig,
    directory: Arc<Directory>,
    analyzer: Box<dyn Analyzer>,
}

impl Index {
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Index> {
        IndexBuilder::new().create(path)
    }

    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Index> {
        IndexBuilder::new().open(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.join(SEGMENTS_FILE).exists()
    }

    fn from_parts(path: PathBuf, config: IndexConfig) -> Result<Index> {
        config.validate()?;
        let analyzer = analysis::for_name(&config.analyzer)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown analyzer {:?}", config.analyzer)))?;
        let directory = Arc::new(Directory::new(path.clone()));
        Ok(Index {
            inner: Arc::new(IndexInner {
                path,
                config,
                directory,
                analyzer,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.inner.directory
    }

    pub fn analyzer(&self) -> &dyn Analyzer {
        &*self.inner.analyzer
    }

    pub fn writer(&self) -> IndexWriter {
        IndexWriter::new(
            self.inner.directory.clone(),
            self.inner.config.clone(),
            self.inner.analyzer.clone(),
        )
    }

    pub fn indexing_queue(&self) -> Result<IndexingQueue> {
        IndexingQueue::start(Arc::new(self.writer()))
    }

    pub fn reader(&self) -> Result<IndexReader> {
        IndexReader::open(self.inner.directory.clone())
    }

    pub fn query_parser(&self) -> QueryParser {
        QueryParser::for_config(&self.inner.config, self.inner.analyzer.clone())
    }

    pub fn searcher(&self) -> Result<Searcher> {
        Ok(Searcher::new(self.reader()?, self.query_parser()))
    }
}
