//! Background indexing through a channel of tasks.
//!
//! One worker thread owns the application of tasks to an `IndexWriter`.
//! `Immediate` tasks are committed as soon as they are applied; `Delayed`
//! tasks are batched until no task arrived for the configured commit delay.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::query::Term;
use crate::writer::IndexWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Immediate,
    Delayed,
}

#[derive(Clone, Debug)]
pub enum IndexTask {
    Add(Document),
    Delete(Term),
    DeleteUri(String),
    Commit,
}

pub struct IndexingQueue {
    sender: Option<Sender<(Priority, IndexTask)>>,
    worker: Option<thread::JoinHandle<Result<()>>>,
    writer: Arc<IndexWriter>,
}

impl IndexingQueue {
    pub fn start(writer: Arc<IndexWriter>) -> Result<IndexingQueue> {
        let (sender, receiver) = unbounded::<(Priority, IndexTask)>();
        let worker_writer = writer.clone();
        let worker = thread::Builder::new()
            .name("lumen-indexer".to_string())
            .spawn(move || {
                let writer = worker_writer;
                let delay = writer.config().commit_delay();
                loop {
                    match receiver.recv_timeout(delay) {
                        Ok((priority, task)) => {
                            let commit = priority == Priority::Immediate || matches!(task, IndexTask::Commit);
                            if let Err(e) = apply(&writer, task) {
                                error!("indexing task failed: {}", e);
                            }
                            if commit {
                                if let Err(e) = writer.commit() {
                                    error!("{}", e);
                                }
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if writer.has_uncommitted_changes() {
                                debug!("queue idle, committing");
                                if let Err(e) = writer.commit() {
                                    error!("{}", e);
                                }
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                writer.commit()
            })
            .map_err(Error::from)?;
        info!("indexing queue started");
        Ok(IndexingQueue {
            sender: Some(sender),
            worker: Some(worker),
            writer,
        })
    }

    pub fn writer(&self) -> &Arc<IndexWriter> {
        &self.writer
    }

    pub fn submit(&self, priority: Priority, task: IndexTask) -> Result<()> {
        match self.sender {
            Some(ref sender) => sender.send((priority, task)).map_err(|_| Error::QueueClosed),
            None => Err(Error::QueueClosed),
        }
    }

    pub fn add(&self, doc: Document, priority: Priority) -> Result<()> {
        self.submit(priority, IndexTask::Add(doc))
    }

    pub fn delete_uri<U: Into<String>>(&self, uri: U, priority: Priority) -> Result<()> {
        self.submit(priority, IndexTask::DeleteUri(uri.into()))
    }

    /// Tasks submitted but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    /// Applies every queued task, commits and stops the worker. Returns the
    /// result of that last commit.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.sender.take();
        match self.worker.take() {
            Some(worker) => match worker.join() {
                Ok(result) => {
                    info!("indexing queue stopped");
                    result
                }
                Err(_) => Err(Error::WorkerPanicked),
            },
            None => Ok(()),
        }
    }
}

impl Drop for IndexingQueue {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("indexing queue stopped with error: {}", e);
        }
    }
}

fn apply(writer: &IndexWriter, task: IndexTask) -> Result<()> {
    match task {
        IndexTask::Add(doc) => writer.add_document(doc),
        IndexTask::Delete(term) => writer.delete_documents(term).map(|_| ()),
        IndexTask::DeleteUri(uri) => writer.delete_document(&uri).map(|_| ()),
        IndexTask::Commit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::UAX29Analyzer;
    use crate::config::IndexConfig;
    use crate::directory::Directory;
    use crate::generation::Generation;
    use crate::reader::IndexReader;
    use std::time::Duration;
    use tempfile::TempDir;

    fn start(tmp: &TempDir, commit_delay_ms: u64) -> (Arc<Directory>, IndexingQueue) {
        Generation::default().write(tmp.path()).unwrap();
        let dir = Arc::new(Directory::new(tmp.path()));
        let config = IndexConfig {
            commit_delay_ms,
            ..IndexConfig::default()
        };
        let writer = Arc::new(IndexWriter::new(dir.clone(), config, Box::new(UAX29Analyzer)));
        (dir, IndexingQueue::start(writer).unwrap())
    }

    #[test]
    fn shutdown_commits_everything() {
        let tmp = TempDir::new().unwrap();
        let (dir, queue) = start(&tmp, 60_000);
        for i in 0..5 {
            queue.add(Document::new(format!("doc{}", i)), Priority::Delayed).unwrap();
        }
        queue.delete_uri("doc3", Priority::Delayed).unwrap();
        queue.shutdown().unwrap();
        assert_eq!(4, IndexReader::open(dir).unwrap().num_docs().unwrap());
    }

    #[test]
    fn immediate_tasks_commit() {
        let tmp = TempDir::new().unwrap();
        let (dir, queue) = start(&tmp, 60_000);
        queue.add(Document::new("a"), Priority::Immediate).unwrap();
        let mut committed = false;
        for _ in 0..200 {
            if Generation::read(dir.path()).unwrap().version > 0 {
                committed = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(committed);
        queue.shutdown().unwrap();
    }

    #[test]
    fn idle_queue_commits_delayed_tasks() {
        let tmp = TempDir::new().unwrap();
        let (dir, queue) = start(&tmp, 20);
        queue.add(Document::new("a"), Priority::Delayed).unwrap();
        let mut committed = false;
        for _ in 0..200 {
            if Generation::read(dir.path()).unwrap().version > 0 {
                committed = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(committed);
        assert!(!queue.writer().has_uncommitted_changes());
    }
}
