//! The document thread: a dedicated OS thread that owns the engine.
//!
//! Hosts are not thread-safe, so the engine is built on this thread and never
//! leaves it. Callers submit closures and await the reply; jobs run one at a
//! time in submission order.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use hwp_host_core::DocumentHost;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

type Job<H> = Box<dyn FnOnce(&mut Engine<H>) + Send>;

pub struct DocumentThread<H: DocumentHost + 'static> {
    sender: Option<mpsc::UnboundedSender<Job<H>>>,
    handle: Option<JoinHandle<()>>,
}

impl<H: DocumentHost + 'static> DocumentThread<H> {
    /// Start the thread. `build` runs on the new thread to create the engine.
    pub fn spawn<F>(build: F) -> Result<Self>
    where
        F: FnOnce() -> Engine<H> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job<H>>();
        let handle = thread::Builder::new()
            .name("hwp-document".to_string())
            .spawn(move || {
                let mut engine = build();
                debug!("Document thread started");
                while let Some(job) = receiver.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(|| job(&mut engine))).is_err() {
                        error!("Document job panicked");
                    }
                }
                engine.shutdown();
                info!("Document thread stopped");
            })
            .map_err(|e| EngineError::Worker(format!("failed to start document thread: {}", e)))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Run `job` on the document thread and wait for its result.
    pub async fn run<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Engine<H>) -> Result<T> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| EngineError::Worker("document thread is shut down".to_string()))?;
        sender
            .send(Box::new(move |engine: &mut Engine<H>| {
                // The caller may have stopped waiting
                let _ = reply.send(job(engine));
            }))
            .map_err(|_| EngineError::Worker("document thread has stopped".to_string()))?;

        response
            .await
            .map_err(|_| EngineError::Worker("document job ended without a reply".to_string()))?
    }

    /// Stop accepting jobs, drain the queue, and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Document thread panicked during shutdown");
            }
        }
    }
}

impl<H: DocumentHost + 'static> Drop for DocumentThread<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwp_host_local::{LocalStyleStore, LocalTemplateStore, MemoryHost};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn spawn(temp_dir: &TempDir) -> DocumentThread<MemoryHost> {
        let root = temp_dir.path().to_path_buf();
        DocumentThread::spawn(move || {
            Engine::new(
                MemoryHost::new(),
                Arc::new(LocalStyleStore::new(root.join("styles"))),
                Arc::new(LocalTemplateStore::new(
                    root.join("templates"),
                    root.join("output"),
                    root.join("work"),
                )),
            )
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_jobs_run_on_one_thread() {
        let temp_dir = TempDir::new().unwrap();
        let worker = spawn(&temp_dir);
        let first = worker
            .run(|_| Ok(thread::current().name().map(str::to_string)))
            .await
            .unwrap();
        let second = worker
            .run(|_| Ok(thread::current().name().map(str::to_string)))
            .await
            .unwrap();
        assert_eq!(first.as_deref(), Some("hwp-document"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_errors_come_back() {
        let temp_dir = TempDir::new().unwrap();
        let worker = spawn(&temp_dir);
        let result = worker.run(|engine| engine.list_fields()).await;
        assert!(matches!(result, Err(EngineError::NoSession)));
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_thread_alive() {
        let temp_dir = TempDir::new().unwrap();
        let worker = spawn(&temp_dir);
        let result: Result<()> = worker.run(|_| panic!("boom")).await;
        assert!(matches!(result, Err(EngineError::Worker(_))));
        assert!(worker.run(|engine| Ok(engine.session().is_none())).await.unwrap());
    }
}
