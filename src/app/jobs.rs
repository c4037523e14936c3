//! Background work: file reads and archive generation.
//!
//! Workers get owned inputs and report back over one channel. The session
//! drains the channel from `tick`, so results are only applied on the frame
//! thread.

use crate::assets::{self, AssetError};
use crate::export::{ExportError, ExportReport, ExportSnapshot};
use crate::scene::{EntityId, TextureSlotKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

#[derive(Debug)]
pub enum JobOutput {
    ModelRead {
        file_name: String,
        result: Result<Vec<u8>, AssetError>,
    },
    TextureRead {
        entity: EntityId,
        slot: TextureSlotKind,
        file_name: String,
        result: Result<Vec<u8>, AssetError>,
    },
    Export(Result<ExportReport, ExportError>),
    /// The worker panicked before producing a result.
    Panicked(JobKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    ModelRead,
    TextureRead,
    Export,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            JobKind::ModelRead => "model-read",
            JobKind::TextureRead => "texture-read",
            JobKind::Export => "export",
        }
    }
}

/// Sends the worker's output, or `Panicked` if it is dropped before that.
struct Reporter {
    tx: Sender<JobOutput>,
    kind: JobKind,
    sent: bool,
}

impl Reporter {
    fn send(mut self, output: JobOutput) {
        self.sent = true;
        // The receiver only goes away with the session.
        let _ = self.tx.send(output);
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if !self.sent {
            log::error!("{} worker ended without a result", self.kind.name());
            let _ = self.tx.send(JobOutput::Panicked(self.kind));
        }
    }
}

pub struct JobQueue {
    tx: Sender<JobOutput>,
    rx: Receiver<JobOutput>,
    pending: usize,
    export_cancel: Option<Arc<AtomicBool>>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            pending: 0,
            export_cancel: None,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn export_running(&self) -> bool {
        self.export_cancel.is_some()
    }

    fn spawn(&mut self, kind: JobKind, work: impl FnOnce() -> JobOutput + Send + 'static) {
        let reporter = Reporter {
            tx: self.tx.clone(),
            kind,
            sent: false,
        };
        let spawned = thread::Builder::new()
            .name(kind.name().to_string())
            .spawn(move || {
                let output = work();
                reporter.send(output);
            });
        if let Err(err) = spawned {
            log::error!("Failed to start {} worker: {}", kind.name(), err);
        }
        // A worker that never ran still reports through its dropped reporter.
        self.pending += 1;
    }

    pub fn read_model(&mut self, path: PathBuf) {
        let file_name = file_name_of(&path);
        log::debug!("Queued model read {}", path.display());
        self.spawn(JobKind::ModelRead, move || JobOutput::ModelRead {
            file_name,
            result: assets::read_file(&path),
        });
    }

    pub fn read_texture(&mut self, entity: EntityId, slot: TextureSlotKind, path: PathBuf) {
        let file_name = file_name_of(&path);
        log::debug!("Queued {:?} texture read {} for {}", slot, path.display(), entity);
        self.spawn(JobKind::TextureRead, move || JobOutput::TextureRead {
            entity,
            slot,
            file_name,
            result: assets::read_file(&path),
        });
    }

    /// Starts an export unless one is already running. Returns its cancel flag.
    pub fn export(&mut self, snapshot: ExportSnapshot) -> Option<Arc<AtomicBool>> {
        if self.export_running() {
            log::warn!("Export already in progress");
            return None;
        }
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        self.spawn(JobKind::Export, move || JobOutput::Export(snapshot.run(&flag)));
        self.export_cancel = Some(cancel.clone());
        Some(cancel)
    }

    pub fn cancel_export(&self) {
        if let Some(cancel) = &self.export_cancel {
            cancel.store(true, Ordering::Relaxed);
        }
    }

    fn received(&mut self, output: &JobOutput) {
        self.pending = self.pending.saturating_sub(1);
        if matches!(output, JobOutput::Export(_) | JobOutput::Panicked(JobKind::Export)) {
            self.export_cancel = None;
        }
    }

    /// Finished jobs, without blocking.
    pub fn drain(&mut self) -> Vec<JobOutput> {
        let mut done = Vec::new();
        while let Ok(output) = self.rx.try_recv() {
            self.received(&output);
            done.push(output);
        }
        done
    }

    /// Blocks until every queued job has reported.
    pub fn wait_all(&mut self) -> Vec<JobOutput> {
        let mut done = Vec::new();
        while self.pending > 0 {
            match self.rx.recv() {
                Ok(output) => {
                    self.received(&output);
                    done.push(output);
                }
                Err(_) => break,
            }
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneRegistry;

    #[test]
    fn test_missing_file_reports_read_error() {
        let mut jobs = JobQueue::new();
        jobs.read_model(PathBuf::from("/definitely/not/here/model.glb"));
        assert_eq!(jobs.pending(), 1);
        let done = jobs.wait_all();
        assert_eq!(jobs.pending(), 0);
        match &done[..] {
            [JobOutput::ModelRead { file_name, result }] => {
                assert_eq!(file_name, "model.glb");
                assert!(matches!(result, Err(AssetError::Read { .. })));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_one_export_at_a_time() {
        let mut jobs = JobQueue::new();
        let dir = std::env::temp_dir().join(format!("scene_forge_jobs_{}", std::process::id()));
        let snapshot = ExportSnapshot::capture(&SceneRegistry::new(), &dir, "jobs.zip");
        let cancel = jobs.export(snapshot.clone()).unwrap();
        cancel.store(true, Ordering::Relaxed);
        assert!(jobs.export(snapshot).is_none());

        let done = jobs.wait_all();
        assert!(matches!(done[..], [JobOutput::Export(_)]));
        assert!(!jobs.export_running());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_panicked_worker_still_reports() {
        let mut jobs = JobQueue::new();
        jobs.export_cancel = Some(Arc::new(AtomicBool::new(false)));
        jobs.spawn(JobKind::Export, || panic!("worker failure"));
        assert_eq!(jobs.pending(), 1);

        let done = jobs.wait_all();
        assert!(matches!(done[..], [JobOutput::Panicked(JobKind::Export)]));
        assert_eq!(jobs.pending(), 0);
        assert!(!jobs.export_running());
    }
}
