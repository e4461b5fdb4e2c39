use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use log::{debug, error};

use super::ActionEntry;

/// Appends journal entries to a JSONL file on a background thread.
///
/// The file doubles as the archive that journal pages older than the
/// in-memory window are read back from.
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    /// `None` once stopped; later entries are not written.
    queue: Mutex<Option<Sender<ActionEntry>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FileWriter {
    /// Opens `path` in append mode up front so a bad path fails at startup.
    pub fn new(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let (queue, pending) = mpsc::channel::<ActionEntry>();
        let target = path.clone();
        let worker = thread::Builder::new()
            .name("journal-writer".to_string())
            .spawn(move || drain(file, pending, &target))?;
        Ok(FileWriter {
            path,
            queue: Mutex::new(Some(queue)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn send(&self, entry: ActionEntry) {
        let queue = match self.queue.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        if let Some(queue) = queue.as_ref() {
            if queue.send(entry).is_err() {
                error!("Journal writer for {:?} is gone; entry not archived", self.path);
            }
        }
    }

    /// Close the queue and hand back the worker, which exits once everything
    /// queued so far is on disk.
    pub(crate) fn stop(&self) -> Option<JoinHandle<()>> {
        let closed = match self.queue.lock() {
            Ok(mut g) => g.take(),
            Err(e) => e.into_inner().take(),
        };
        drop(closed);
        match self.worker.lock() {
            Ok(mut g) => g.take(),
            Err(e) => e.into_inner().take(),
        }
    }
}

/// Writes whatever has queued up, then flushes once per batch.
fn drain(file: File, pending: Receiver<ActionEntry>, path: &Path) {
    let mut out = BufWriter::new(file);
    while let Ok(first) = pending.recv() {
        let mut batch = vec![first];
        batch.extend(pending.try_iter());
        for entry in &batch {
            let line = match serde_json::to_string(entry) {
                Ok(line) => line,
                Err(e) => {
                    error!("Journal entry {} not encodable: {}", entry.seq, e);
                    continue;
                }
            };
            if let Err(e) = writeln!(out, "{line}") {
                error!("Appending entry {} to {:?} failed: {}", entry.seq, path, e);
            }
        }
        if let Err(e) = out.flush() {
            error!("Flushing {:?} failed: {}", path, e);
        }
        debug!("Archived {} journal entries", batch.len());
    }
}
