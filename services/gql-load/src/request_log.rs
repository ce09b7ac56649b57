//! Asynchronous request/response log.
//!
//! Workers hand entries to a bounded queue and never wait on disk; a single
//! background task writes them out as CSV rows. When the queue is full the
//! entry is dropped and counted, so a slow disk cannot stall the request path
//! or grow memory without bound.

use chrono::Local;
use load_common::LoadResult;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Entries buffered between workers and the writer.
pub const QUEUE_CAPACITY: usize = 1000;

/// Header row written once at the top of every log.
pub const HEADER: [&str; 4] = ["Date", "Status", "Request", "Response"];

type Destination = Box<dyn AsyncWrite + Send + Unpin>;

/// A single logged request.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub date: String,
    /// `None` when no HTTP response arrived.
    pub status: Option<u16>,
    pub request: String,
    pub response: String,
}

impl LogEntry {
    /// Entry stamped with the current local time.
    pub fn now(status: Option<u16>, request: String, response: String) -> Self {
        Self {
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            status,
            request,
            response,
        }
    }

    fn to_csv_row(&self) -> String {
        let status = self.status.map(|s| s.to_string()).unwrap_or_default();
        csv_row(&[&self.date, &status, &self.request, &self.response])
    }
}

/// Cheap, cloneable producer side handed to workers.
#[derive(Clone)]
pub struct RequestLogger {
    tx: mpsc::Sender<LogEntry>,
    dropped: Arc<AtomicU64>,
}

impl RequestLogger {
    /// Queue an entry without waiting. Drops it if the queue is full.
    pub fn log(&self, entry: LogEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owner of the log destination and its writer task.
pub struct RequestLogSink {
    logger: RequestLogger,
    rx: Option<mpsc::Receiver<LogEntry>>,
    destination: Option<Destination>,
    writer: Option<(JoinHandle<std::io::Result<u64>>, oneshot::Sender<()>)>,
    path: Option<PathBuf>,
}

impl RequestLogSink {
    /// Create (or truncate) the log file, making parent directories.
    pub async fn create(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(path).await?;
        let mut sink = Self::with_writer(BufWriter::new(file));
        sink.path = Some(path.to_path_buf());
        Ok(sink)
    }

    /// Log to any async writer.
    pub fn with_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            logger: RequestLogger {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx: Some(rx),
            destination: Some(Box::new(writer)),
            writer: None,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A producer handle for workers.
    pub fn logger(&self) -> RequestLogger {
        self.logger.clone()
    }

    /// Launch the background writer. Calling it again does nothing.
    pub fn start(&mut self) {
        let (Some(rx), Some(destination)) = (self.rx.take(), self.destination.take()) else {
            return;
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(write_entries(rx, destination, stop_rx));
        self.writer = Some((handle, stop_tx));
        debug!(path = ?self.path, "Request log writer started");
    }

    /// Stop accepting entries, write out everything queued, and close the
    /// destination.
    pub async fn stop(mut self) -> LoadResult<()> {
        // Never started: write the header so the file is still well-formed.
        if let (Some(rx), Some(destination)) = (self.rx.take(), self.destination.take()) {
            let (stop_tx, stop_rx) = oneshot::channel();
            self.writer = Some((tokio::spawn(write_entries(rx, destination, stop_rx)), stop_tx));
        }

        let dropped = self.logger.dropped();
        let Some((handle, stop_tx)) = self.writer.take() else {
            return Ok(());
        };
        drop(self.logger);
        let _ = stop_tx.send(());

        let written = match handle.await {
            Ok(result) => result?,
            Err(e) => {
                warn!(error = %e, "Request log writer task failed");
                return Ok(());
            }
        };

        if dropped > 0 {
            warn!(written, dropped, "Request log queue overflowed; entries were dropped");
        } else {
            info!(written, path = ?self.path, "Request log closed");
        }
        Ok(())
    }
}

async fn write_entries(
    mut rx: mpsc::Receiver<LogEntry>,
    mut destination: Destination,
    mut stop: oneshot::Receiver<()>,
) -> std::io::Result<u64> {
    destination.write_all(csv_row(&HEADER).as_bytes()).await?;
    let mut written = 0u64;
    let mut stopping = false;

    loop {
        let entry = if stopping {
            rx.recv().await
        } else {
            tokio::select! {
                entry = rx.recv() => entry,
                _ = &mut stop => {
                    // Refuse new entries; recv still yields what is queued.
                    stopping = true;
                    rx.close();
                    rx.recv().await
                }
            }
        };
        let Some(entry) = entry else { break };

        destination.write_all(entry.to_csv_row().as_bytes()).await?;
        written += 1;
        while let Ok(next) = rx.try_recv() {
            destination.write_all(next.to_csv_row().as_bytes()).await?;
            written += 1;
        }
        // Queue momentarily empty; push what we have to the file.
        destination.flush().await?;
    }

    destination.flush().await?;
    destination.shutdown().await?;
    Ok(written)
}

/// One RFC 4180 row, newline-terminated.
fn csv_row(fields: &[&str]) -> String {
    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            row.push('"');
            row.push_str(&field.replace('"', "\"\""));
            row.push('"');
        } else {
            row.push_str(field);
        }
    }
    row.push('\n');
    row
}
