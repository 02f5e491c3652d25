//! Buffered write strategy
//!
//! `write` only enqueues. A background worker task owns the queue and hands it to
//! the [`RotatingFile`] in batches: on a timer, when the queue reaches its high
//! watermark, on an explicit flush and on close. At most one batch is in flight at a
//! time, so records reach the file in the order they were written.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::file::{PendingRecord, RotatingFile};
use crate::error::{ErrorContext, ErrorHandler, Operation, WriterError};
use crate::record::{Formatter, LogRecord};

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_HIGH_WATERMARK: usize = 256;

/// Tuning for the buffered strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Pending records are flushed at least this often
    pub flush_interval: Duration,
    /// Queue length that triggers an early flush
    pub high_watermark: usize,
    /// Flush immediately after an ERROR record
    pub sync_error_records: bool,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            high_watermark: DEFAULT_HIGH_WATERMARK,
            sync_error_records: false,
        }
    }
}

enum Command {
    Write { entry: PendingRecord, urgent: bool },
    Flush(oneshot::Sender<()>),
    Rotate(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// Handle to the background flush worker
pub struct BufferedWriter {
    commands: mpsc::UnboundedSender<Command>,
    worker: Option<JoinHandle<()>>,
    file: Arc<Mutex<RotatingFile>>,
    active_path: PathBuf,
    formatter: Arc<dyn Formatter>,
    options: BufferOptions,
    errors: ErrorHandler,
    runtime: Handle,
}

impl BufferedWriter {
    /// Start the flush worker on `runtime`
    pub fn new(
        file: RotatingFile,
        formatter: Arc<dyn Formatter>,
        options: BufferOptions,
        errors: ErrorHandler,
        runtime: Handle,
    ) -> Self {
        let active_path = file.active_path().to_path_buf();
        let file = Arc::new(Mutex::new(file));
        let (commands, worker) = spawn_worker(&runtime, &file, options, &errors);
        Self {
            commands,
            worker: Some(worker),
            file,
            active_path,
            formatter,
            options,
            errors,
            runtime,
        }
    }

    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    pub fn options(&self) -> &BufferOptions {
        &self.options
    }

    /// Queue a record. Returns without touching the disk.
    pub fn write(&mut self, record: LogRecord) {
        self.ensure_worker();

        let entry = PendingRecord::new(record, self.formatter.as_ref());
        let urgent = self.options.sync_error_records && entry.record.level.is_error();
        if let Err(mpsc::error::SendError(Command::Write { entry, .. })) =
            self.commands.send(Command::Write { entry, urgent })
        {
            (self.errors)(
                &WriterError::Closed,
                &ErrorContext::new(Operation::Write, &self.active_path),
                Some(&entry.record),
            );
        }
    }

    /// Write out every queued record and flush the file
    pub async fn flush(&mut self) {
        self.ensure_worker();
        self.request(Command::Flush).await;
    }

    /// Rotate after writing out every queued record
    pub async fn force_rotate(&mut self) {
        self.ensure_worker();
        self.request(Command::Rotate).await;
    }

    /// Drain the queue, close the file and stop the worker
    pub async fn close(&mut self) {
        self.request(Command::Close).await;
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                report_join_error(&self.errors, Operation::Close, e);
            }
        }
    }

    async fn request(&self, command: fn(oneshot::Sender<()>) -> Command) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(command(done)).is_err() {
            return;
        }
        let _ = finished.await;
    }

    /// A closed writer comes back to life on the next write, flush or rotation
    fn ensure_worker(&mut self) {
        if self.commands.is_closed() {
            self.restart();
        }
    }

    fn restart(&mut self) {
        debug!(path = %self.active_path.display(), "restarting flush worker");
        let (commands, worker) = spawn_worker(&self.runtime, &self.file, self.options, &self.errors);
        self.commands = commands;
        self.worker = Some(worker);
    }
}

fn spawn_worker(
    runtime: &Handle,
    file: &Arc<Mutex<RotatingFile>>,
    options: BufferOptions,
    errors: &ErrorHandler,
) -> (mpsc::UnboundedSender<Command>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let worker = FlushWorker {
        commands: receiver,
        file: Arc::clone(file),
        options,
        errors: Arc::clone(errors),
        queue: Vec::new(),
        in_flight: None,
    };
    (sender, runtime.spawn(worker.run()))
}

fn lock(file: &Mutex<RotatingFile>) -> MutexGuard<'_, RotatingFile> {
    file.lock().unwrap_or_else(PoisonError::into_inner)
}

fn report_join_error(errors: &ErrorHandler, operation: Operation, error: JoinError) {
    errors(
        &WriterError::Worker(error.to_string()),
        &ErrorContext::without_path(operation),
        None,
    );
}

struct FlushWorker {
    commands: mpsc::UnboundedReceiver<Command>,
    file: Arc<Mutex<RotatingFile>>,
    options: BufferOptions,
    errors: ErrorHandler,
    queue: Vec<PendingRecord>,
    /// The batch currently being written, if any
    in_flight: Option<JoinHandle<()>>,
}

impl FlushWorker {
    async fn run(mut self) {
        let period = self.options.flush_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Write { entry, urgent }) => {
                        self.queue.push(entry);
                        if urgent {
                            self.drain().await;
                            self.with_file(RotatingFile::flush).await;
                        } else if self.queue.len() >= self.options.high_watermark {
                            self.start_flush();
                        }
                    }
                    Some(Command::Flush(done)) => {
                        self.drain().await;
                        self.with_file(RotatingFile::flush).await;
                        ticker.reset();
                        let _ = done.send(());
                    }
                    Some(Command::Rotate(done)) => {
                        self.drain().await;
                        self.with_file(RotatingFile::force_rotate).await;
                        let _ = done.send(());
                    }
                    Some(Command::Close(done)) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.start_flush(),
                result = wait_for(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.in_flight = None;
                    if let Err(e) = result {
                        report_join_error(&self.errors, Operation::Flush, e);
                    }
                    if self.queue.len() >= self.options.high_watermark {
                        self.start_flush();
                    }
                }
            }
        }
    }

    /// Hand the whole queue to a blocking task, unless a batch is already in flight
    fn start_flush(&mut self) {
        if self.in_flight.is_some() || self.queue.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.queue);
        let file = Arc::clone(&self.file);
        self.in_flight = Some(tokio::task::spawn_blocking(move || {
            let mut file = lock(&file);
            for entry in &batch {
                file.append(entry);
            }
        }));
    }

    async fn finish_in_flight(&mut self) {
        if let Some(batch) = self.in_flight.take() {
            if let Err(e) = batch.await {
                report_join_error(&self.errors, Operation::Flush, e);
            }
        }
    }

    /// Write out everything queued so far, in order
    async fn drain(&mut self) {
        self.finish_in_flight().await;
        self.start_flush();
        self.finish_in_flight().await;
    }

    async fn shutdown(&mut self) {
        self.drain().await;
        self.with_file(RotatingFile::close).await;
    }

    async fn with_file(&self, op: fn(&mut RotatingFile)) {
        let file = Arc::clone(&self.file);
        let result = tokio::task::spawn_blocking(move || op(&mut lock(&file))).await;
        if let Err(e) = result {
            report_join_error(&self.errors, Operation::Flush, e);
        }
    }
}

async fn wait_for(in_flight: &mut Option<JoinHandle<()>>) -> Result<(), JoinError> {
    match in_flight {
        Some(batch) => batch.await,
        None => std::future::pending().await,
    }
}
