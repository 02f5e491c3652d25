//! Synchronous write strategy
//!
//! Every record is formatted, checked against the rotation triggers and handed to
//! the OS before `write` returns.

use std::sync::Arc;

use super::file::{PendingRecord, RotatingFile};
use crate::record::{Formatter, LogRecord};

pub struct SyncWriter {
    file: RotatingFile,
    formatter: Arc<dyn Formatter>,
}

impl SyncWriter {
    pub fn new(file: RotatingFile, formatter: Arc<dyn Formatter>) -> Self {
        Self { file, formatter }
    }

    pub fn write(&mut self, record: LogRecord) {
        let entry = PendingRecord::new(record, self.formatter.as_ref());
        self.file.append(&entry);
    }

    pub fn flush(&mut self) {
        self.file.flush();
    }

    pub fn close(&mut self) {
        self.file.close();
    }

    pub fn force_rotate(&mut self) {
        self.file.force_rotate();
    }

    pub fn file(&self) -> &RotatingFile {
        &self.file
    }
}
