//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use logroll::{Formatter, LogRecord, LogWriter};

/// Writes only the message, so file sizes are exact
pub struct MessageOnly;

impl Formatter for MessageOnly {
    fn format(&self, record: &LogRecord) -> String {
        record.message.clone()
    }
}

/// Every rotated file oldest first, then the active file, decompressed and joined
pub fn read_all_logs(writer: &LogWriter) -> String {
    let mut rotated = writer.rotated_files().unwrap();
    rotated.reverse();

    let mut text = String::new();
    for file in rotated {
        if file.compressed {
            GzDecoder::new(File::open(&file.path).unwrap())
                .read_to_string(&mut text)
                .unwrap();
        } else {
            text.push_str(&fs::read_to_string(&file.path).unwrap());
        }
    }
    if writer.active_path().exists() {
        text.push_str(&fs::read_to_string(writer.active_path()).unwrap());
    }
    text
}

/// Names of all entries in `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
