//! Per-frame session logging
//!
//! A [`FrameLogSink`] receives one [`FrameRecord`] per processed frame.
//! Writers apply the log rounding (time to 2 decimals, ratios to 3) and emit
//! a header before the first record.

use crate::error::ComputeError;
use crate::types::FrameRecord;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column names, in order, of the session log
pub const LOG_FIELDS: [&str; 6] = ["Time", "EAR", "MAR", "Blinks", "Yawns", "Drowsy"];

/// Schema tag written into the NDJSON header line
pub const FRAME_LOG_SCHEMA: &str = "drowsiness.frame_log.v1";

/// Append-only destination for frame records
pub trait FrameLogSink: Send {
    fn append(&mut self, record: &FrameRecord) -> Result<(), ComputeError>;

    fn flush(&mut self) -> Result<(), ComputeError> {
        Ok(())
    }
}

/// CSV session log with a header row
pub struct CsvFrameLog<W: Write + Send> {
    writer: W,
    header_written: bool,
}

impl CsvFrameLog<BufWriter<File>> {
    /// Create (truncate) a CSV log file
    pub fn create(path: &Path) -> Result<Self, ComputeError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> CsvFrameLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<(), ComputeError> {
        writeln!(self.writer, "{}", LOG_FIELDS.join(","))?;
        self.header_written = true;
        Ok(())
    }
}

impl<W: Write + Send> FrameLogSink for CsvFrameLog<W> {
    fn append(&mut self, record: &FrameRecord) -> Result<(), ComputeError> {
        if !self.header_written {
            self.write_header()?;
        }
        writeln!(self.writer, "{}", format_csv_row(record))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ComputeError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Format one record as a CSV row (no trailing newline)
pub fn format_csv_row(record: &FrameRecord) -> String {
    format!(
        "{:.2},{:.3},{:.3},{},{},{}",
        record.timestamp,
        record.ear,
        record.mar,
        record.total_blinks,
        record.total_yawns,
        u8::from(record.is_drowsy)
    )
}

#[derive(Serialize)]
struct NdjsonHeader<'a> {
    schema: &'a str,
    session_id: &'a str,
    fields: [&'a str; 6],
}

#[derive(Serialize)]
struct NdjsonRow {
    time: f64,
    ear: f64,
    mar: f64,
    blinks: u32,
    yawns: u32,
    drowsy: u8,
}

/// Newline-delimited JSON session log; the first line names the session
pub struct NdjsonFrameLog<W: Write + Send> {
    writer: W,
    session_id: String,
    header_written: bool,
}

impl NdjsonFrameLog<BufWriter<File>> {
    pub fn create(path: &Path, session_id: &str) -> Result<Self, ComputeError> {
        Ok(Self::new(BufWriter::new(File::create(path)?), session_id))
    }
}

impl<W: Write + Send> NdjsonFrameLog<W> {
    pub fn new(writer: W, session_id: &str) -> Self {
        Self {
            writer,
            session_id: session_id.to_string(),
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> FrameLogSink for NdjsonFrameLog<W> {
    fn append(&mut self, record: &FrameRecord) -> Result<(), ComputeError> {
        if !self.header_written {
            let header = NdjsonHeader {
                schema: FRAME_LOG_SCHEMA,
                session_id: &self.session_id,
                fields: LOG_FIELDS,
            };
            serde_json::to_writer(&mut self.writer, &header)?;
            self.writer.write_all(b"\n")?;
            self.header_written = true;
        }

        let rounded = record.rounded();
        let row = NdjsonRow {
            time: rounded.timestamp,
            ear: rounded.ear,
            mar: rounded.mar,
            blinks: rounded.total_blinks,
            yawns: rounded.total_yawns,
            drowsy: u8::from(rounded.is_drowsy),
        };
        serde_json::to_writer(&mut self.writer, &row)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ComputeError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryFrameLog {
    pub records: Vec<FrameRecord>,
}

impl FrameLogSink for MemoryFrameLog {
    fn append(&mut self, record: &FrameRecord) -> Result<(), ComputeError> {
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(timestamp: f64, drowsy: bool) -> FrameRecord {
        FrameRecord {
            timestamp,
            ear: 0.18765,
            mar: 0.3,
            total_blinks: 2,
            total_yawns: 0,
            is_drowsy: drowsy,
        }
    }

    #[test]
    fn test_csv_header_once() {
        let mut log = CsvFrameLog::new(Vec::new());
        log.append(&record(1700000000.123, false)).unwrap();
        log.append(&record(1700000000.456, true)).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Time,EAR,MAR,Blinks,Yawns,Drowsy",
                "1700000000.12,0.188,0.300,2,0,0",
                "1700000000.46,0.188,0.300,2,0,1",
            ]
        );
    }

    #[test]
    fn test_csv_empty_session_has_no_header() {
        let log = CsvFrameLog::new(Vec::new());
        assert!(log.into_inner().is_empty());
    }

    #[test]
    fn test_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut log = CsvFrameLog::create(&path).unwrap();
        log.append(&record(12.0, false)).unwrap();
        log.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Time,EAR,MAR,Blinks,Yawns,Drowsy\n12.00,"));
    }

    #[test]
    fn test_ndjson_log() {
        let mut log = NdjsonFrameLog::new(Vec::new(), "sess-1");
        log.append(&record(5.004, true)).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        let mut lines = text.lines();
        let header: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(header["schema"], FRAME_LOG_SCHEMA);
        assert_eq!(header["session_id"], "sess-1");
        assert_eq!(header["fields"][5], "Drowsy");

        let row: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(row["time"], 5.0);
        assert_eq!(row["ear"], 0.188);
        assert_eq!(row["drowsy"], 1);
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_memory_log() {
        let mut log = MemoryFrameLog::default();
        log.append(&record(1.0, false)).unwrap();
        assert_eq!(log.records.len(), 1);
    }
}
