//! Record reader
//!
//! Streams the capture tool's CSV export one line at a time. Lines that do
//! not open with a quote are framing noise the tool interleaves with real
//! records (continuation lines for multi-line process fields) and are
//! skipped rather than reported.
//!
//! Fields are split on the literal `","` sequence. A value that itself
//! contains that sequence splits into extra fields; this is a known
//! limitation of the export dialect and is kept as-is.

use crate::models::RawRecord;
use std::io::{self, BufRead};

const FIELD_DELIMITER: &str = "\",\"";
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Lazy, single-pass iterator over the records of a line source
pub struct RecordReader<R> {
    source: R,
    line_number: usize,
    skipped: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            line_number: 0,
            skipped: 0,
            buf: Vec::new(),
        }
    }

    /// Number of framing lines skipped so far
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.source.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err)),
            }
            self.line_number += 1;

            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim_end_matches(['\r', '\n']);
            let line = if self.line_number == 1 {
                line.trim_start_matches(BYTE_ORDER_MARK)
            } else {
                line
            };

            match parse_line(line) {
                Some(fields) => {
                    return Some(Ok(RawRecord {
                        line_number: self.line_number,
                        raw: line.to_string(),
                        fields,
                    }))
                }
                None => {
                    if !line.trim().is_empty() {
                        tracing::trace!(
                            target: "reader",
                            line = self.line_number,
                            "Skipping non-record line"
                        );
                    }
                    self.skipped += 1;
                }
            }
        }
    }
}

/// Split one line into fields, or `None` when it is not a record line.
pub fn parse_line(line: &str) -> Option<Vec<String>> {
    let inner = line.trim().strip_prefix('"')?;
    // Exactly one closing quote, so an empty last field survives
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    Some(inner.split(FIELD_DELIMITER).map(str::to_string).collect())
}
