//! Timeline emitter
//!
//! One comma-joined row per accepted record, in arrival order. Rows are
//! never deduplicated and the column count depends on the category.

/// `TIME,GROUP,ACTION,PROCESS,PID[,extra...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRow {
    columns: Vec<String>,
}

impl TimelineRow {
    pub fn new(timestamp: &str, group: &str, action: &str, process: &str, pid: &str) -> Self {
        Self {
            columns: vec![
                timestamp.to_string(),
                group.to_string(),
                action.to_string(),
                process.to_string(),
                pid.to_string(),
            ],
        }
    }

    pub fn column(mut self, value: impl Into<String>) -> Self {
        self.columns.push(value.into());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn to_line(&self) -> String {
        self.columns.join(",")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    rows: Vec<TimelineRow>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: TimelineRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[TimelineRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CRLF-joined rows
    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(TimelineRow::to_line)
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}
