//! Report assembly
//!
//! Accumulates formatted lines per section in arrival order, removes
//! repeated lines where a category asks for it, and renders the final
//! CRLF text report.

pub mod timeline;

pub use timeline::{Timeline, TimelineRow};

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

const RULE: &str = "==================";
const LOOPBACK_HOST: &str = "localhost";
const ERROR_GAP_LINES: usize = 6;

/// Report section in render order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Processes,
    Files,
    Registry,
    Network,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Processes,
        Section::Files,
        Section::Registry,
        Section::Network,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::Processes => "Processes Created:",
            Section::Files => "File Activity:",
            Section::Registry => "Registry Activity:",
            Section::Network => "Network Traffic:",
        }
    }

    fn index(self) -> usize {
        match self {
            Section::Processes => 0,
            Section::Files => 1,
            Section::Registry => 2,
            Section::Network => 3,
        }
    }
}

/// Header block values; `None` fields are left out of the render
#[derive(Debug, Clone, Default)]
pub struct ReportHeader {
    pub version: String,
    pub command_line: Option<String>,
    pub capture: Option<Duration>,
    pub conversion: Option<Duration>,
    pub analysis: Option<Duration>,
    pub generated_at: Option<String>,
}

impl ReportHeader {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "-=] Sandbox Analysis Report generated by procsift v{}",
            self.version
        )];
        if let Some(at) = &self.generated_at {
            lines.push(format!("-=] Generated at: {}", at));
        }
        lines.push(String::new());

        if let Some(cmd) = &self.command_line {
            lines.push(format!("-=] Analysis of command line: {}", cmd));
        }
        let timings = [
            ("Execution time", self.capture),
            ("Processing time", self.conversion),
            ("Analysis time", self.analysis),
        ];
        for (label, value) in timings {
            if let Some(value) = value {
                lines.push(format!("-=] {}: {:.2} seconds", label, value.as_secs_f64()));
            }
        }
        lines.push(String::new());
        lines
    }
}

/// Collects report lines during a pass
#[derive(Debug, Default)]
pub struct ReportBuilder {
    sections: [Vec<String>; 4],
    seen: [HashSet<String>; 4],
    hosts: BTreeSet<String>,
    errors: Vec<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: Section, line: String) {
        self.sections[section.index()].push(line);
    }

    /// Append `line` unless the section already holds the same text.
    /// Returns false when the line was a repeat.
    pub fn push_unique(&mut self, section: Section, line: String) -> bool {
        let idx = section.index();
        if !self.seen[idx].insert(line.clone()) {
            return false;
        }
        self.sections[idx].push(line);
        true
    }

    /// Record the host part of a `host:port` remote endpoint
    pub fn add_host(&mut self, remote: &str) {
        let host = remote.split(':').next().unwrap_or_default().trim();
        if !host.is_empty() && host != LOOPBACK_HOST {
            self.hosts.insert(host.to_string());
        }
    }

    /// Keep an unparsed line verbatim for the Errors section
    pub fn push_error(&mut self, raw: &str) {
        self.errors.push(raw.trim().to_string());
    }

    pub fn finish(self) -> Report {
        Report {
            sections: self.sections,
            hosts: self.hosts,
            errors: self.errors,
        }
    }
}

/// Finished report body
#[derive(Debug, Clone)]
pub struct Report {
    sections: [Vec<String>; 4],
    hosts: BTreeSet<String>,
    errors: Vec<String>,
}

impl Report {
    pub fn section(&self, section: Section) -> &[String] {
        &self.sections[section.index()]
    }

    /// Distinct remote hosts, sorted
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn lines(&self, header: &ReportHeader) -> Vec<String> {
        let mut lines = header.lines();

        for (i, section) in Section::ALL.into_iter().enumerate() {
            if i > 0 {
                lines.push(String::new());
            }
            lines.push(section.title().to_string());
            lines.push(RULE.to_string());
            lines.extend(self.section(section).iter().cloned());
        }

        lines.push(String::new());
        lines.push("Unique Hosts:".to_string());
        lines.push(RULE.to_string());
        lines.extend(self.hosts.iter().cloned());

        if !self.errors.is_empty() {
            lines.extend(std::iter::repeat(String::new()).take(ERROR_GAP_LINES));
            lines.push("ERRORS DETECTED".to_string());
            lines.push("The following items could not be parsed correctly:".to_string());
            lines.extend(self.errors.iter().cloned());
        }
        lines
    }

    /// CRLF-joined report text
    pub fn render(&self, header: &ReportHeader) -> String {
        self.lines(header).join("\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_unique_is_per_section() {
        let mut builder = ReportBuilder::new();
        assert!(builder.push_unique(Section::Network, "[UDP] a:1 > 8.8.8.8:53".into()));
        assert!(!builder.push_unique(Section::Network, "[UDP] a:1 > 8.8.8.8:53".into()));
        assert!(builder.push_unique(Section::Registry, "[UDP] a:1 > 8.8.8.8:53".into()));
        builder.push(Section::Files, "[DeleteFile] a:1 > x".into());
        builder.push(Section::Files, "[DeleteFile] a:1 > x".into());

        let report = builder.finish();
        assert_eq!(report.section(Section::Network).len(), 1);
        assert_eq!(report.section(Section::Files).len(), 2);
    }

    #[test]
    fn test_hosts_sorted_without_loopback() {
        let mut builder = ReportBuilder::new();
        builder.add_host("10.0.0.9:443");
        builder.add_host("localhost:80");
        builder.add_host("1.2.3.4:53");
        builder.add_host("10.0.0.9:80");
        let report = builder.finish();
        assert_eq!(report.hosts().collect::<Vec<_>>(), vec!["1.2.3.4", "10.0.0.9"]);
    }

    #[test]
    fn test_empty_report_keeps_every_header() {
        let report = ReportBuilder::new().finish();
        let text = report.render(&ReportHeader::new("1.0.0"));
        for title in [
            "Processes Created:",
            "File Activity:",
            "Registry Activity:",
            "Network Traffic:",
            "Unique Hosts:",
        ] {
            assert!(text.contains(title), "missing {}", title);
        }
        assert!(!text.contains("ERRORS DETECTED"));
        assert!(!text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_header_omits_unmeasured_timings() {
        let mut header = ReportHeader::new("1.0.0");
        header.analysis = Some(Duration::from_millis(1500));
        header.command_line = Some(r"C:\mal.exe -x".into());
        let text = ReportBuilder::new().finish().render(&header);

        assert!(text.starts_with("-=] Sandbox Analysis Report generated by procsift v1.0.0"));
        assert!(text.contains(r"-=] Analysis of command line: C:\mal.exe -x"));
        assert!(text.contains("-=] Analysis time: 1.50 seconds"));
        assert!(!text.contains("Execution time"));
        assert!(!text.contains("Processing time"));
    }

    #[test]
    fn test_errors_section_keeps_raw_lines() {
        let mut builder = ReportBuilder::new();
        builder.push_error("\"10:00\",\"x.exe\",\"1\"  ");
        let lines = builder.finish().lines(&ReportHeader::new("1.0.0"));
        let idx = lines.iter().position(|l| l == "ERRORS DETECTED").unwrap();
        assert!(lines[idx - ERROR_GAP_LINES..idx].iter().all(String::is_empty));
        assert_eq!(lines.last().unwrap(), "\"10:00\",\"x.exe\",\"1\"");
    }

    #[test]
    fn test_section_order() {
        let mut builder = ReportBuilder::new();
        builder.push(Section::Network, "net".into());
        builder.push(Section::Processes, "proc".into());
        let lines = builder.finish().lines(&ReportHeader::new("1.0.0"));
        let pos = |s: &str| lines.iter().position(|l| l == s).unwrap();
        assert!(pos("Processes Created:") < pos("proc"));
        assert!(pos("proc") < pos("File Activity:"));
        assert!(pos("Network Traffic:") < pos("net"));
        assert!(pos("net") < pos("Unique Hosts:"));
    }
}
