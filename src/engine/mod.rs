//! Analysis engine module
//!
//! Drives one pass over a record source: classify each record, apply the
//! scoped whitelist, run the category transform (with enrichment for file
//! creations) and feed the report and timeline.
//!
//! Whitelist matching always sees the raw fields. Generalization only ever
//! touches text headed for output.

mod dispatch;

pub use dispatch::replace_port_names;

use anyhow::{Context, Result};
use std::io::BufRead;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::hashing::HashWhitelist;
use crate::models::RawRecord;
use crate::normalizer::{classify, Classification, RecordReader};
use crate::report::{Report, ReportBuilder, Timeline};
use crate::reputation::ReputationLookup;
use crate::scanner::Scanner;
use crate::utils::Generalizer;
use crate::whitelist::Whitelists;
use dispatch::{Dispatch, Emission};

/// Target name for engine operational logs
const TARGET_ENGINE: &str = "engine";

/// Counters for one pass.
///
/// Every record lands in exactly one of `emitted`, `suppressed`, `ignored`
/// or `unparsed`. `deduplicated` counts emitted records whose report line
/// was a repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub records: usize,
    pub emitted: usize,
    pub suppressed: usize,
    pub deduplicated: usize,
    pub ignored: usize,
    pub unparsed: usize,
    pub skipped_lines: usize,
}

/// Everything a finished pass produced
#[derive(Debug)]
pub struct PassOutput {
    pub report: Report,
    pub timeline: Timeline,
    pub stats: PassStats,
    pub analysis: Duration,
}

#[derive(Default)]
struct Pass {
    report: ReportBuilder,
    timeline: Timeline,
    stats: PassStats,
}

impl Pass {
    fn emit(&mut self, emission: Emission) {
        let Emission {
            section,
            line,
            dedup,
            row,
            remote,
        } = emission;

        if let Some(remote) = remote {
            self.report.add_host(&remote);
        }
        if dedup {
            if !self.report.push_unique(section, line) {
                self.stats.deduplicated += 1;
            }
        } else {
            self.report.push(section, line);
        }
        self.timeline.push(row);
        self.stats.emitted += 1;
    }

    fn unparsed(&mut self, record: &RawRecord, reason: &str) {
        debug!(
            target: TARGET_ENGINE,
            line = record.line_number,
            reason = %reason,
            "Record could not be parsed"
        );
        self.report.push_error(&record.raw);
        self.stats.unparsed += 1;
    }
}

/// Classifier and dispatcher holding the run's immutable rule sets and
/// enrichment adapters
pub struct Engine {
    whitelists: Whitelists,
    hash_whitelist: HashWhitelist,
    generalizer: Generalizer,
    scanner: Option<Scanner>,
    reputation: Option<ReputationLookup>,
}

impl Engine {
    /// Engine with no hash whitelist, no generalization and no enrichment
    pub fn new(whitelists: Whitelists) -> Self {
        Self {
            whitelists,
            hash_whitelist: HashWhitelist::default(),
            generalizer: Generalizer::disabled(),
            scanner: None,
            reputation: None,
        }
    }

    pub fn with_hash_whitelist(mut self, hash_whitelist: HashWhitelist) -> Self {
        self.hash_whitelist = hash_whitelist;
        self
    }

    pub fn with_generalizer(mut self, generalizer: Generalizer) -> Self {
        self.generalizer = generalizer;
        self
    }

    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn with_reputation(mut self, reputation: ReputationLookup) -> Self {
        self.reputation = Some(reputation);
        self
    }

    pub fn reputation(&self) -> Option<&ReputationLookup> {
        self.reputation.as_ref()
    }

    /// Process every record of `source` in order.
    ///
    /// Only a read failure on the source aborts the pass.
    pub fn run<R: BufRead>(&mut self, source: R) -> Result<PassOutput> {
        let started = Instant::now();
        let mut reader = RecordReader::new(source);
        let mut pass = Pass::default();

        for record in reader.by_ref() {
            let record = record.context("Failed to read record source")?;
            pass.stats.records += 1;
            self.process(&mut pass, &record);
        }
        pass.stats.skipped_lines = reader.skipped_lines();

        let analysis = started.elapsed();
        let stats = pass.stats;
        info!(
            target: TARGET_ENGINE,
            records = stats.records,
            emitted = stats.emitted,
            suppressed = stats.suppressed,
            deduplicated = stats.deduplicated,
            ignored = stats.ignored,
            unparsed = stats.unparsed,
            skipped_lines = stats.skipped_lines,
            elapsed_ms = analysis.as_millis() as u64,
            "Pass complete"
        );

        Ok(PassOutput {
            report: pass.report.finish(),
            timeline: pass.timeline,
            stats,
            analysis,
        })
    }

    fn process(&mut self, pass: &mut Pass, record: &RawRecord) {
        let event = match classify(record) {
            Classification::Accepted(event) => event,
            Classification::Ignored => {
                trace!(target: TARGET_ENGINE, line = record.line_number, "Record ignored");
                pass.stats.ignored += 1;
                return;
            }
            Classification::Unparsed(reason) => {
                pass.unparsed(record, &reason);
                return;
            }
        };

        let scope = event.category.whitelist_scope();
        if self.whitelists.is_whitelisted(scope, &record.fields) {
            trace!(
                target: TARGET_ENGINE,
                line = record.line_number,
                scope = scope.as_str(),
                "Record whitelisted"
            );
            pass.stats.suppressed += 1;
            return;
        }

        match self.dispatch(&event) {
            Ok(Dispatch::Emit(emission)) => pass.emit(emission),
            Ok(Dispatch::HashWhitelisted(digest)) => {
                debug!(
                    target: TARGET_ENGINE,
                    file = %event.target,
                    digest = %digest,
                    "File hash whitelisted"
                );
                pass.stats.suppressed += 1;
            }
            Ok(Dispatch::Skipped(reason)) => {
                trace!(target: TARGET_ENGINE, line = record.line_number, reason, "Record skipped");
                pass.stats.ignored += 1;
            }
            Err(err) => pass.unparsed(record, &err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WhitelistScope;
    use crate::report::Section;
    use crate::reputation::{ReputationService, ServiceReply};
    use crate::utils::EnvSnapshot;
    use crate::whitelist::WhitelistRule;
    use std::cell::Cell;
    use std::fs;
    use std::io::Cursor;
    use std::rc::Rc;

    const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";

    struct CountingService {
        calls: Rc<Cell<usize>>,
    }

    impl ReputationService for CountingService {
        fn query(&self, _digest: &str) -> anyhow::Result<ServiceReply> {
            self.calls.set(self.calls.get() + 1);
            Ok(ServiceReply::Body(r#"{"response_code": 0}"#.to_string()))
        }
    }

    fn counting_lookup() -> (ReputationLookup, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let service = CountingService {
            calls: Rc::clone(&calls),
        };
        (
            ReputationLookup::new(Box::new(service), Duration::ZERO, 5),
            calls,
        )
    }

    fn csv(fields: &[&str]) -> String {
        format!("\"{}\"", fields.join("\",\""))
    }

    fn engine_with(rules: &[WhitelistRule]) -> Engine {
        Engine::new(Whitelists::compile(rules, &EnvSnapshot::default()))
    }

    fn run(engine: &mut Engine, lines: &[String]) -> PassOutput {
        engine.run(Cursor::new(lines.join("\r\n"))).unwrap()
    }

    fn create_file(path: &str) -> String {
        csv(&[
            "10:00:00.5 AM",
            "mal.exe",
            "100",
            "CreateFile",
            path,
            "SUCCESS",
            "Desired Access: Generic Write",
        ])
    }

    #[test]
    fn test_process_create_line() {
        let mut engine = engine_with(&[]);
        let out = run(
            &mut engine,
            &[csv(&[
                "10:01:02.1234567 AM",
                "mal.exe",
                "100",
                "Process Create",
                r"C:\mal.exe",
                "SUCCESS",
                r#"PID: 200, Command line: "C:\mal.exe" -x"#,
            ])],
        );

        assert_eq!(
            out.report.section(Section::Processes),
            &["[CreateProcess] mal.exe:100 > \"C:\\mal.exe -x\"\t[Child PID: 200]".to_string()]
        );
        assert_eq!(
            out.timeline.render(),
            r"10:01:02,Process,CreateProcess,mal.exe,100,C:\mal.exe -x,200"
        );
    }

    #[test]
    fn test_zero_length_value_produces_nothing() {
        let mut engine = engine_with(&[]);
        let out = run(
            &mut engine,
            &[csv(&[
                "10:00:00",
                "mal.exe",
                "100",
                "RegSetValue",
                r"HKCU\Software\Run\x",
                "SUCCESS",
                "Type: REG_SZ, Length: 0",
            ])],
        );
        assert!(out.report.section(Section::Registry).is_empty());
        assert!(out.timeline.is_empty());
        assert!(out.report.errors().is_empty());
        assert_eq!(out.stats.ignored, 1);
    }

    #[test]
    fn test_set_value_with_data() {
        let mut engine = engine_with(&[]);
        let out = run(
            &mut engine,
            &[
                csv(&[
                    "10:00:00",
                    "mal.exe",
                    "100",
                    "RegSetValue",
                    r"HKCU\Key",
                    "SUCCESS",
                    "Type: REG_BINARY, Length: 4, Data: 01 02 03 04",
                ]),
                csv(&[
                    "10:00:01",
                    "mal.exe",
                    "100",
                    "RegSetValue",
                    r"HKCU\Dump",
                    "SUCCESS",
                    "Type: REG_BINARY, Length: 200, Data: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F",
                ]),
                csv(&[
                    "10:00:02",
                    "mal.exe",
                    "100",
                    "RegSetValue",
                    r"HKCU\NoData",
                    "SUCCESS",
                    "Type: REG_BINARY, Length: 8",
                ]),
            ],
        );

        let lines = out.report.section(Section::Registry);
        assert_eq!(lines[0], r"[RegSetValue] mal.exe:100 > HKCU\Key  =  01 02 03 04");
        assert!(lines[1].ends_with("0E 0F ..."));
        assert_eq!(lines[2], r"[RegSetValue] mal.exe:100 > HKCU\NoData");
        assert_eq!(
            out.timeline.rows()[0].to_line(),
            r"10:00:00,Registry,RegSetValue,mal.exe,100,HKCU\Key,01 02 03 04"
        );
    }

    #[test]
    fn test_network_dedup_report_only() {
        let send = csv(&[
            "10:00:00",
            "mal.exe",
            "100",
            "UDP Send",
            "10.0.0.5:49152 -> 8.8.8.8:domain",
            "SUCCESS",
            "Length: 40",
        ]);
        let receive = csv(&[
            "10:00:01",
            "mal.exe",
            "100",
            "TCP Receive",
            "10.0.0.5:49153 -> localhost:https",
            "SUCCESS",
            "Length: 100",
        ]);
        let mut engine = engine_with(&[]);
        let out = run(&mut engine, &[send.clone(), send, receive]);

        assert_eq!(
            out.report.section(Section::Network),
            &[
                "[UDP] mal.exe:100 > 8.8.8.8:53".to_string(),
                "[TCP] localhost:443 > mal.exe:100".to_string(),
            ]
        );
        assert_eq!(out.timeline.len(), 3);
        assert_eq!(
            out.timeline.rows()[2].to_line(),
            "10:00:01,Network,TCP Receive,mal.exe,100,localhost:443"
        );
        assert_eq!(out.report.hosts().collect::<Vec<_>>(), vec!["8.8.8.8"]);
        assert_eq!(out.stats.deduplicated, 1);
    }

    #[test]
    fn test_create_key_dedup() {
        let key = csv(&["t", "mal.exe", "100", "RegCreateKey", r"HKCU\X", "SUCCESS"]);
        let mut engine = engine_with(&[]);
        let out = run(&mut engine, &[key.clone(), key]);
        assert_eq!(out.report.section(Section::Registry).len(), 1);
        assert_eq!(out.timeline.len(), 2);
    }

    #[test]
    fn test_hash_whitelisted_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("dropped.bin");
        fs::write(&sample, b"abc").unwrap();

        let mut hashes = HashWhitelist::default();
        hashes.insert(ABC_MD5);
        let (lookup, calls) = counting_lookup();
        let mut engine = engine_with(&[])
            .with_hash_whitelist(hashes)
            .with_reputation(lookup);

        let out = run(&mut engine, &[create_file(&sample.to_string_lossy())]);
        assert!(out.report.section(Section::Files).is_empty());
        assert!(out.timeline.is_empty());
        assert_eq!(out.stats.suppressed, 1);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_whitelist_precedes_enrichment() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("noise.tmp");
        fs::write(&sample, b"abc").unwrap();

        let (lookup, calls) = counting_lookup();
        let mut engine = engine_with(&[WhitelistRule::new(WhitelistScope::File, "noise.tmp$")])
            .with_reputation(lookup);
        let out = run(&mut engine, &[create_file(&sample.to_string_lossy())]);

        assert!(out.timeline.is_empty());
        assert_eq!(out.stats.suppressed, 1);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_one_lookup_per_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"abc").unwrap();
        fs::write(&b, b"abc").unwrap();

        let (lookup, calls) = counting_lookup();
        let mut engine = engine_with(&[]).with_reputation(lookup);
        let lines = [
            create_file(&a.to_string_lossy()),
            create_file(&b.to_string_lossy()),
            create_file(&a.to_string_lossy()),
        ];
        let out = run(&mut engine, &lines);

        assert_eq!(calls.get(), 1);
        let files = out.report.section(Section::Files);
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with(&format!("\t[MD5: {}] [VT: Not Scanned]", ABC_MD5)));
        assert!(out.timeline.rows()[0]
            .to_line()
            .ends_with(&format!(",{},,[VT: Not Scanned]", ABC_MD5)));
    }

    #[test]
    fn test_yara_annotation_on_file_create() {
        let rules = tempfile::tempdir().unwrap();
        fs::write(
            rules.path().join("marker.yar"),
            r#"rule test_marker { strings: $a = "PROCSIFT_MARKER" condition: $a }"#,
        )
        .unwrap();
        let scanner = Scanner::compile_folder(rules.path())
            .unwrap()
            .into_scanner()
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("payload.exe");
        fs::write(&sample, b"..PROCSIFT_MARKER..").unwrap();

        let mut engine = engine_with(&[]).with_scanner(scanner);
        let out = run(&mut engine, &[create_file(&sample.to_string_lossy())]);
        let line = &out.report.section(Section::Files)[0];
        assert!(line.ends_with("\t[YARA: test_marker]"), "{}", line);
        assert!(out.timeline.rows()[0].to_line().ends_with(",[YARA: test_marker],"));
    }

    #[test]
    fn test_vanished_file_and_folder() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.exe");
        let folder = dir.path().to_string_lossy().into_owned();
        let (lookup, calls) = counting_lookup();
        let mut engine = engine_with(&[]).with_reputation(lookup);

        let out = run(
            &mut engine,
            &[create_file(&gone.to_string_lossy()), create_file(&folder)],
        );
        let files = out.report.section(Section::Files);
        assert!(files[0].ends_with("\t[File no longer exists]"));
        assert!(out.timeline.rows()[0].to_line().ends_with(",N/A"));
        assert_eq!(files[1], format!("[CreateFolder] mal.exe:100 > {}", folder));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_rename_generalizes_both_paths() {
        let mut engine = engine_with(&[]).with_generalizer(Generalizer::from_rules([(
            "%AppData%",
            r"C:\Users\bob\AppData\Roaming",
        )]));
        let out = run(
            &mut engine,
            &[csv(&[
                "10:00:00",
                "mal.exe",
                "100",
                "SetRenameInformationFile",
                r"C:\Users\bob\AppData\Roaming\a.tmp",
                "SUCCESS",
                r#"ReplaceIfExists: True, FileName: "C:\Users\bob\AppData\Roaming\a.exe""#,
            ])],
        );
        assert_eq!(
            out.report.section(Section::Files),
            &[r"[RenameFile] mal.exe:100 > %AppData%\a.tmp => %AppData%\a.exe".to_string()]
        );
    }

    #[test]
    fn test_whitelist_matches_raw_not_generalized() {
        let rules = [WhitelistRule::new(WhitelistScope::File, r"C:\Users\bob\Temp")];
        let mut engine = engine_with(&rules).with_generalizer(Generalizer::from_rules([(
            "%Temp%",
            r"C:\Users\bob\Temp",
        )]));
        let delete = csv(&[
            "t",
            "mal.exe",
            "1",
            "SetDispositionInformationFile",
            r"C:\Users\bob\Temp\x.dat",
            "SUCCESS",
            "Delete: True",
        ]);
        let out = run(&mut engine, &[delete]);
        assert_eq!(out.stats.suppressed, 1);
    }

    #[test]
    fn test_registry_delete_accepted_on_failure() {
        let mut engine = engine_with(&[]);
        let out = run(
            &mut engine,
            &[csv(&["t", "mal.exe", "1", "RegDeleteValue", r"HKCU\Run\x", "NAME NOT FOUND", ""])],
        );
        assert_eq!(
            out.report.section(Section::Registry),
            &[r"[RegDeleteValue] mal.exe:1 > HKCU\Run\x".to_string()]
        );
    }

    #[test]
    fn test_every_line_is_accounted_for() {
        let lines = vec![
            "\"Time of Day\",\"Process Name\",\"PID\",\"Operation\",\"Path\",\"Result\",\"Detail\"".to_string(),
            "\tcontinuation of a multi-line field".to_string(),
            csv(&["t", "mal.exe", "1", "Process Create"]),
            csv(&["t", "mal.exe", "1", "RegOpenKey", r"HKLM\X", "SUCCESS", ""]),
            csv(&["t", "mal.exe", "1", "RegCreateKey", r"HKLM\X", "SUCCESS"]),
            csv(&["t", "procmon.exe", "1", "RegCreateKey", r"HKLM\Y", "SUCCESS"]),
            csv(&["t", "mal.exe", "1", "UDP Send", "no arrow here", "SUCCESS", ""]),
        ];
        let mut engine = engine_with(&[WhitelistRule::new(WhitelistScope::Registry, "procmon.exe")]);
        let out = run(&mut engine, &lines);
        let s = &out.stats;

        assert_eq!(s.skipped_lines, 1);
        assert_eq!(s.records, 6);
        assert_eq!(s.records, s.emitted + s.suppressed + s.ignored + s.unparsed);
        assert_eq!(s.unparsed, 2);
        assert_eq!(s.ignored, 2);
        assert_eq!(
            out.report.errors(),
            &[lines[2].clone(), lines[6].clone()]
        );
    }
}
