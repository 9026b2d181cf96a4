//! YARA scanner module
//!
//! Compiles every rule file of a folder once, then scans observed files on
//! request. Compilation is all-or-nothing: one broken rule file disables
//! scanning for the whole run.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use yara_x::{Compiler, Rules, Scanner as XScanner};

/// Rule file that failed to compile
#[derive(Debug, Clone)]
pub struct RuleFileError {
    pub path: PathBuf,
    pub error: String,
}

/// Result of compiling a rule folder
pub enum ScannerLoad {
    Ready(Scanner),
    /// Folder holds no `.yar` / `.yara` files
    Empty,
    /// At least one file failed; every failing file is listed
    Failed(Vec<RuleFileError>),
}

impl ScannerLoad {
    pub fn into_scanner(self) -> Option<Scanner> {
        match self {
            ScannerLoad::Ready(scanner) => Some(scanner),
            ScannerLoad::Empty | ScannerLoad::Failed(_) => None,
        }
    }
}

/// Compiled rule corpus
pub struct Scanner {
    rules: Rules,
    rule_files: usize,
}

impl Scanner {
    /// Compile all rule files in `rules_dir`, one namespace per file stem.
    ///
    /// Errors only when the folder itself cannot be read.
    pub fn compile_folder(rules_dir: &Path) -> Result<ScannerLoad> {
        info!(target: "scanner", path = %rules_dir.display(), "Loading YARA rules");

        let mut files = Vec::new();
        let entries = fs::read_dir(rules_dir)
            .with_context(|| format!("Failed to read YARA rules folder {:?}", rules_dir))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list {:?}", rules_dir))?
                .path();
            if is_rule_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            warn!(
                target: "scanner",
                path = %rules_dir.display(),
                "No YARA rule files found; scanning disabled"
            );
            return Ok(ScannerLoad::Empty);
        }

        let mut compiler = Compiler::new();
        let mut failures = Vec::new();

        for path in &files {
            let namespace = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let error = match fs::read_to_string(path) {
                Ok(src) => {
                    compiler.new_namespace(&namespace);
                    compiler.add_source(src.as_str()).err().map(|e| e.to_string())
                }
                Err(e) => Some(e.to_string()),
            };

            match error {
                None => debug!(target: "scanner", file = %path.display(), "Compiled YARA rule file"),
                Some(error) => {
                    warn!(
                        target: "scanner",
                        file = %path.display(),
                        error = %error,
                        "Failed to compile YARA rule file"
                    );
                    failures.push(RuleFileError {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            warn!(
                target: "scanner",
                failed = failures.len(),
                total = files.len(),
                "YARA scanning disabled for this run"
            );
            return Ok(ScannerLoad::Failed(failures));
        }

        let rules = compiler.build();
        info!(target: "scanner", files = files.len(), "YARA rules compiled");
        Ok(ScannerLoad::Ready(Self {
            rules,
            rule_files: files.len(),
        }))
    }

    pub fn rule_files(&self) -> usize {
        self.rule_files
    }

    /// Names of matching rules; an unreadable file yields no matches.
    pub fn scan_file(&self, path: &Path) -> Vec<String> {
        let mut scanner = XScanner::new(&self.rules);

        match scanner.scan_file(path) {
            Ok(results) => results
                .matching_rules()
                .map(|rule| rule.identifier().to_string())
                .collect(),
            Err(e) => {
                trace!(
                    target: "scanner",
                    file = %path.display(),
                    error = %e,
                    "Skipping YARA scan"
                );
                Vec::new()
            }
        }
    }
}

fn is_rule_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext == "yar" || ext == "yara")
}

/// `[YARA: a, b]`, or `None` when nothing matched
pub fn annotation(matches: &[String]) -> Option<String> {
    if matches.is_empty() {
        return None;
    }
    Some(format!("[YARA: {}]", matches.join(", ")))
}
