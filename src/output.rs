//! Report and timeline files
//!
//! Files are written only once a pass has completed, so an interrupted run
//! leaves nothing behind.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::engine::PassOutput;
use crate::report::ReportHeader;

/// Destination files derived from the input name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub report: PathBuf,
    pub timeline: PathBuf,
}

impl OutputPaths {
    /// `<stem>.txt` and `<stem>_timeline.csv`, in `directory` or beside the input.
    ///
    /// A name that would land on the input itself gets a `_report` suffix.
    pub fn for_input(input: &Path, directory: Option<&Path>) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "procsift".to_string());
        let dir = directory
            .map(Path::to_path_buf)
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        let name_of = |file: String| {
            let clashes = input
                .file_name()
                .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(&file));
            if clashes {
                let (base, ext) = file.rsplit_once('.').unwrap_or((file.as_str(), ""));
                format!("{}_report.{}", base, ext)
            } else {
                file
            }
        };

        Self {
            report: dir.join(name_of(format!("{}.txt", stem))),
            timeline: dir.join(name_of(format!("{}_timeline.csv", stem))),
        }
    }
}

/// Render and write the report, plus the timeline when asked to.
pub fn write_outputs(
    paths: &OutputPaths,
    output: &PassOutput,
    header: &ReportHeader,
    timeline: bool,
) -> Result<()> {
    if let Some(dir) = paths.report.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    fs::write(&paths.report, output.report.render(header))
        .with_context(|| format!("Failed to write report {:?}", paths.report))?;
    info!(target: "report", path = %paths.report.display(), "Report written");

    if timeline {
        fs::write(&paths.timeline, output.timeline.render())
            .with_context(|| format!("Failed to write timeline {:?}", paths.timeline))?;
        info!(
            target: "report",
            path = %paths.timeline.display(),
            rows = output.timeline.len(),
            "Timeline written"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::whitelist::Whitelists;
    use std::io::Cursor;

    #[test]
    fn test_paths_follow_input_stem() {
        let paths = OutputPaths::for_input(Path::new("/cases/run1/capture.csv"), None);
        assert_eq!(paths.report, PathBuf::from("/cases/run1/capture.txt"));
        assert_eq!(paths.timeline, PathBuf::from("/cases/run1/capture_timeline.csv"));

        let paths = OutputPaths::for_input(Path::new("capture.csv"), Some(Path::new("/out")));
        assert_eq!(paths.report, PathBuf::from("/out/capture.txt"));
    }

    #[test]
    fn test_txt_input_is_never_the_report() {
        let paths = OutputPaths::for_input(Path::new("/cases/run1/capture.txt"), None);
        assert_eq!(paths.report, PathBuf::from("/cases/run1/capture_report.txt"));
        assert_eq!(paths.timeline, PathBuf::from("/cases/run1/capture_timeline.csv"));

        let paths = OutputPaths::for_input(Path::new("/cases/CAPTURE.TXT"), None);
        assert_eq!(paths.report, PathBuf::from("/cases/CAPTURE_report.txt"));

        let paths = OutputPaths::for_input(Path::new("/cases/run_timeline.csv"), None);
        assert_eq!(paths.timeline, PathBuf::from("/cases/run_timeline_timeline.csv"));
    }

    #[test]
    fn test_write_keeps_txt_capture_intact() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("capture.txt");
        let capture = "\"10:00:00\",\"a.exe\",\"1\",\"RegDeleteKey\",\"HKCU\\X\"";
        fs::write(&input, capture).unwrap();

        let output = Engine::new(Whitelists::empty())
            .run(std::io::BufReader::new(fs::File::open(&input).unwrap()))
            .unwrap();
        let paths = OutputPaths::for_input(&input, None);
        write_outputs(&paths, &output, &ReportHeader::new("0.1.0"), true).unwrap();

        assert_eq!(fs::read_to_string(&input).unwrap(), capture);
        let report = fs::read_to_string(&paths.report).unwrap();
        assert!(report.contains("[RegDeleteKey] a.exe:1 > HKCU\\X\r\n"));
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = "\"10:00:00\",\"a.exe\",\"1\",\"RegCreateKey\",\"HKCU\\X\",\"SUCCESS\"";
        let output = Engine::new(Whitelists::empty())
            .run(Cursor::new(input))
            .unwrap();

        let out_dir = dir.path().join("reports");
        let paths = OutputPaths::for_input(Path::new("capture.csv"), Some(&out_dir));
        write_outputs(&paths, &output, &ReportHeader::new("0.1.0"), true).unwrap();

        let report = fs::read_to_string(&paths.report).unwrap();
        assert!(report.contains("[RegCreateKey] a.exe:1 > HKCU\\X\r\n"));
        let timeline = fs::read_to_string(&paths.timeline).unwrap();
        assert_eq!(timeline, "10:00:00,Registry,RegCreateKey,a.exe,1,HKCU\\X");
    }

    #[test]
    fn test_timeline_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let output = Engine::new(Whitelists::empty()).run(Cursor::new("")).unwrap();
        let paths = OutputPaths::for_input(Path::new("empty.csv"), Some(dir.path()));
        write_outputs(&paths, &output, &ReportHeader::new("0.1.0"), false).unwrap();
        assert!(paths.report.exists());
        assert!(!paths.timeline.exists());
    }
}
