//! Per-category parsers for the free-form detail column.
//!
//! The capture tool renders details as `Label: value, Label: value`. Each
//! parser looks only for the labels its category needs and reports a
//! [`DetailError`] when one is missing.

use thiserror::Error;

/// Tokens in a full-width registry data dump; the capture tool cuts the
/// payload at this many bytes.
const HEX_DUMP_TOKENS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetailError {
    #[error("detail has no '{0}' label")]
    MissingLabel(&'static str),
    #[error("invalid registry length '{0}'")]
    InvalidLength(String),
}

/// `PID: <child>, Command line: <cmd>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetail {
    pub child_pid: String,
    pub command_line: String,
}

pub fn parse_process(detail: &str) -> Result<ProcessDetail, DetailError> {
    let (_, command_line) = detail
        .split_once("Command line: ")
        .ok_or(DetailError::MissingLabel("Command line: "))?;
    let (_, after_pid) = detail
        .split_once("PID: ")
        .ok_or(DetailError::MissingLabel("PID: "))?;
    let child_pid = after_pid.split(',').next().unwrap_or_default();

    Ok(ProcessDetail {
        child_pid: child_pid.to_string(),
        command_line: command_line.to_string(),
    })
}

/// Destination of a rename, from `FileName: <path>`
pub fn parse_rename(detail: &str) -> Result<String, DetailError> {
    let (_, destination) = detail
        .split_once("FileName: ")
        .ok_or(DetailError::MissingLabel("FileName: "))?;
    Ok(destination.trim_matches('"').to_string())
}

/// `Type: ..., Length: <n>, Data: <payload>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegValueDetail {
    pub length: u64,
    /// Payload text, `None` when the detail carries no `Data:` label
    pub data: Option<String>,
}

impl RegValueDetail {
    /// Payload has exactly as many tokens as the tool's truncated hex dump
    pub fn is_truncated_dump(&self) -> bool {
        self.data
            .as_deref()
            .is_some_and(|data| data.split_whitespace().count() == HEX_DUMP_TOKENS)
    }
}

pub fn parse_reg_value(detail: &str) -> Result<RegValueDetail, DetailError> {
    let (_, after_length) = detail
        .split_once("Length:")
        .ok_or(DetailError::MissingLabel("Length:"))?;
    let raw_length = after_length
        .split(',')
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| c.is_whitespace() || c == '"');
    let length = raw_length
        .parse::<u64>()
        .map_err(|_| DetailError::InvalidLength(raw_length.to_string()))?;

    let data = detail
        .split_once("Data:")
        .map(|(_, data)| data.trim_matches(|c: char| c.is_whitespace() || c == '"').to_string());

    Ok(RegValueDetail { length, data })
}

/// Remote endpoint of a network target `local:port -> remote:port`
pub fn parse_remote_endpoint(target: &str) -> Result<String, DetailError> {
    let (_, remote) = target
        .split_once("-> ")
        .ok_or(DetailError::MissingLabel("-> "))?;
    Ok(remote.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_detail() {
        let parsed = parse_process(r"PID: 2468, Command line: C:\mal.exe -x").unwrap();
        assert_eq!(parsed.child_pid, "2468");
        assert_eq!(parsed.command_line, r"C:\mal.exe -x");
    }

    #[test]
    fn test_process_detail_missing_command_line() {
        assert_eq!(
            parse_process("PID: 2468"),
            Err(DetailError::MissingLabel("Command line: "))
        );
    }

    #[test]
    fn test_rename_strips_quotes() {
        assert_eq!(
            parse_rename(r#"ReplaceIfExists: False, FileName: C:\new.exe""#).unwrap(),
            r"C:\new.exe"
        );
        assert!(parse_rename("ReplaceIfExists: False").is_err());
    }

    #[test]
    fn test_reg_value_with_data() {
        let parsed = parse_reg_value("Type: REG_BINARY, Length: 4, Data: 01 02 03 04").unwrap();
        assert_eq!(parsed.length, 4);
        assert_eq!(parsed.data.as_deref(), Some("01 02 03 04"));
        assert!(!parsed.is_truncated_dump());
    }

    #[test]
    fn test_reg_value_full_dump() {
        let dump = (0..16).map(|i| format!("{:02X}", i)).collect::<Vec<_>>().join(" ");
        let parsed =
            parse_reg_value(&format!("Type: REG_BINARY, Length: 200, Data: {}", dump)).unwrap();
        assert!(parsed.is_truncated_dump());
    }

    #[test]
    fn test_reg_value_without_data() {
        let parsed = parse_reg_value("Type: REG_DWORD, Length: 4").unwrap();
        assert_eq!(parsed.data, None);
    }

    #[test]
    fn test_reg_value_bad_length() {
        assert_eq!(
            parse_reg_value("Length: abc, Data: 00"),
            Err(DetailError::InvalidLength("abc".to_string()))
        );
        assert!(parse_reg_value("Type: REG_SZ").is_err());
    }

    #[test]
    fn test_remote_endpoint() {
        assert_eq!(
            parse_remote_endpoint("10.0.0.5:49152 -> evil.example:https").unwrap(),
            "evil.example:https"
        );
        assert!(parse_remote_endpoint("10.0.0.5:49152").is_err());
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = parse_process("PID: 200").unwrap_err();
        assert_eq!(err.to_string(), "detail has no 'Command line: ' label");
        let boxed: Box<dyn std::error::Error> = Box::new(DetailError::InvalidLength("x".into()));
        assert_eq!(boxed.to_string(), "invalid registry length 'x'");
    }
}
