//! Data models module
//!
//! Defines the record, event and verdict types shared by the reader,
//! the classifier and the report assembler.

use std::fmt;

/// One accepted input line split into its fields.
///
/// Field meaning depends on the operation name in field 3:
/// 0 = time of day, 1 = process name, 2 = process id, 3 = operation,
/// 4 = path or key, 5 = result, 6 = free-form detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number in the record source
    pub line_number: usize,
    /// Original line without its trailing newline
    pub raw: String,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub const TIMESTAMP: usize = 0;
    pub const PROCESS_NAME: usize = 1;
    pub const PROCESS_ID: usize = 2;
    pub const OPERATION: usize = 3;
    pub const TARGET: usize = 4;
    pub const RESULT: usize = 5;
    pub const DETAIL: usize = 6;

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Transport of a network record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetProtocol {
    Udp,
    Tcp,
}

impl NetProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            NetProtocol::Udp => "UDP",
            NetProtocol::Tcp => "TCP",
        }
    }
}

/// Event category derived from the operation name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    ProcessCreate,
    FileCreate,
    FileDelete,
    FileRename,
    RegCreateKey,
    RegSetValue,
    RegDeleteValue,
    RegDeleteKey,
    NetSend(NetProtocol),
    NetReceive(NetProtocol),
}

impl EventCategory {
    /// Map an operation name to a category.
    ///
    /// Returns `None` for operations the classifier has no transform for.
    pub fn from_operation(operation: &str) -> Option<Self> {
        let category = match operation {
            "Process Create" => EventCategory::ProcessCreate,
            "CreateFile" => EventCategory::FileCreate,
            "SetDispositionInformationFile" => EventCategory::FileDelete,
            "SetRenameInformationFile" => EventCategory::FileRename,
            "RegCreateKey" => EventCategory::RegCreateKey,
            "RegSetValue" => EventCategory::RegSetValue,
            "RegDeleteValue" => EventCategory::RegDeleteValue,
            "RegDeleteKey" => EventCategory::RegDeleteKey,
            "UDP Send" => EventCategory::NetSend(NetProtocol::Udp),
            "TCP Send" => EventCategory::NetSend(NetProtocol::Tcp),
            "UDP Receive" => EventCategory::NetReceive(NetProtocol::Udp),
            "TCP Receive" => EventCategory::NetReceive(NetProtocol::Tcp),
            _ => return None,
        };
        Some(category)
    }

    /// Fewest fields a record of this category needs before its transform can run.
    pub fn min_fields(self) -> usize {
        match self {
            EventCategory::ProcessCreate
            | EventCategory::FileRename
            | EventCategory::RegSetValue => 7,
            EventCategory::FileCreate
            | EventCategory::FileDelete
            | EventCategory::RegCreateKey
            | EventCategory::NetSend(_)
            | EventCategory::NetReceive(_) => 6,
            EventCategory::RegDeleteValue | EventCategory::RegDeleteKey => 5,
        }
    }

    /// Whether only successful records of this category are accepted.
    ///
    /// Renames and registry deletions are accepted regardless of outcome;
    /// an attempted deletion of a missing value is still worth reporting.
    pub fn requires_success(self) -> bool {
        !matches!(
            self,
            EventCategory::FileRename
                | EventCategory::RegDeleteValue
                | EventCategory::RegDeleteKey
        )
    }

    pub fn whitelist_scope(self) -> WhitelistScope {
        match self {
            EventCategory::ProcessCreate => WhitelistScope::Process,
            EventCategory::FileCreate | EventCategory::FileDelete | EventCategory::FileRename => {
                WhitelistScope::File
            }
            EventCategory::RegCreateKey
            | EventCategory::RegSetValue
            | EventCategory::RegDeleteValue
            | EventCategory::RegDeleteKey => WhitelistScope::Registry,
            EventCategory::NetSend(_) | EventCategory::NetReceive(_) => WhitelistScope::Network,
        }
    }
}

/// Result column of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Success,
    Other,
}

impl EventOutcome {
    pub fn from_result(result: &str) -> Self {
        if result == "SUCCESS" {
            EventOutcome::Success
        } else {
            EventOutcome::Other
        }
    }
}

/// Scope a whitelist rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhitelistScope {
    Process,
    File,
    Registry,
    Network,
}

impl WhitelistScope {
    pub fn as_str(self) -> &'static str {
        match self {
            WhitelistScope::Process => "process",
            WhitelistScope::File => "file",
            WhitelistScope::Registry => "registry",
            WhitelistScope::Network => "network",
        }
    }
}

/// Classified record with its actor and target pulled out of the field list
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub category: EventCategory,
    /// Time of day truncated to whole seconds
    pub timestamp: String,
    pub process_name: String,
    pub process_id: String,
    /// Path, registry key or network endpoint pair
    pub target: String,
    /// Free-form detail column (empty when the record has none)
    pub detail: String,
    pub outcome: EventOutcome,
}

impl NormalizedEvent {
    /// `name:pid` actor label used by every report line
    pub fn actor(&self) -> String {
        format!("{}:{}", self.process_name, self.process_id)
    }
}

/// Failure modes of the hash reputation lookup that still produce a label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictError {
    /// Service answered with its own error code
    Service,
    /// Scanned response without a usable total
    MissingTotal,
    /// Discriminant absent, unrecognised, or body undecodable
    Malformed,
    /// Request never completed
    Transport,
    /// Still rate limited after the retry budget was spent
    RateLimited,
}

impl VerdictError {
    fn code(self) -> &'static str {
        match self {
            VerdictError::Service => "001",
            VerdictError::MissingTotal => "002",
            VerdictError::Malformed => "003",
            VerdictError::Transport => "004",
            VerdictError::RateLimited => "005",
        }
    }
}

/// Hash reputation verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Queued,
    NotScanned,
    Scanned { positives: u64, total: u64 },
    Error(VerdictError),
}

impl Verdict {
    /// Short label without the surrounding annotation markup
    pub fn label(&self) -> String {
        match self {
            Verdict::Queued => "Queued".to_string(),
            Verdict::NotScanned => "Not Scanned".to_string(),
            Verdict::Scanned { positives, total } => format!("{}/{}", positives, total),
            Verdict::Error(err) => format!("Error {}", err.code()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[VT: {}]", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_mapping() {
        assert_eq!(
            EventCategory::from_operation("Process Create"),
            Some(EventCategory::ProcessCreate)
        );
        assert_eq!(
            EventCategory::from_operation("TCP Receive"),
            Some(EventCategory::NetReceive(NetProtocol::Tcp))
        );
        assert_eq!(EventCategory::from_operation("ReadFile"), None);
        assert_eq!(EventCategory::from_operation("Operation"), None);
    }

    #[test]
    fn test_deletions_skip_success_filter() {
        assert!(!EventCategory::RegDeleteKey.requires_success());
        assert!(!EventCategory::RegDeleteValue.requires_success());
        assert!(!EventCategory::FileRename.requires_success());
        assert!(EventCategory::RegSetValue.requires_success());
    }

    #[test]
    fn test_every_operation_has_a_scope() {
        let cases = [
            ("Process Create", WhitelistScope::Process),
            ("CreateFile", WhitelistScope::File),
            ("SetDispositionInformationFile", WhitelistScope::File),
            ("SetRenameInformationFile", WhitelistScope::File),
            ("RegCreateKey", WhitelistScope::Registry),
            ("RegSetValue", WhitelistScope::Registry),
            ("RegDeleteValue", WhitelistScope::Registry),
            ("RegDeleteKey", WhitelistScope::Registry),
            ("UDP Send", WhitelistScope::Network),
            ("TCP Receive", WhitelistScope::Network),
        ];
        for (operation, scope) in cases {
            let category = EventCategory::from_operation(operation).unwrap();
            assert_eq!(category.whitelist_scope(), scope, "{}", operation);
            assert!(category.min_fields() >= 5, "{}", operation);
        }
    }

    #[test]
    fn test_verdict_labels() {
        assert_eq!(Verdict::Queued.to_string(), "[VT: Queued]");
        assert_eq!(
            Verdict::Scanned {
                positives: 3,
                total: 57
            }
            .to_string(),
            "[VT: 3/57]"
        );
        assert_eq!(
            Verdict::Error(VerdictError::Malformed).to_string(),
            "[VT: Error 003]"
        );
    }
}
