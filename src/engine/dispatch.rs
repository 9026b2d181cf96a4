//! Per-category transforms
//!
//! Each accepted, non-whitelisted event becomes one report line plus one
//! timeline row, or is dropped for a category-specific reason.

use super::Engine;
use crate::hashing::compute_hashes;
use crate::models::{EventCategory, NetProtocol, NormalizedEvent};
use crate::normalizer::detail::{self, DetailError};
use crate::report::{Section, TimelineRow};
use crate::scanner;
use std::path::Path;
use tracing::debug;

/// Service names the capture tool prints in place of port numbers.
/// `:https` must be replaced before `:http`.
const PORT_NAMES: &[(&str, &str)] = &[(":https", ":443"), (":http", ":80"), (":domain", ":53")];

/// Output produced by one event
#[derive(Debug)]
pub(super) struct Emission {
    pub section: Section,
    pub line: String,
    /// Drop the report line when the section already holds it
    pub dedup: bool,
    pub row: TimelineRow,
    /// Remote endpoint for the unique host list
    pub remote: Option<String>,
}

#[derive(Debug)]
pub(super) enum Dispatch {
    Emit(Emission),
    /// File content matched the hash whitelist
    HashWhitelisted(String),
    /// Accepted but deliberately produces no output
    Skipped(&'static str),
}

impl Engine {
    pub(super) fn dispatch(&mut self, event: &NormalizedEvent) -> Result<Dispatch, DetailError> {
        match event.category {
            EventCategory::ProcessCreate => self.process_create(event),
            EventCategory::FileCreate => Ok(self.file_create(event)),
            EventCategory::FileDelete => Ok(self.file_delete(event)),
            EventCategory::FileRename => self.file_rename(event),
            EventCategory::RegCreateKey => Ok(registry_key(event, "RegCreateKey", true)),
            EventCategory::RegSetValue => reg_set_value(event),
            EventCategory::RegDeleteValue => Ok(registry_key(event, "RegDeleteValue", false)),
            EventCategory::RegDeleteKey => Ok(registry_key(event, "RegDeleteKey", false)),
            EventCategory::NetSend(protocol) => network(event, protocol, true),
            EventCategory::NetReceive(protocol) => network(event, protocol, false),
        }
    }

    fn process_create(&self, event: &NormalizedEvent) -> Result<Dispatch, DetailError> {
        let detail = detail::parse_process(&event.detail)?;
        let command_line = self.generalizer.apply(&detail.command_line).replace('"', "");

        Ok(Dispatch::Emit(Emission {
            section: Section::Processes,
            line: format!(
                "[CreateProcess] {} > \"{}\"\t[Child PID: {}]",
                event.actor(),
                command_line,
                detail.child_pid
            ),
            dedup: false,
            row: row(event, "Process", "CreateProcess")
                .column(command_line)
                .column(detail.child_pid),
            remote: None,
        }))
    }

    fn file_create(&mut self, event: &NormalizedEvent) -> Dispatch {
        let path = Path::new(&event.target);
        let shown = self.generalizer.apply(&event.target);

        if path.is_dir() {
            return Dispatch::Emit(file_emission(
                format!("[CreateFolder] {} > {}", event.actor(), shown),
                row(event, "File", "CreateFolder").column(shown),
            ));
        }

        let hashes = match compute_hashes(path, self.hash_whitelist.requirements()) {
            Ok(hashes) => hashes,
            Err(e) => {
                debug!(
                    target: "hashing",
                    file = %event.target,
                    error = %e,
                    "File not readable at inspection time"
                );
                return Dispatch::Emit(file_emission(
                    format!("[CreateFile] {} > {}\t[File no longer exists]", event.actor(), shown),
                    row(event, "File", "CreateFile").column(shown).column("N/A"),
                ));
            }
        };

        if let Some(digest) = self.hash_whitelist.matched(&hashes) {
            return Dispatch::HashWhitelisted(digest.to_string());
        }

        let yara = self
            .scanner
            .as_ref()
            .and_then(|s| scanner::annotation(&s.scan_file(path)));
        let verdict = self
            .reputation
            .as_mut()
            .and_then(|r| r.verdict(&hashes.md5))
            .map(|v| v.to_string());

        let mut line = format!("[CreateFile] {} > {}\t[MD5: {}]", event.actor(), shown, hashes.md5);
        if let Some(yara) = &yara {
            line.push('\t');
            line.push_str(yara);
        }
        if let Some(verdict) = &verdict {
            line.push(' ');
            line.push_str(verdict);
        }

        Dispatch::Emit(file_emission(
            line,
            row(event, "File", "CreateFile")
                .column(shown)
                .column(hashes.md5)
                .column(yara.unwrap_or_default())
                .column(verdict.unwrap_or_default()),
        ))
    }

    fn file_delete(&self, event: &NormalizedEvent) -> Dispatch {
        let shown = self.generalizer.apply(&event.target);
        Dispatch::Emit(file_emission(
            format!("[DeleteFile] {} > {}", event.actor(), shown),
            row(event, "File", "DeleteFile").column(shown),
        ))
    }

    fn file_rename(&self, event: &NormalizedEvent) -> Result<Dispatch, DetailError> {
        let destination = detail::parse_rename(&event.detail)?;
        let from = self.generalizer.apply(&event.target);
        let to = self.generalizer.apply(&destination);

        Ok(Dispatch::Emit(file_emission(
            format!("[RenameFile] {} > {} => {}", event.actor(), from, to),
            row(event, "File", "RenameFile").column(from).column(to),
        )))
    }
}

fn row(event: &NormalizedEvent, group: &str, action: &str) -> TimelineRow {
    TimelineRow::new(
        &event.timestamp,
        group,
        action,
        &event.process_name,
        &event.process_id,
    )
}

fn file_emission(line: String, row: TimelineRow) -> Emission {
    Emission {
        section: Section::Files,
        line,
        dedup: false,
        row,
        remote: None,
    }
}

/// Key-only registry events; keys are never generalized
fn registry_key(event: &NormalizedEvent, action: &str, dedup: bool) -> Dispatch {
    Dispatch::Emit(Emission {
        section: Section::Registry,
        line: format!("[{}] {} > {}", action, event.actor(), event.target),
        dedup,
        row: row(event, "Registry", action).column(event.target.as_str()),
        remote: None,
    })
}

fn reg_set_value(event: &NormalizedEvent) -> Result<Dispatch, DetailError> {
    let value = detail::parse_reg_value(&event.detail)?;
    if value.length == 0 {
        return Ok(Dispatch::Skipped("zero-length registry value"));
    }

    let data = match &value.data {
        Some(data) if value.is_truncated_dump() => format!("{} ...", data),
        Some(data) => data.clone(),
        None => String::new(),
    };
    let line = if value.data.is_some() {
        format!("[RegSetValue] {} > {}  =  {}", event.actor(), event.target, data)
    } else {
        format!("[RegSetValue] {} > {}", event.actor(), event.target)
    };

    Ok(Dispatch::Emit(Emission {
        section: Section::Registry,
        line,
        dedup: false,
        row: row(event, "Registry", "RegSetValue")
            .column(event.target.as_str())
            .column(data),
        remote: None,
    }))
}

fn network(event: &NormalizedEvent, protocol: NetProtocol, send: bool) -> Result<Dispatch, DetailError> {
    let remote = detail::parse_remote_endpoint(&event.target)?;
    let shown = replace_port_names(&remote);
    let proto = protocol.as_str();

    let (line, action) = if send {
        (format!("[{}] {} > {}", proto, event.actor(), shown), "Send")
    } else {
        (format!("[{}] {} > {}", proto, shown, event.actor()), "Receive")
    };

    Ok(Dispatch::Emit(Emission {
        section: Section::Network,
        line,
        dedup: true,
        row: row(event, "Network", &format!("{} {}", proto, action)).column(shown),
        remote: Some(remote),
    }))
}

/// `host:https` -> `host:443` and friends
pub fn replace_port_names(endpoint: &str) -> String {
    PORT_NAMES
        .iter()
        .fold(endpoint.to_string(), |acc, &(name, port)| acc.replace(name, port))
}
