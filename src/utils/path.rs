//! Path generalization utilities
//!
//! Rewrites absolute paths from the analysis machine into `%Placeholder%`
//! form (C:\Users\bob\AppData\Roaming\x.exe -> %AppData%\x.exe) so reports
//! read the same regardless of which profile ran the sample.
//!
//! Placeholders are resolved once from an [`EnvSnapshot`] and never change
//! for the rest of the run.

use std::collections::HashMap;
use tracing::debug;

/// Placeholders tried by the generalizer, in substitution order.
///
/// Order decides which placeholder wins when values nest; there is no
/// longest-match sorting.
pub const GENERALIZED_PLACEHOLDERS: &[&str] = &[
    "AllUsersProfile",
    "LocalAppData",
    "AppData",
    "CommonProgramFiles",
    "ProgramData",
    "ProgramFiles",
    "ProgramFiles(x86)",
    "Public",
    "Temp",
    "UserProfile",
    "WinDir",
];

/// Case-insensitive view of environment variables taken at startup
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_uppercase(), v.into()))
            .collect();
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }
}

/// One piece of a rule or path string split around `%Name%` references
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// Placeholder that resolved; holds the resolved value
    Resolved(&'a str),
}

/// Split `text` into literal runs and resolved `%Name%` references.
///
/// References that do not resolve (unknown or empty) stay literal, `%`
/// signs included.
pub fn split_placeholders<'a>(text: &'a str, env: &'a EnvSnapshot) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        let Some(len) = after.find('%') else { break };
        let name = &after[..len];

        match env.get(name).filter(|v| !v.is_empty() && !name.is_empty()) {
            Some(value) => {
                if start > 0 {
                    segments.push(Segment::Literal(&rest[..start]));
                }
                segments.push(Segment::Resolved(value));
                rest = &after[len + 1..];
            }
            None => {
                // Keep the opening '%' literal and retry from the closing one,
                // which may open a valid reference.
                segments.push(Segment::Literal(&rest[..start + 1]));
                rest = after;
            }
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

/// Expand `%Name%` references against `env`, leaving unknown ones untouched
pub fn expand_placeholders(text: &str, env: &EnvSnapshot) -> String {
    split_placeholders(text, env)
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(s) | Segment::Resolved(s) => s,
        })
        .collect()
}

/// Ordered (placeholder, resolved value) substitutions applied to output text
#[derive(Debug, Clone, Default)]
pub struct Generalizer {
    rules: Vec<(String, String)>,
}

impl Generalizer {
    /// Generalizer that returns every string unchanged
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Resolve [`GENERALIZED_PLACEHOLDERS`] against `env`.
    ///
    /// A placeholder is dropped when it resolves to nothing or to itself.
    pub fn from_env(env: &EnvSnapshot) -> Self {
        let rules = GENERALIZED_PLACEHOLDERS
            .iter()
            .filter_map(|name| {
                let placeholder = format!("%{}%", name);
                let value = env.get(name)?;
                if value.is_empty() || value == placeholder {
                    return None;
                }
                debug!(
                    target: "generalizer",
                    placeholder = %placeholder,
                    value = %value,
                    "Generalization rule enabled"
                );
                Some((placeholder, value.to_string()))
            })
            .collect();
        Self { rules }
    }

    /// Build from explicit pairs, keeping their order
    pub fn from_rules<I, P, V>(rules: I) -> Self
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<String>,
        V: Into<String>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|(p, v)| (p.into(), v.into()))
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn rules(&self) -> &[(String, String)] {
        &self.rules
    }

    /// Replace every occurrence of each resolved value with its placeholder.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (placeholder, value) in &self.rules {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), placeholder);
            }
        }
        out
    }
}
