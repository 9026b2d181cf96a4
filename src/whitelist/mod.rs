//! Whitelist matcher
//!
//! Four independently scoped rule sets (process, file, registry, network).
//! A record is suppressed when any rule in its scope matches any of its
//! fields. Rules are compiled once per run; a rule that fails to compile is
//! disabled with a warning and never matches.

pub mod defaults;

use crate::models::WhitelistScope;
use crate::utils::path::{split_placeholders, EnvSnapshot, Segment};
use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use std::sync::LazyLock;
use tracing::{info, warn};

/// `{n}` / `{n,}` / `{n,m}` at the start of the input
static COUNTED_REPETITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\d+(,\d*)?\}").expect("COUNTED_REPETITION pattern is valid")
});

/// Rule text plus the scope it suppresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistRule {
    pub pattern: String,
    pub scope: WhitelistScope,
}

impl WhitelistRule {
    pub fn new(scope: WhitelistScope, pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scope,
        }
    }
}

/// Rule that failed to compile and is ignored for the run
#[derive(Debug, Clone)]
pub struct DisabledRule {
    pub scope: WhitelistScope,
    pub pattern: String,
    pub error: String,
}

/// Byte budget for one scope's combined regex set
const SET_SIZE_LIMIT: usize = 10 * (1 << 20);

#[derive(Debug, Clone)]
enum Matcher {
    Nothing,
    Set(RegexSet),
    /// Rules matched one by one when the combined set cannot be built
    Each(Vec<Regex>),
}

/// Compiled rules of one scope
#[derive(Debug, Clone)]
pub struct RuleSet {
    scope: WhitelistScope,
    matcher: Matcher,
    patterns: Vec<String>,
    disabled: Vec<DisabledRule>,
}

impl RuleSet {
    pub fn compile<'a, I>(scope: WhitelistScope, rules: I, env: &EnvSnapshot) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::compile_with_limit(scope, rules, env, SET_SIZE_LIMIT)
    }

    fn compile_with_limit<'a, I>(
        scope: WhitelistScope,
        rules: I,
        env: &EnvSnapshot,
        set_size_limit: usize,
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut patterns = Vec::new();
        let mut compiled = Vec::new();
        let mut disabled = Vec::new();

        for rule in rules {
            let pattern = to_regex(rule, env);
            match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(regex) => {
                    compiled.push(regex);
                    patterns.push(pattern);
                }
                Err(err) => {
                    warn!(
                        target: "whitelist",
                        scope = scope.as_str(),
                        rule = %rule,
                        pattern = %pattern,
                        error = %err,
                        "Whitelist rule failed to compile; rule disabled"
                    );
                    disabled.push(DisabledRule {
                        scope,
                        pattern: rule.to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let matcher = if patterns.is_empty() {
            Matcher::Nothing
        } else {
            match RegexSetBuilder::new(&patterns)
                .case_insensitive(true)
                .size_limit(set_size_limit)
                .build()
            {
                Ok(set) => Matcher::Set(set),
                Err(err) => {
                    warn!(
                        target: "whitelist",
                        scope = scope.as_str(),
                        rules = compiled.len(),
                        error = %err,
                        "Whitelist regex set too large; matching rules individually"
                    );
                    Matcher::Each(compiled)
                }
            }
        };

        Self {
            scope,
            matcher,
            patterns,
            disabled,
        }
    }

    pub fn scope(&self) -> WhitelistScope {
        self.scope
    }

    /// Number of active (compiled) rules
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn disabled(&self) -> &[DisabledRule] {
        &self.disabled
    }

    /// True when any rule matches any of `fields`
    pub fn matches<S: AsRef<str>>(&self, fields: &[S]) -> bool {
        match &self.matcher {
            Matcher::Nothing => false,
            Matcher::Set(set) => fields.iter().any(|field| set.is_match(field.as_ref())),
            Matcher::Each(rules) => fields
                .iter()
                .any(|field| rules.iter().any(|rule| rule.is_match(field.as_ref()))),
        }
    }
}

/// The four scoped rule sets consulted by the classifier
#[derive(Debug, Clone)]
pub struct Whitelists {
    process: RuleSet,
    file: RuleSet,
    registry: RuleSet,
    network: RuleSet,
}

impl Whitelists {
    /// Compile `rules`, grouping them by scope.
    pub fn compile(rules: &[WhitelistRule], env: &EnvSnapshot) -> Self {
        let scoped = |scope: WhitelistScope| {
            RuleSet::compile(
                scope,
                rules
                    .iter()
                    .filter(|r| r.scope == scope)
                    .map(|r| r.pattern.as_str()),
                env,
            )
        };

        let whitelists = Self {
            process: scoped(WhitelistScope::Process),
            file: scoped(WhitelistScope::File),
            registry: scoped(WhitelistScope::Registry),
            network: scoped(WhitelistScope::Network),
        };

        info!(
            target: "whitelist",
            process = whitelists.process.len(),
            file = whitelists.file.len(),
            registry = whitelists.registry.len(),
            network = whitelists.network.len(),
            disabled = whitelists.disabled().count(),
            "Whitelist rules compiled"
        );
        whitelists
    }

    /// No rules in any scope
    pub fn empty() -> Self {
        Self::compile(&[], &EnvSnapshot::default())
    }

    pub fn rule_set(&self, scope: WhitelistScope) -> &RuleSet {
        match scope {
            WhitelistScope::Process => &self.process,
            WhitelistScope::File => &self.file,
            WhitelistScope::Registry => &self.registry,
            WhitelistScope::Network => &self.network,
        }
    }

    pub fn is_whitelisted<S: AsRef<str>>(&self, scope: WhitelistScope, fields: &[S]) -> bool {
        self.rule_set(scope).matches(fields)
    }

    pub fn disabled(&self) -> impl Iterator<Item = &DisabledRule> {
        [&self.process, &self.file, &self.registry, &self.network]
            .into_iter()
            .flat_map(|set| set.disabled().iter())
    }
}

/// Built-in rules for every scope, with the global list added to each.
pub fn builtin_rules() -> Vec<WhitelistRule> {
    let scoped = [
        (WhitelistScope::Process, defaults::PROCESS),
        (WhitelistScope::File, defaults::FILE),
        (WhitelistScope::Registry, defaults::REGISTRY),
        (WhitelistScope::Network, defaults::NETWORK),
    ];

    scoped
        .into_iter()
        .flat_map(|(scope, rules)| {
            rules
                .iter()
                .chain(defaults::GLOBAL.iter())
                .map(move |pattern| WhitelistRule::new(scope, *pattern))
        })
        .collect()
}

/// Turn rule text into a regex: expand placeholders (escaping their values)
/// and escape literal path separators.
pub fn to_regex(rule: &str, env: &EnvSnapshot) -> String {
    split_placeholders(rule, env)
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(text) => escape_literal(text),
            Segment::Resolved(value) => regex::escape(value),
        })
        .collect()
}

/// Escape `\` separators, and braces that are not a counted repetition
/// (registry class GUIDs are written bare in rule text).
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        match c {
            '\\' => out.push_str(r"\\"),
            '{' => {
                if let Some(m) = COUNTED_REPETITION.find(rest) {
                    out.push_str(m.as_str());
                    rest = &rest[m.end()..];
                    continue;
                }
                out.push_str(r"\{");
            }
            '}' => out.push_str(r"\}"),
            _ => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}
