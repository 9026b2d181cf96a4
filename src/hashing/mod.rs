//! Content hashing and the hash whitelist.
//!
//! Every observed file gets an MD5 for the report. SHA-1 and SHA-256 are
//! only computed when the whitelist holds digests of that kind.

use crate::whitelist::defaults;
use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::{info, warn};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct HashRequirements {
    pub sha1: bool,
    pub sha256: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedHashes {
    pub md5: String,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

/// Digest kind, recognised by hex length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Md5,
    Sha1,
    Sha256,
}

impl DigestKind {
    pub fn of(value: &str) -> Option<Self> {
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match value.len() {
            32 => Some(DigestKind::Md5),
            40 => Some(DigestKind::Sha1),
            64 => Some(DigestKind::Sha256),
            _ => None,
        }
    }
}

/// True when `value` is a hex MD5, SHA-1 or SHA-256 digest
pub fn is_valid_digest(value: &str) -> bool {
    DigestKind::of(value).is_some()
}

/// Digests whose files are suppressed from the report entirely
#[derive(Debug, Clone, Default)]
pub struct HashWhitelist {
    md5: HashSet<String>,
    sha1: HashSet<String>,
    sha256: HashSet<String>,
}

impl HashWhitelist {
    /// Built-in MD5 list
    pub fn builtin() -> Self {
        let mut list = Self::default();
        for digest in defaults::HASHES {
            list.insert(digest);
        }
        list
    }

    /// Add a digest; returns false when it is not a recognised digest.
    pub fn insert(&mut self, value: &str) -> bool {
        let normalized = value.trim().to_ascii_lowercase();
        let set = match DigestKind::of(&normalized) {
            Some(DigestKind::Md5) => &mut self.md5,
            Some(DigestKind::Sha1) => &mut self.sha1,
            Some(DigestKind::Sha256) => &mut self.sha256,
            None => return false,
        };
        set.insert(normalized);
        true
    }

    /// Read extra digests from a hash list file.
    ///
    /// Accepts flat lists and md5deep output (digest first, then path).
    /// Blank lines, `#` and `//` comments are skipped; `;` starts an inline
    /// comment.
    pub fn load_file(&mut self, path: &Path) -> io::Result<usize> {
        let content = fs::read_to_string(path)?;
        let source = path.display().to_string();
        let mut added = 0;

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let value = line.split(';').next().unwrap_or_default();
            let Some(digest) = value.split_whitespace().next() else {
                continue;
            };

            if self.insert(digest) {
                added += 1;
            } else {
                warn!(
                    target: "hashing",
                    path = %source,
                    line = idx + 1,
                    value = %digest,
                    "Invalid hash, skipping"
                );
            }
        }

        info!(
            target: "hashing",
            path = %source,
            added,
            md5 = self.md5.len(),
            sha1 = self.sha1.len(),
            sha256 = self.sha256.len(),
            "Loaded hash whitelist"
        );
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.md5.len() + self.sha1.len() + self.sha256.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn requirements(&self) -> HashRequirements {
        HashRequirements {
            sha1: !self.sha1.is_empty(),
            sha256: !self.sha256.is_empty(),
        }
    }

    /// The whitelisted digest among `hashes`, if any
    pub fn matched<'a>(&self, hashes: &'a ComputedHashes) -> Option<&'a str> {
        if self.md5.contains(&hashes.md5) {
            return Some(&hashes.md5);
        }
        if let Some(sha1) = hashes.sha1.as_deref().filter(|v| self.sha1.contains(*v)) {
            return Some(sha1);
        }
        hashes
            .sha256
            .as_deref()
            .filter(|v| self.sha256.contains(*v))
    }
}

/// Hash the file at `path`, reading it once.
pub fn compute_hashes(path: &Path, requirements: HashRequirements) -> io::Result<ComputedHashes> {
    let mut file = fs::File::open(path)?;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let mut md5_hasher = Md5::new();
    let mut sha1_hasher = requirements.sha1.then(Sha1::new);
    let mut sha256_hasher = requirements.sha256.then(Sha256::new);

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        md5_hasher.update(&buf[..read]);
        if let Some(hasher) = sha1_hasher.as_mut() {
            hasher.update(&buf[..read]);
        }
        if let Some(hasher) = sha256_hasher.as_mut() {
            hasher.update(&buf[..read]);
        }
    }

    Ok(ComputedHashes {
        md5: hex::encode(md5_hasher.finalize()),
        sha1: sha1_hasher.map(|h| hex::encode(h.finalize())),
        sha256: sha256_hasher.map(|h| hex::encode(h.finalize())),
    })
}
