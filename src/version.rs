//! Version algebra: parsing, total-order comparison, and constraint
//! evaluation over semantic versions.
//!
//! This is a from-scratch value type rather than a thin wrapper over the
//! `semver` crate: the wildcard version (`*`/`latest`) participates in
//! ordering as a first-class value here, and parse failures must name the
//! segment that failed, neither of which the upstream crate's API supports.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NexusError, NexusResult};

/// A parsed semantic version, or the wildcard value.
///
/// Wildcard sorts above every concrete version (spec §3). A concrete version
/// carrying a prerelease identifier sorts below the same major.minor.patch
/// without one. Build metadata is retained for display and interchange but
/// never affects ordering or equality.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
    pub wildcard: bool,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version { major, minor, patch, prerelease: None, build: None, wildcard: false }
    }

    /// The wildcard version (`*` / `latest`).
    pub fn wildcard() -> Self {
        Version { major: 0, minor: 0, patch: 0, prerelease: None, build: None, wildcard: true }
    }

    pub fn with_prerelease(mut self, pre: impl Into<String>) -> Self {
        self.prerelease = Some(pre.into());
        self
    }

    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// Parses `major.minor.patch(-prerelease)?(+build)?` or the wildcard
    /// spellings `*`/`latest`. Reports which segment failed on malformed
    /// input (spec §4.1).
    pub fn parse(input: &str) -> NexusResult<Self> {
        let input = input.trim();
        if input == "*" || input.eq_ignore_ascii_case("latest") {
            return Ok(Version::wildcard());
        }

        // Split off build metadata first: it may itself contain `-`.
        let (rest, build) = match input.find('+') {
            Some(idx) => (&input[..idx], Some(input[idx + 1..].to_owned())),
            None => (input, None),
        };
        if let Some(b) = &build {
            if b.is_empty() {
                return Err(NexusError::InvalidInput {
                    segment: "build".into(),
                    message: "build metadata is empty".into(),
                });
            }
        }

        let (core, prerelease) = match rest.find('-') {
            Some(idx) => (&rest[..idx], Some(rest[idx + 1..].to_owned())),
            None => (rest, None),
        };
        if let Some(p) = &prerelease {
            if p.is_empty() {
                return Err(NexusError::InvalidInput {
                    segment: "prerelease".into(),
                    message: "prerelease identifier is empty".into(),
                });
            }
        }

        let mut parts = core.splitn(3, '.');
        let major = parse_segment(parts.next(), "major")?;
        let minor = parse_segment(parts.next(), "minor")?;
        let patch = parse_segment(parts.next(), "patch")?;
        if parts.next().is_some() {
            return Err(NexusError::InvalidInput {
                segment: "patch".into(),
                message: "trailing characters after patch segment".into(),
            });
        }

        Ok(Version { major, minor, patch, prerelease, build, wildcard: false })
    }

    /// `true` if this version carries no prerelease tag and isn't wildcard.
    pub fn is_stable(&self) -> bool {
        !self.wildcard && self.prerelease.is_none()
    }
}

fn parse_segment(segment: Option<&str>, name: &'static str) -> NexusResult<u64> {
    let raw = segment.ok_or_else(|| NexusError::InvalidInput {
        segment: name.into(),
        message: "segment is missing".into(),
    })?;
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NexusError::InvalidInput {
            segment: name.into(),
            message: format!("`{}` is not a non-negative integer", raw),
        });
    }
    raw.parse::<u64>().map_err(|e| NexusError::InvalidInput {
        segment: name.into(),
        message: e.to_string(),
    })
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            return write!(f, "*");
        }
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.wildcard, other.wildcard) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {},
        }

        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

/// A predicate on versions (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum Constraint {
    Exact(Version),
    Gt(Version),
    Gte(Version),
    Lt(Version),
    Lte(Version),
    /// `^v` — same major, >= v (for 0.x, same minor; for 0.0.x, same patch,
    /// following standard caret semantics).
    Caret(Version),
    /// `~v` — same major.minor, >= v.
    Tilde(Version),
    Wildcard,
}

impl Constraint {
    pub fn parse(input: &str) -> NexusResult<Self> {
        let input = input.trim();
        if input.is_empty() || input == "*" {
            return Ok(Constraint::Wildcard);
        }
        let (op, rest) = split_operator(input);
        let version = Version::parse(rest)?;
        Ok(match op {
            "=" => Constraint::Exact(version),
            ">=" => Constraint::Gte(version),
            ">" => Constraint::Gt(version),
            "<=" => Constraint::Lte(version),
            "<" => Constraint::Lt(version),
            "^" => Constraint::Caret(version),
            "~" => Constraint::Tilde(version),
            other => {
                return Err(NexusError::InvalidInput {
                    segment: "constraint".into(),
                    message: format!("unknown constraint operator `{}`", other),
                })
            },
        })
    }

    /// Evaluates the predicate against an already-parsed version. Pure:
    /// repeated evaluation always returns the same result (spec §8).
    pub fn satisfies(&self, v: &Version) -> bool {
        match self {
            Constraint::Wildcard => true,
            Constraint::Exact(c) => v == c,
            Constraint::Gt(c) => v > c,
            Constraint::Gte(c) => v >= c,
            Constraint::Lt(c) => v < c,
            Constraint::Lte(c) => v <= c,
            Constraint::Caret(c) => {
                if v.wildcard {
                    return false;
                }
                if c.major != 0 {
                    v.major == c.major && v >= c
                } else if c.minor != 0 {
                    v.major == 0 && v.minor == c.minor && v >= c
                } else {
                    v.major == 0 && v.minor == 0 && v.patch == c.patch && v >= c
                }
            },
            Constraint::Tilde(c) => {
                !v.wildcard && v.major == c.major && v.minor == c.minor && v >= c
            },
        }
    }

    /// As [`Constraint::satisfies`], but tolerant of unparseable input:
    /// returns `false` rather than propagating a parse error (spec §4.1).
    pub fn satisfies_str(&self, raw: &str) -> bool {
        match Version::parse(raw) {
            Ok(v) => self.satisfies(&v),
            Err(_) => false,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Wildcard => write!(f, "*"),
            Constraint::Exact(v) => write!(f, "={}", v),
            Constraint::Gt(v) => write!(f, ">{}", v),
            Constraint::Gte(v) => write!(f, ">={}", v),
            Constraint::Lt(v) => write!(f, "<{}", v),
            Constraint::Lte(v) => write!(f, "<={}", v),
            Constraint::Caret(v) => write!(f, "^{}", v),
            Constraint::Tilde(v) => write!(f, "~{}", v),
        }
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Constraint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Constraint::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn split_operator(input: &str) -> (&str, &str) {
    for op in ["~", "^", ">=", "<=", ">", "<", "="] {
        if let Some(rest) = input.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("=", input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_core_and_wildcard() {
        assert_eq!(Version::parse("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert!(Version::parse("*").unwrap().wildcard);
        assert!(Version::parse("latest").unwrap().wildcard);
    }

    #[test]
    fn parses_prerelease_and_build() {
        let v = Version::parse("1.2.3-alpha.1+build.7").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.prerelease.as_deref(), Some("alpha.1"));
        assert_eq!(v.build.as_deref(), Some("build.7"));
    }

    #[test]
    fn rejects_malformed_segments() {
        let err = Version::parse("1.x.3").unwrap_err();
        match err {
            NexusError::InvalidInput { segment, .. } => assert_eq!(segment, "minor"),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn ordering_is_total_and_matches_semver_precedence() {
        let a = Version::parse("1.0.0-alpha").unwrap();
        let b = Version::parse("1.0.0").unwrap();
        let c = Version::parse("1.0.1").unwrap();
        let w = Version::wildcard();
        assert!(a < b);
        assert!(b < c);
        assert!(c < w);
        // build metadata never affects precedence
        assert_eq!(
            Version::parse("1.0.0+abc").unwrap(),
            Version::parse("1.0.0+xyz").unwrap()
        );
    }

    #[test]
    fn caret_same_major_geq() {
        let c = Constraint::parse("^1.2.0").unwrap();
        assert!(c.satisfies(&Version::parse("1.2.0").unwrap()));
        assert!(c.satisfies(&Version::parse("1.9.0").unwrap()));
        assert!(!c.satisfies(&Version::parse("2.0.0").unwrap()));
        assert!(!c.satisfies(&Version::parse("1.1.9").unwrap()));
    }

    #[test]
    fn caret_zero_major_locks_minor() {
        let c = Constraint::parse("^0.2.0").unwrap();
        assert!(c.satisfies(&Version::parse("0.2.5").unwrap()));
        assert!(!c.satisfies(&Version::parse("0.3.0").unwrap()));
    }

    #[test]
    fn tilde_locks_minor() {
        let c = Constraint::parse("~1.2.0").unwrap();
        assert!(c.satisfies(&Version::parse("1.2.9").unwrap()));
        assert!(!c.satisfies(&Version::parse("1.3.0").unwrap()));
    }

    #[test]
    fn unparseable_version_never_panics() {
        let c = Constraint::parse(">=1.0.0").unwrap();
        assert!(!c.satisfies_str("not-a-version"));
    }
}
