// src/version/mod.rs

//! EVR and NEVRA handling
//!
//! This module provides parsing and comparison for rpm-style package
//! versions (epoch:version-release) and full package identities
//! (name-epoch:version-release.arch). Comparison follows the classic
//! rpm segment rules: versions are split into alternating numeric and
//! alphabetic segments, numeric segments compare as integers, and a
//! numeric segment always sorts after an alphabetic one. A `~` segment
//! sorts before everything (pre-releases), a `^` sorts after the bare
//! version but before any longer one (post-releases).

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// A parsed package version with epoch, version, and release components
///
/// Format: `[epoch:]version[-release]`
/// - `"1.2.3"` → epoch=0, version="1.2.3", release=None
/// - `"2:1.2.3-4.el8"` → epoch=2, version="1.2.3", release=Some("4.el8")
///
/// A missing or empty epoch is treated as 0.
///
/// Equality follows [`Evr::compare`], not field-wise string equality:
/// `"1.05"` and `"1.5"` are equal. `Evr` is therefore not hashable.
#[derive(Debug, Clone)]
pub struct Evr {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl PartialEq for Evr {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Evr {}

impl Evr {
    /// Parse an `[epoch:]version[-release]` string
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch_str, rest) = match s.find(':') {
            Some(pos) => {
                let (e, r) = s.split_at(pos);
                (e, &r[1..])
            }
            None => ("0", s),
        };

        let epoch = if epoch_str.is_empty() {
            0 // ":1.0.0" style strings default to epoch 0
        } else {
            epoch_str
                .parse::<u64>()
                .map_err(|e| Error::InvalidVersion(format!("bad epoch in '{}': {}", s, e)))?
        };

        let (version, release) = match rest.find('-') {
            Some(pos) => {
                let (v, r) = rest.split_at(pos);
                (v.to_string(), Some(r[1..].to_string()))
            }
            None => (rest.to_string(), None),
        };

        if version.is_empty() {
            return Err(Error::InvalidVersion(format!(
                "empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Compare two EVRs
    ///
    /// Epoch dominates; the release is consulted only when the versions
    /// tie. A missing release compares equal to any release so that
    /// version-only filters like ">= 1.2" behave as callers expect.
    pub fn compare(&self, other: &Evr) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match compare_version_strings(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.release, &other.release) {
            (Some(a), Some(b)) => compare_version_strings(a, b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Full package identity: name-epoch:version-release.arch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nevra {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    /// Parse a full NEVRA string such as `pkg-libs-1:1.3-4.x86_64`
    ///
    /// The string is split from the right: the final `.` separates the
    /// arch, the final two `-` separate release and version. Package
    /// names may themselves contain `-`.
    pub fn parse(s: &str) -> Result<Self> {
        let dot = s
            .rfind('.')
            .ok_or_else(|| Error::InvalidVersion(format!("missing arch in '{}'", s)))?;
        let arch = &s[dot + 1..];
        let rest = &s[..dot];

        let dash_rel = rest
            .rfind('-')
            .ok_or_else(|| Error::InvalidVersion(format!("missing release in '{}'", s)))?;
        let release = &rest[dash_rel + 1..];
        let rest = &rest[..dash_rel];

        let dash_ver = rest
            .rfind('-')
            .ok_or_else(|| Error::InvalidVersion(format!("missing version in '{}'", s)))?;
        let evr_part = &rest[dash_ver + 1..];
        let name = &rest[..dash_ver];

        if name.is_empty() || evr_part.is_empty() || release.is_empty() || arch.is_empty() {
            return Err(Error::InvalidVersion(format!("malformed NEVRA '{}'", s)));
        }

        let evr = Evr::parse(evr_part)?;

        Ok(Self {
            name: name.to_string(),
            epoch: evr.epoch,
            version: evr.version,
            release: release.to_string(),
            arch: arch.to_string(),
        })
    }

    /// The EVR portion of this identity
    pub fn evr(&self) -> Evr {
        Evr {
            epoch: self.epoch,
            version: self.version.clone(),
            release: Some(self.release.clone()),
        }
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(
                f,
                "{}-{}:{}-{}.{}",
                self.name, self.epoch, self.version, self.release, self.arch
            )
        } else {
            write!(
                f,
                "{}-{}-{}.{}",
                self.name, self.version, self.release, self.arch
            )
        }
    }
}

/// One segment of a version string during comparison
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Numeric(&'a str),
    Alpha(&'a str),
    Tilde,
    Caret,
}

/// Split a version string into comparable segments
///
/// Separator characters (anything that is not alphanumeric, `~` or `^`)
/// only delimit segments and never participate in the comparison.
fn segments(s: &str) -> Vec<Segment<'_>> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'~' {
            out.push(Segment::Tilde);
            i += 1;
        } else if c == b'^' {
            out.push(Segment::Caret);
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            // Strip leading zeros so "007" compares equal to "7"
            out.push(Segment::Numeric(s[start..i].trim_start_matches('0')));
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            out.push(Segment::Alpha(&s[start..i]));
        } else {
            i += 1;
        }
    }

    out
}

/// Compare two bare version (or release) strings using rpm segment rules
pub fn compare_version_strings(a: &str, b: &str) -> Ordering {
    let sa = segments(a);
    let sb = segments(b);
    let mut ia = sa.iter();
    let mut ib = sb.iter();

    loop {
        match (ia.next(), ib.next()) {
            (None, None) => return Ordering::Equal,
            // Tilde sorts before end-of-string, caret after
            (Some(Segment::Tilde), None) => return Ordering::Less,
            (None, Some(Segment::Tilde)) => return Ordering::Greater,
            (Some(Segment::Caret), None) => return Ordering::Greater,
            (None, Some(Segment::Caret)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => match (x, y) {
                (Segment::Tilde, Segment::Tilde) | (Segment::Caret, Segment::Caret) => {}
                (Segment::Tilde, _) => return Ordering::Less,
                (_, Segment::Tilde) => return Ordering::Greater,
                (Segment::Caret, _) => return Ordering::Less,
                (_, Segment::Caret) => return Ordering::Greater,
                (Segment::Numeric(n1), Segment::Numeric(n2)) => {
                    // Longer digit run (after zero-stripping) is larger
                    let ord = n1
                        .len()
                        .cmp(&n2.len())
                        .then_with(|| n1.cmp(n2));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                (Segment::Alpha(a1), Segment::Alpha(a2)) => {
                    let ord = a1.cmp(a2);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                // Numeric segments sort after alphabetic ones
                (Segment::Numeric(_), Segment::Alpha(_)) => return Ordering::Greater,
                (Segment::Alpha(_), Segment::Numeric(_)) => return Ordering::Less,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evr_parse_simple() {
        let v = Evr::parse("1.2.3").unwrap();
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_evr_parse_full() {
        let v = Evr::parse("1:2.3.4-5.el8").unwrap();
        assert_eq!(v.epoch, 1);
        assert_eq!(v.version, "2.3.4");
        assert_eq!(v.release, Some("5.el8".to_string()));
    }

    #[test]
    fn test_evr_parse_empty_epoch() {
        // Some sources emit ":1.02.208-2.fc43" with an empty epoch
        let v = Evr::parse(":1.02.208-2.fc43").unwrap();
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.02.208");
    }

    #[test]
    fn test_evr_parse_rejects_empty_version() {
        assert!(Evr::parse("1:").is_err());
        assert!(Evr::parse("-1").is_err());
    }

    #[test]
    fn test_epoch_dominates() {
        let v1 = Evr::parse("1:1.0").unwrap();
        let v2 = Evr::parse("2.0").unwrap();
        assert!(v1 > v2);
    }

    #[test]
    fn test_version_numeric_comparison() {
        assert!(Evr::parse("1.10").unwrap() > Evr::parse("1.9").unwrap());
        assert!(Evr::parse("1.05").unwrap() == Evr::parse("1.5").unwrap());
    }

    #[test]
    fn test_equality_matches_segment_comparison() {
        // Equality is defined by the comparison, not by the raw strings
        assert_eq!(Evr::parse("1.05").unwrap(), Evr::parse("1.5").unwrap());
        assert_eq!(Evr::parse("0:1.0").unwrap(), Evr::parse("1.0").unwrap());
        assert_ne!(Evr::parse("1.0-1").unwrap(), Evr::parse("1.0-2").unwrap());

        let a = Evr::parse("1.05").unwrap();
        let b = Evr::parse("1.5").unwrap();
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a == b, a.cmp(&b) == Ordering::Equal);
    }

    #[test]
    fn test_release_breaks_version_tie() {
        let v1 = Evr::parse("1.2.3-1").unwrap();
        let v2 = Evr::parse("1.2.3-2").unwrap();
        assert!(v1 < v2);

        // Release only matters on a version tie
        let v3 = Evr::parse("1.2.4-1").unwrap();
        assert!(v3 > v2);
    }

    #[test]
    fn test_missing_release_compares_equal() {
        let bare = Evr::parse("1.2.3").unwrap();
        let with_rel = Evr::parse("1.2.3-4").unwrap();
        assert_eq!(bare.compare(&with_rel), Ordering::Equal);
    }

    #[test]
    fn test_tilde_sorts_before_release() {
        assert!(compare_version_strings("1.0~rc1", "1.0") == Ordering::Less);
        assert!(compare_version_strings("1.0~rc1", "1.0~rc2") == Ordering::Less);
    }

    #[test]
    fn test_caret_sorts_after_release() {
        assert!(compare_version_strings("1.0^post1", "1.0") == Ordering::Greater);
        assert!(compare_version_strings("1.0^post1", "1.0.1") == Ordering::Less);
    }

    #[test]
    fn test_alpha_before_numeric() {
        assert!(compare_version_strings("1.0a", "1.0.1") == Ordering::Less);
        assert!(compare_version_strings("alpha", "1") == Ordering::Less);
    }

    #[test]
    fn test_nevra_parse_plain() {
        let n = Nevra::parse("pkg-1.2-3.x86_64").unwrap();
        assert_eq!(n.name, "pkg");
        assert_eq!(n.epoch, 0);
        assert_eq!(n.version, "1.2");
        assert_eq!(n.release, "3");
        assert_eq!(n.arch, "x86_64");
    }

    #[test]
    fn test_nevra_parse_dashed_name_with_epoch() {
        let n = Nevra::parse("pkg-libs-1:1.3-4.x86_64").unwrap();
        assert_eq!(n.name, "pkg-libs");
        assert_eq!(n.epoch, 1);
        assert_eq!(n.version, "1.3");
        assert_eq!(n.release, "4");
        assert_eq!(n.arch, "x86_64");
    }

    #[test]
    fn test_nevra_roundtrip_display() {
        for s in ["pkg-1.2-3.x86_64", "pkg-libs-1:1.3-4.x86_64"] {
            let n = Nevra::parse(s).unwrap();
            assert_eq!(n.to_string(), s);
        }
    }

    #[test]
    fn test_nevra_parse_malformed() {
        assert!(Nevra::parse("pkg").is_err());
        assert!(Nevra::parse("pkg-1.2").is_err());
        assert!(Nevra::parse("pkg-1.2-3").is_err());
    }

    #[test]
    fn test_evr_display() {
        assert_eq!(Evr::parse("1.2.3").unwrap().to_string(), "1.2.3");
        assert_eq!(
            Evr::parse("2:1.2.3-4.el8").unwrap().to_string(),
            "2:1.2.3-4.el8"
        );
    }
}
