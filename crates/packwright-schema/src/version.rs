use crate::SchemaError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A semantic version that remembers how it was written.
///
/// Catalogs routinely abbreviate versions (`"1.8"`, `"11"`), so parsing pads
/// missing minor/patch segments with zero. The original text is kept for
/// display and serialization, which keeps metadata round-trips lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    parsed: semver::Version,
    original: String,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, SchemaError> {
        let original = input.trim();
        let (core, suffix) = split_suffix(strip_prefix_v(original));

        let numbers = parse_core_segments(core)
            .ok_or_else(|| SchemaError::InvalidVersion(input.to_owned()))?;
        let normalized = format!("{}.{}.{}{suffix}", numbers[0], numbers[1], numbers[2]);
        let parsed = semver::Version::parse(&normalized)
            .map_err(|_| SchemaError::InvalidVersion(input.to_owned()))?;

        Ok(Self {
            parsed,
            original: original.to_owned(),
        })
    }

    #[inline]
    pub fn semver(&self) -> &semver::Version {
        &self.parsed
    }

    /// The version exactly as it appeared in the catalog.
    #[inline]
    pub fn original(&self) -> &str {
        &self.original
    }

    #[inline]
    pub fn major(&self) -> u64 {
        self.parsed.major
    }

    #[inline]
    pub fn minor(&self) -> u64 {
        self.parsed.minor
    }

    #[inline]
    pub fn patch(&self) -> u64 {
        self.parsed.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.parsed.pre.is_empty()
    }

    /// Semver precedence: major, minor, patch, then pre-release. Build
    /// metadata does not participate.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        precedence_key(&self.parsed).cmp(&precedence_key(&other.parsed))
    }
}

fn precedence_key(v: &semver::Version) -> (u64, u64, u64, &semver::Prerelease) {
    (v.major, v.minor, v.patch, &v.pre)
}

fn strip_prefix_v(s: &str) -> &str {
    s.strip_prefix('v')
        .or_else(|| s.strip_prefix('V'))
        .unwrap_or(s)
}

/// Split `1.2.3-rc.1+build` into `("1.2.3", "-rc.1+build")`.
fn split_suffix(s: &str) -> (&str, &str) {
    match s.find(['-', '+']) {
        Some(idx) => s.split_at(idx),
        None => (s, ""),
    }
}

/// Parse one to three dot-separated numeric segments, padding with zero.
fn parse_core_segments(core: &str) -> Option<[u64; 3]> {
    let mut numbers = [0u64; 3];
    let mut count = 0;
    for segment in core.split('.') {
        if count == 3 || segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        numbers[count] = segment.parse().ok()?;
        count += 1;
    }
    Some(numbers)
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConstraintKind {
    Any,
    Exact(semver::Version),
    Major(u64),
    MajorMinor(u64, u64),
}

/// Version constraint used when selecting a dependency from a catalog.
///
/// Grammar:
/// - `""` or `"*"` matches any version.
/// - `"1.*"`, `"1.x"`, `"1.2.*"` match every version sharing the given
///   leading segments. Segments after the first wildcard are ignored.
/// - anything else is an exact version; omitted segments are zero, so `"1.9"`
///   matches `1.9.0` but neither `1.9.1` nor `1.90.0`. An exact constraint may
///   carry a pre-release tag (`"2.0.0-rc.1"`). Build metadata is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    raw: String,
    kind: ConstraintKind,
}

impl VersionConstraint {
    pub fn any() -> Self {
        Self {
            raw: String::new(),
            kind: ConstraintKind::Any,
        }
    }

    pub fn parse(input: &str) -> Result<Self, SchemaError> {
        let raw = input.trim();
        let invalid = || SchemaError::InvalidConstraint(input.to_owned());

        if raw.is_empty() || raw == "*" || raw.eq_ignore_ascii_case("x") {
            return Ok(Self {
                raw: raw.to_owned(),
                kind: ConstraintKind::Any,
            });
        }

        let body = strip_prefix_v(raw.strip_prefix('=').unwrap_or(raw).trim_start());
        let (core, suffix) = split_suffix(body);

        let mut numbers: Vec<u64> = Vec::with_capacity(3);
        let mut wildcard = false;
        for (idx, segment) in core.split('.').enumerate() {
            if idx == 3 {
                return Err(invalid());
            }
            if wildcard {
                // everything after the first wildcard is ignored, but must
                // still be well-formed
                if !is_wildcard(segment) && !is_number(segment) {
                    return Err(invalid());
                }
                continue;
            }
            if is_wildcard(segment) {
                wildcard = true;
            } else if is_number(segment) {
                numbers.push(segment.parse().map_err(|_| invalid())?);
            } else {
                return Err(invalid());
            }
        }

        let kind = if wildcard {
            if !suffix.is_empty() {
                return Err(invalid());
            }
            match numbers.as_slice() {
                [] => ConstraintKind::Any,
                [major] => ConstraintKind::Major(*major),
                [major, minor, ..] => ConstraintKind::MajorMinor(*major, *minor),
            }
        } else {
            let padded = [
                numbers.first().copied().unwrap_or(0),
                numbers.get(1).copied().unwrap_or(0),
                numbers.get(2).copied().unwrap_or(0),
            ];
            let normalized = format!("{}.{}.{}{suffix}", padded[0], padded[1], padded[2]);
            ConstraintKind::Exact(semver::Version::parse(&normalized).map_err(|_| invalid())?)
        };

        Ok(Self {
            raw: raw.to_owned(),
            kind,
        })
    }

    pub fn is_any(&self) -> bool {
        self.kind == ConstraintKind::Any
    }

    pub fn matches(&self, version: &Version) -> bool {
        let v = version.semver();
        match &self.kind {
            ConstraintKind::Any => true,
            ConstraintKind::Exact(expected) => precedence_key(v) == precedence_key(expected),
            ConstraintKind::Major(major) => v.major == *major,
            ConstraintKind::MajorMinor(major, minor) => v.major == *major && v.minor == *minor,
        }
    }
}

fn is_wildcard(segment: &str) -> bool {
    matches!(segment, "*" | "x" | "X")
}

fn is_number(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.raw)
        }
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
