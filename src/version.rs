//! Dotted version numbers as published in release tags.
//!
//! Release tags are plain dotted numerics (`1.4.2`), sometimes with a `v`
//! prefix stripped by the feed layer before parsing. Parsing never fails:
//! malformed or empty segments are treated as `0`, and comparison pads the
//! shorter sequence with zeros so `1.2` and `1.2.0` compare equal.

use std::cmp::Ordering;
use std::fmt;

/// An ordered sequence of non-negative integers parsed from a dotted
/// version string. Immutable once parsed.
#[derive(Debug, Clone, Default)]
pub struct VersionNumber(Vec<u64>);

impl VersionNumber {
    /// Parse a dotted version string. Never fails; any segment that is not
    /// a non-negative integer becomes `0`.
    pub fn parse(s: &str) -> Self {
        let parts = s
            .trim()
            .split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect();
        Self(parts)
    }

    /// The parsed numeric components, in order.
    pub fn components(&self) -> &[u64] {
        &self.0
    }

    /// `true` if `self` is strictly newer than `current`.
    pub fn is_newer_than(&self, current: &Self) -> bool {
        self.cmp(current) == Ordering::Greater
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows the zero-padded ordering, so "1.2" == "1.2.0".
impl PartialEq for VersionNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionNumber {}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parses_dotted_numerics() {
        assert_eq!(VersionNumber::parse("1.4.2").components(), &[1, 4, 2]);
        assert_eq!(VersionNumber::parse("10").components(), &[10]);
    }

    #[test]
    fn malformed_segments_become_zero() {
        assert_eq!(VersionNumber::parse("1.x.2").components(), &[1, 0, 2]);
        assert_eq!(VersionNumber::parse("").components(), &[0]);
        assert_eq!(VersionNumber::parse("..").components(), &[0, 0, 0]);
        assert_eq!(VersionNumber::parse("-1.2").components(), &[0, 2]);
    }

    #[test]
    fn shorter_is_padded_with_zeros() {
        assert_eq!(VersionNumber::parse("1.2"), VersionNumber::parse("1.2.0"));
        assert_eq!(VersionNumber::parse("2.0"), VersionNumber::parse("2.0.0"));
    }

    #[test]
    fn numeric_not_lexicographic() {
        let newer = VersionNumber::parse("1.10.0");
        let older = VersionNumber::parse("1.9.0");
        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
    }

    #[test]
    fn equal_versions_are_not_newer() {
        let a = VersionNumber::parse("2.0");
        let b = VersionNumber::parse("2.0.0");
        assert!(!a.is_newer_than(&b));
        assert!(!b.is_newer_than(&a));
    }

    #[test]
    fn ordering_is_antisymmetric_and_transitive() {
        let low = VersionNumber::parse("1.2.3");
        let mid = VersionNumber::parse("1.3.0");
        let high = VersionNumber::parse("2.0.0");

        assert_eq!(low.cmp(&mid), Ordering::Less);
        assert_eq!(mid.cmp(&low), Ordering::Greater);

        assert_eq!(low.cmp(&mid), Ordering::Less);
        assert_eq!(mid.cmp(&high), Ordering::Less);
        assert_eq!(low.cmp(&high), Ordering::Less);

        assert_eq!(low.cmp(&low), Ordering::Equal);
    }

    #[test]
    fn display_round_trips() {
        let v = VersionNumber::parse("2.3.0");
        assert_eq!(v.to_string(), "2.3.0");
    }
}
