//! A dotted-numeric version, ordered the way gem versions compare
//! (`2.2.8 < 2.10.0`, not lexicographic string order).

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn parse(text: &str) -> Self {
        let segments = text
            .split(['.', '-'])
            .map(|segment| segment.parse::<u64>().unwrap_or(0))
            .collect();
        Self(segments)
    }

    pub fn segments(&self) -> &[u64] {
        &self.0
    }

    /// The pessimistic-operator (`~>`) upper bound: all but the last
    /// segment, with the new last segment incremented by one. A
    /// single-segment base (`~> 2`) increments that segment directly.
    pub fn pessimistic_upper(&self) -> Self {
        if self.0.len() <= 1 {
            return Self(vec![self.0.first().copied().unwrap_or(0) + 1]);
        }
        let mut upper = self.0[..self.0.len() - 1].to_vec();
        if let Some(last) = upper.last_mut() {
            *last += 1;
        }
        Self(upper)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                other_ord => return other_ord,
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparison_not_lexicographic() {
        assert!(Version::parse("2.10.0") > Version::parse("2.2.8"));
    }

    #[test]
    fn shorter_version_compares_as_zero_padded() {
        assert_eq!(Version::parse("2.2"), Version::parse("2.2.0"));
        assert!(Version::parse("2.2.1") > Version::parse("2.2"));
    }

    #[test]
    fn pessimistic_upper_truncates_and_increments() {
        assert_eq!(Version::parse("2.2.8").pessimistic_upper(), Version::parse("2.3"));
        assert_eq!(Version::parse("2.2").pessimistic_upper(), Version::parse("3"));
    }
}
