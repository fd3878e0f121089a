// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Dotted-numeric version parsing and comparison

use crate::error::{FirmwareError, Result};
use std::cmp::Ordering;

/// Parse a dotted numeric version string (e.g., "1.2.38", "v3.1") into its
/// segments. A leading "v"/"V" is tolerated.
pub fn parse_segments(s: &str) -> Result<Vec<u64>> {
    let s = s.trim().trim_start_matches('v').trim_start_matches('V');
    if s.is_empty() {
        return Err(FirmwareError::VersionParse("empty version".to_string()));
    }

    s.split('.')
        .map(|part| {
            part.parse::<u64>().map_err(|_| {
                FirmwareError::VersionParse(format!("invalid version segment: {part:?} in {s:?}"))
            })
        })
        .collect()
}

/// Compare two versions segment by segment, left to right. The shorter
/// version is padded with zeros, so "1.2" equals "1.2.0". This is numeric
/// ordering, not lexical: "1.10" is newer than "1.9".
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    let left = parse_segments(a)?;
    let right = parse_segments(b)?;

    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => {}
            other => return Ok(other),
        }
    }

    Ok(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        assert_eq!(parse_segments("1.2.38").unwrap(), vec![1, 2, 38]);
        assert_eq!(parse_segments("v1.2.38").unwrap(), vec![1, 2, 38]);
        assert_eq!(parse_segments("V1.2.38").unwrap(), vec![1, 2, 38]);
        assert_eq!(parse_segments("3").unwrap(), vec![3]);
        assert_eq!(parse_segments("10.20.30.40").unwrap(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_parse_segments_invalid() {
        assert!(parse_segments("").is_err());
        assert!(parse_segments("a.b.c").is_err());
        assert!(parse_segments("1.2.x").is_err());
        assert!(parse_segments("1..2").is_err());
    }

    #[test]
    fn test_compare_ordering() {
        assert_eq!(compare("1.2.38", "1.2.39").unwrap(), Ordering::Less);
        assert_eq!(compare("1.2.39", "1.2.38").unwrap(), Ordering::Greater);
        assert_eq!(compare("1.2.38", "1.2.38").unwrap(), Ordering::Equal);
        assert_eq!(compare("1.9", "1.10").unwrap(), Ordering::Less);
        assert_eq!(compare("2.0.0", "1.99.99").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_compare_zero_padding() {
        assert_eq!(compare("1.2", "1.2.0").unwrap(), Ordering::Equal);
        assert_eq!(compare("1.2", "1.2.1").unwrap(), Ordering::Less);
        assert_eq!(compare("1.2.1", "1.2").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_compare_antisymmetry() {
        let pairs = [
            ("1.0.0", "1.0.1"),
            ("0.9", "1.0"),
            ("2.3.4", "2.3.4"),
            ("1.2", "1.2.0"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                compare(a, b).unwrap(),
                compare(b, a).unwrap().reverse(),
                "compare({a}, {b}) is not antisymmetric"
            );
            assert_eq!(compare(a, a).unwrap(), Ordering::Equal);
        }
    }
}
