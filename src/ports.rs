use std::collections::BTreeSet;
use std::fmt;

use crate::error::ValidationError;

pub const MIN_PORT: u16 = 1;
pub const MAX_PORT: u16 = 65535;

/// A validated, non-empty, strictly ascending list of TCP ports.
///
/// Only the normalizer functions in this module construct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSet(Vec<u16>);

impl PortSet {
    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    fn from_set(set: BTreeSet<u16>) -> Result<Self, ValidationError> {
        if set.is_empty() {
            return Err(ValidationError::EmptyPortSet);
        }
        Ok(Self(set.into_iter().collect()))
    }
}

impl fmt::Display for PortSet {
    /// Compact form: consecutive runs collapse into `start-end`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter().copied().peekable();
        let mut first = true;
        while let Some(start) = iter.next() {
            let mut end = start;
            while end < MAX_PORT && iter.peek() == Some(&(end + 1)) {
                iter.next();
                end += 1;
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}

/// Parse a port specification using the full TCP port range (1..=65535).
pub fn normalize(spec: &str) -> Result<PortSet, ValidationError> {
    normalize_with_bounds(spec, MIN_PORT, MAX_PORT)
}

/// Parse a port specification into a deduplicated, ascending [`PortSet`].
///
/// Supported tokens, separated by commas:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
///
/// Whitespace around tokens is ignored. A blank specification is an
/// [`ValidationError::EmptyPortSet`]; an empty token inside a list is malformed.
pub fn normalize_with_bounds(spec: &str, low: u16, high: u16) -> Result<PortSet, ValidationError> {
    if spec.trim().is_empty() {
        return Err(ValidationError::EmptyPortSet);
    }

    let mut set = BTreeSet::new();
    for raw in spec.split(',') {
        let token = raw.trim();
        let (start, end) = parse_token(token, low, high)?;
        set.extend(start..=end);
    }
    PortSet::from_set(set)
}

/// Build a [`PortSet`] from the `--start/--end` shorthand.
pub fn range(start: u32, end: u32) -> Result<PortSet, ValidationError> {
    let token = format!("{start}-{end}");
    if start > end {
        return Err(ValidationError::Malformed { token });
    }
    let start = check_bounds(u64::from(start), &token, MIN_PORT, MAX_PORT)?;
    let end = check_bounds(u64::from(end), &token, MIN_PORT, MAX_PORT)?;
    PortSet::from_set((start..=end).collect())
}

fn parse_token(token: &str, low: u16, high: u16) -> Result<(u16, u16), ValidationError> {
    let malformed = || ValidationError::Malformed {
        token: token.to_string(),
    };

    if let Some((a, b)) = token.split_once('-') {
        let a = parse_number(a.trim()).ok_or_else(malformed)?;
        let b = parse_number(b.trim()).ok_or_else(malformed)?;
        if a > b {
            return Err(malformed());
        }
        let start = check_bounds(a, token, low, high)?;
        let end = check_bounds(b, token, low, high)?;
        return Ok((start, end));
    }

    let p = parse_number(token).ok_or_else(malformed)?;
    let p = check_bounds(p, token, low, high)?;
    Ok((p, p))
}

// `str::parse` accepts a leading `+`; port tokens are digits only.
fn parse_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn check_bounds(val: u64, token: &str, low: u16, high: u16) -> Result<u16, ValidationError> {
    if val < u64::from(low) || val > u64::from(high) {
        return Err(ValidationError::OutOfRange {
            token: token.to_string(),
            low,
            high,
        });
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_ports() {
        let ports = normalize("80, 22 ,443").unwrap();
        assert_eq!(ports.as_slice(), &[22, 80, 443]);
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let ports = normalize("8000-8002,80,8001").unwrap();
        assert_eq!(ports.as_slice(), &[80, 8000, 8001, 8002]);
    }

    #[test]
    fn out_of_range_names_token() {
        let err = normalize("22,70000").unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                token: "70000".into(),
                low: 1,
                high: 65535
            }
        );
        assert!(matches!(normalize("0"), Err(ValidationError::OutOfRange { .. })));
        assert!(matches!(
            normalize("65530-65536"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn malformed_tokens() {
        for spec in ["abc", "80,", "22,,80", "30-20", "-5", "1-", "+80", "8o"] {
            assert!(
                matches!(normalize(spec), Err(ValidationError::Malformed { .. })),
                "expected malformed for {spec:?}"
            );
        }
        assert_eq!(
            normalize("22,x").unwrap_err(),
            ValidationError::Malformed { token: "x".into() }
        );
    }

    #[test]
    fn blank_spec_is_empty() {
        assert_eq!(normalize(""), Err(ValidationError::EmptyPortSet));
        assert_eq!(normalize("   "), Err(ValidationError::EmptyPortSet));
    }

    #[test]
    fn custom_bounds_apply() {
        let ports = normalize_with_bounds("1000-1002", 1000, 2000).unwrap();
        assert_eq!(ports.as_slice(), &[1000, 1001, 1002]);
        assert!(matches!(
            normalize_with_bounds("999", 1000, 2000),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn range_shorthand() {
        assert_eq!(range(1, 3).unwrap().as_slice(), &[1, 2, 3]);
        assert_eq!(range(1, 1024).unwrap().len(), 1024);
        assert!(matches!(range(10, 5), Err(ValidationError::Malformed { .. })));
        assert!(matches!(range(0, 5), Err(ValidationError::OutOfRange { .. })));
        assert!(matches!(range(1, 70000), Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn display_collapses_runs() {
        let ports = normalize("22,20-21,80,443,444,65535").unwrap();
        assert_eq!(ports.to_string(), "20-22,80,443-444,65535");
    }
}
