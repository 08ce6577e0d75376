//! Target specifiers
//!
//! Strings such as `heads`, `base`, `-1`, `ae10:heads` are parsed once, at the
//! API boundary, into a [`RevisionSpec`]. Everything downstream matches on
//! the variant.

use std::fmt;
use std::str::FromStr;

use crate::error::MigrateError;

static BASE: RevisionSpec = RevisionSpec::Base;

/// Parsed migration target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionSpec {
    /// Revision id, unique id prefix, or branch label
    Exact(String),
    /// Every head of the graph
    Heads,
    /// Nothing applied
    Base,
    /// Whatever the version table currently records
    Current,
    /// `n` steps back from the current revision along its linear history
    Offset(u32),
    /// `n` steps back from the single head of the graph
    HeadOffset(u32),
    /// Explicit `from:to` range, needed whenever there is no live database
    Range(Box<RevisionSpec>, Box<RevisionSpec>),
}

impl RevisionSpec {
    pub fn exact(id: impl Into<String>) -> Self {
        RevisionSpec::Exact(id.into())
    }

    pub fn range(from: RevisionSpec, to: RevisionSpec) -> Self {
        RevisionSpec::Range(Box::new(from), Box::new(to))
    }

    pub fn is_range(&self) -> bool {
        matches!(self, RevisionSpec::Range(..))
    }

    /// Split a range into its endpoints; a plain target becomes `base:target`
    pub fn endpoints(&self) -> (&RevisionSpec, &RevisionSpec) {
        match self {
            RevisionSpec::Range(from, to) => (from, to),
            other => (&BASE, other),
        }
    }

    fn parse_single(input: &str) -> Result<Self, MigrateError> {
        let input = input.trim();
        match input {
            "" => Err(MigrateError::invalid_range("empty revision identifier")),
            "heads" | "head" => Ok(RevisionSpec::Heads),
            "base" => Ok(RevisionSpec::Base),
            "current" => Ok(RevisionSpec::Current),
            _ => {
                if let Some(steps) = input.strip_prefix('-') {
                    return parse_steps(input, steps).map(RevisionSpec::Offset);
                }
                if let Some(steps) = input
                    .strip_prefix("heads-")
                    .or_else(|| input.strip_prefix("head-"))
                {
                    return parse_steps(input, steps).map(RevisionSpec::HeadOffset);
                }
                if input.starts_with('+') {
                    return Err(MigrateError::invalid_range(format!(
                        "relative upgrade '{}' is not supported; name the target revision",
                        input
                    )));
                }
                if input.chars().any(char::is_whitespace) {
                    return Err(MigrateError::invalid_range(format!(
                        "revision identifier '{}' contains whitespace",
                        input
                    )));
                }
                Ok(RevisionSpec::Exact(input.to_string()))
            }
        }
    }
}

fn parse_steps(input: &str, steps: &str) -> Result<u32, MigrateError> {
    match steps.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(MigrateError::invalid_range(format!(
            "relative revision '{}' needs a positive step count",
            input
        ))),
    }
}

impl FromStr for RevisionSpec {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            None => RevisionSpec::parse_single(s),
            Some((from, to)) => {
                if to.contains(':') {
                    return Err(MigrateError::invalid_range(format!(
                        "'{}' has more than one ':'",
                        s
                    )));
                }
                let from = if from.trim().is_empty() {
                    RevisionSpec::Base
                } else {
                    RevisionSpec::parse_single(from)?
                };
                let to = if to.trim().is_empty() {
                    RevisionSpec::Heads
                } else {
                    RevisionSpec::parse_single(to)?
                };
                Ok(RevisionSpec::range(from, to))
            }
        }
    }
}

impl fmt::Display for RevisionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSpec::Exact(id) => write!(f, "{}", id),
            RevisionSpec::Heads => write!(f, "heads"),
            RevisionSpec::Base => write!(f, "base"),
            RevisionSpec::Current => write!(f, "current"),
            RevisionSpec::Offset(n) => write!(f, "-{}", n),
            RevisionSpec::HeadOffset(n) => write!(f, "heads-{}", n),
            RevisionSpec::Range(from, to) => write!(f, "{}:{}", from, to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> RevisionSpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_symbolic_targets() {
        assert_eq!(parse("heads"), RevisionSpec::Heads);
        assert_eq!(parse("head"), RevisionSpec::Heads);
        assert_eq!(parse(" base "), RevisionSpec::Base);
        assert_eq!(parse("current"), RevisionSpec::Current);
        assert_eq!(parse("ae1027"), RevisionSpec::exact("ae1027"));
    }

    #[test]
    fn test_relative_targets() {
        assert_eq!(parse("-1"), RevisionSpec::Offset(1));
        assert_eq!(parse("-12"), RevisionSpec::Offset(12));
        assert_eq!(parse("heads-2"), RevisionSpec::HeadOffset(2));
        assert_eq!(parse("head-1"), RevisionSpec::HeadOffset(1));

        for bad in ["-0", "-x", "heads-", "+1"] {
            assert!(
                matches!(bad.parse::<RevisionSpec>(), Err(MigrateError::InvalidRangeSpec { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_ranges() {
        assert_eq!(
            parse("ae10:27c6"),
            RevisionSpec::range(RevisionSpec::exact("ae10"), RevisionSpec::exact("27c6"))
        );
        assert_eq!(
            parse(":27c6"),
            RevisionSpec::range(RevisionSpec::Base, RevisionSpec::exact("27c6"))
        );
        assert_eq!(
            parse("current:"),
            RevisionSpec::range(RevisionSpec::Current, RevisionSpec::Heads)
        );
        assert!("a:b:c".parse::<RevisionSpec>().is_err());
        assert!("".parse::<RevisionSpec>().is_err());
    }

    #[test]
    fn test_display_round_trips_canonical_forms() {
        for text in ["heads", "base", "current", "-2", "heads-1", "ae10:heads", "base:27c6"] {
            assert_eq!(parse(text).to_string(), text);
        }
        assert_eq!(parse("head").to_string(), "heads");
    }

    #[test]
    fn test_endpoints() {
        let spec = parse("27c6");
        assert_eq!(spec.endpoints(), (&RevisionSpec::Base, &spec));

        let range = parse("a:b");
        let (from, to) = range.endpoints();
        assert_eq!(from, &RevisionSpec::exact("a"));
        assert_eq!(to, &RevisionSpec::exact("b"));
    }
}
