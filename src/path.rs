//! Hierarchical entity paths such as `2P33/1/A/SER`72/OG`.
//!
//! The database stores them as `ptree` labels and answers `pquery` patterns;
//! this module parses both on the client so patterns are validated before
//! they are sent and can be evaluated against already loaded paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CredoError;
use crate::sql::{BinaryOp, ColumnRef, Expr};

pub const SEPARATOR: char = '/';

/// Marker label placed between chain and residue for protein fragments.
pub const PROT_FRAGMENT_PREFIX: &str = "PF:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityPath {
    labels: Vec<String>,
}

impl EntityPath {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Result<Self, CredoError> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(CredoError::invalid("path must have at least one label"));
        }
        if let Some(bad) = labels
            .iter()
            .find(|l| l.is_empty() || l.contains(SEPARATOR))
        {
            return Err(CredoError::invalid(format!("invalid path label '{bad}'")));
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    /// The PDB code at the root of the path.
    pub fn pdb(&self) -> &str {
        &self.labels[0]
    }

    pub fn parent(&self) -> Option<EntityPath> {
        (self.labels.len() > 1).then(|| EntityPath {
            labels: self.labels[..self.labels.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, label: impl Into<String>) -> Result<EntityPath, CredoError> {
        let mut labels = self.labels.clone();
        labels.push(label.into());
        EntityPath::new(labels)
    }

    /// True when `self` equals `ancestor` or lies below it.
    pub fn is_descendant_of(&self, ancestor: &EntityPath) -> bool {
        self.labels.starts_with(&ancestor.labels)
    }

    /// The protein fragment serial when the path runs through a `PF:N` label.
    pub fn prot_fragment_serial(&self) -> Option<i32> {
        self.labels
            .iter()
            .find_map(|l| l.strip_prefix(PROT_FRAGMENT_PREFIX))
            .and_then(|n| n.parse().ok())
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels.join("/"))
    }
}

impl FromStr for EntityPath {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches(SEPARATOR);
        EntityPath::new(trimmed.split(SEPARATOR))
    }
}

/// One label pattern: literal text with optional `*` wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelGlob(String);

impl LabelGlob {
    fn matches(&self, label: &str) -> bool {
        glob_match(self.0.as_bytes(), label.as_bytes())
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some((c, rest)) => text
            .split_first()
            .is_some_and(|(t, tail)| t == c && glob_match(rest, tail)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// A bare `*`: zero or more labels.
    AnyLabels,
    /// One label matching any of the alternatives.
    Label(Vec<LabelGlob>),
}

/// A path pattern: `/`-separated segments where a bare `*` spans any number
/// of labels, `A|B` or `{A,B}` lists alternatives and `*` inside a label is a
/// wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, CredoError> {
        let trimmed = pattern.trim().trim_matches(SEPARATOR);
        if trimmed.is_empty() {
            return Err(CredoError::invalid("empty path pattern"));
        }

        let mut segments = Vec::new();
        for raw in trimmed.split(SEPARATOR) {
            if raw == "*" {
                // consecutive multi-label wildcards collapse into one
                if segments.last() != Some(&Segment::AnyLabels) {
                    segments.push(Segment::AnyLabels);
                }
                continue;
            }
            let body = match (raw.strip_prefix('{'), raw.ends_with('}')) {
                (Some(inner), true) => inner.trim_end_matches('}').replace(',', "|"),
                (None, false) => raw.to_string(),
                _ => {
                    return Err(CredoError::invalid(format!(
                        "unbalanced braces in path pattern segment '{raw}'"
                    )));
                }
            };
            if body.contains(['{', '}']) {
                return Err(CredoError::invalid(format!(
                    "nested braces in path pattern segment '{raw}'"
                )));
            }
            let alternatives: Vec<LabelGlob> = body
                .split('|')
                .map(|alt| LabelGlob(alt.trim().to_string()))
                .collect();
            if alternatives.iter().any(|alt| alt.0.is_empty()) {
                return Err(CredoError::invalid(format!(
                    "empty alternative in path pattern segment '{raw}'"
                )));
            }
            segments.push(Segment::Label(alternatives));
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &EntityPath) -> bool {
        matches_segments(&self.segments, path.labels())
    }

    /// The pattern in the database's `pquery` syntax.
    pub fn to_query_string(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::AnyLabels => "*".to_string(),
                Segment::Label(alts) => alts
                    .iter()
                    .map(|alt| alt.0.as_str())
                    .collect::<Vec<_>>()
                    .join("|"),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn matches_segments(segments: &[Segment], labels: &[String]) -> bool {
    match segments.split_first() {
        None => labels.is_empty(),
        Some((Segment::AnyLabels, rest)) => {
            (0..=labels.len()).any(|skip| matches_segments(rest, &labels[skip..]))
        }
        Some((Segment::Label(alts), rest)) => labels.split_first().is_some_and(|(label, tail)| {
            alts.iter().any(|alt| alt.matches(label)) && matches_segments(rest, tail)
        }),
    }
}

impl FromStr for PathPattern {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// `path ~ CAST(pattern AS pquery)`
pub fn match_expr(path: ColumnRef, pattern: &PathPattern) -> Expr {
    Expr::binary(
        BinaryOp::Matches,
        path,
        Expr::value(pattern.to_query_string()).cast("pquery"),
    )
}

/// `path <@ CAST(prefix AS ptree)`
pub fn descendant_expr(path: ColumnRef, prefix: &EntityPath) -> Expr {
    Expr::binary(
        BinaryOp::ContainedBy,
        path,
        Expr::value(prefix.to_string()).cast("ptree"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;

    fn path(s: &str) -> EntityPath {
        s.parse().expect("path")
    }

    #[test]
    fn parses_and_displays_paths() {
        let p = path("2P33/1/A/SER`72/OG");
        assert_eq!(p.depth(), 5);
        assert_eq!(p.pdb(), "2P33");
        assert_eq!(p.to_string(), "2P33/1/A/SER`72/OG");
        assert_eq!(p.parent().expect("parent").to_string(), "2P33/1/A/SER`72");
        assert!(path("2P33").parent().is_none());
        assert!("2P33//A".parse::<EntityPath>().is_err());
    }

    #[test]
    fn descendants_include_self() {
        let chain = path("2P33/1/A");
        assert!(path("2P33/1/A/SER`72").is_descendant_of(&chain));
        assert!(chain.is_descendant_of(&chain));
        assert!(!path("2P33/1/B").is_descendant_of(&chain));
        assert!(!path("2P33/1").is_descendant_of(&chain));
    }

    #[test]
    fn prot_fragment_labels() {
        let p = path("2P33/1/A/PF:12/SER`72");
        assert_eq!(p.prot_fragment_serial(), Some(12));
        assert_eq!(path("2P33/1/A").prot_fragment_serial(), None);
    }

    #[test]
    fn glob_segments_span_any_depth() {
        let pattern = PathPattern::parse("2P33/*/SER`72").expect("pattern");
        assert!(pattern.matches(&path("2P33/1/A/SER`72")));
        assert!(pattern.matches(&path("2P33/SER`72")));
        assert!(!pattern.matches(&path("2P33/1/A/SER`73")));
    }

    #[test]
    fn alternatives_and_label_wildcards() {
        let braces = PathPattern::parse("2P33/1/{A,B}/SER*").expect("pattern");
        let bars = PathPattern::parse("2P33/1/A|B/SER*").expect("pattern");
        for p in [&braces, &bars] {
            assert!(p.matches(&path("2P33/1/A/SER`72")));
            assert!(p.matches(&path("2P33/1/B/SER`9")));
            assert!(!p.matches(&path("2P33/1/C/SER`72")));
            assert!(!p.matches(&path("2P33/1/A/GLY`72")));
        }
        assert_eq!(braces.to_query_string(), "2P33/1/A|B/SER*");
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(PathPattern::parse("").is_err());
        assert!(PathPattern::parse("2P33/{A,B").is_err());
        assert!(PathPattern::parse("2P33/A||B").is_err());
    }

    #[test]
    fn trailing_glob_covers_every_descendant() {
        let root = path("2P33/1");
        let pattern = PathPattern::parse("2P33/1/*").expect("pattern");
        for candidate in ["2P33/1", "2P33/1/A", "2P33/1/A/SER`72/OG", "2P33/1/B/PF:3/GLY`5"] {
            let candidate = path(candidate);
            if candidate.is_descendant_of(&root) {
                assert!(pattern.matches(&candidate), "{candidate}");
            }
        }
    }

    #[test]
    fn renders_database_operators() {
        let col = ColumnRef::new("residues", "path");
        let names = SchemaNames::default();
        let m = match_expr(col, &PathPattern::parse("2P33/*").expect("pattern"));
        assert_eq!(m.to_sql().to_sql(&names), "residues.path ~ CAST($1 AS pquery)");
        let d = descendant_expr(col, &path("2P33/1"));
        assert_eq!(d.to_sql().to_sql(&names), "residues.path <@ CAST($1 AS ptree)");
    }
}
