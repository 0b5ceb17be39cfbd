//! REST path patterns
//!
//! A pattern is a `/`-separated list of literal segments and `:name`
//! parameters, e.g. `/users/:id/posts`. Patterns are normalised on parse
//! (trailing slash removed) so that two spellings of the same route compare
//! equal as REST keys.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static LITERAL_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._~-]+$").expect("literal segment regex"));

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Whether `name` is usable as a path parameter, namespace or procedure name.
pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Error raised when a path pattern cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathPatternError {
    /// Pattern does not start with `/`.
    #[error("path '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    /// Pattern contains `//`.
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// A literal segment contains unsupported characters.
    #[error("invalid path segment '{segment}' in '{path}'")]
    InvalidSegment { path: String, segment: String },

    /// A `:param` segment has an invalid name.
    #[error("invalid parameter '{segment}' in '{path}'")]
    InvalidParam { path: String, segment: String },

    /// The same parameter name is used twice.
    #[error("duplicate parameter ':{name}' in '{path}'")]
    DuplicateParam { path: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parsed, normalised REST path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathPattern {
    normalized: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse and normalise a pattern.
    pub fn parse(raw: &str) -> Result<Self, PathPatternError> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PathPatternError::MissingLeadingSlash(raw.to_string()));
        };
        let trimmed = rest.strip_suffix('/').unwrap_or(rest);
        if trimmed.is_empty() && !rest.is_empty() {
            return Err(PathPatternError::EmptySegment(raw.to_string()));
        }
        let rest = trimmed;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for segment in rest.split('/') {
                if segment.is_empty() {
                    return Err(PathPatternError::EmptySegment(raw.to_string()));
                }
                if let Some(name) = segment.strip_prefix(':') {
                    if !is_identifier(name) {
                        return Err(PathPatternError::InvalidParam {
                            path: raw.to_string(),
                            segment: segment.to_string(),
                        });
                    }
                    if segments
                        .iter()
                        .any(|s| matches!(s, Segment::Param(existing) if existing == name))
                    {
                        return Err(PathPatternError::DuplicateParam {
                            path: raw.to_string(),
                            name: name.to_string(),
                        });
                    }
                    segments.push(Segment::Param(name.to_string()));
                } else if LITERAL_SEGMENT.is_match(segment) {
                    segments.push(Segment::Literal(segment.to_string()));
                } else {
                    return Err(PathPatternError::InvalidSegment {
                        path: raw.to_string(),
                        segment: segment.to_string(),
                    });
                }
            }
        }

        let normalized = format!("/{}", rest);
        Ok(Self {
            normalized,
            segments,
        })
    }

    /// The normalised pattern text.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Parameter names in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// The pattern with parameter names erased, e.g. `/users/:`. Patterns with
    /// the same shape match exactly the same request paths.
    pub fn shape(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => format!("/{}", literal),
                Segment::Param(_) => "/:".to_string(),
            })
            .collect()
    }

    /// Number of literal segments; more literals means a more specific route.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Match a concrete request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = path.strip_prefix('/')?;
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        if trimmed.is_empty() && !path.is_empty() {
            return None;
        }
        let path = trimmed;
        let parts: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl FromStr for PathPattern {
    type Err = PathPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PathPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized)
    }
}

impl<'de> Deserialize<'de> for PathPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_trailing_slash() {
        let a = PathPattern::parse("/users/").unwrap();
        let b = PathPattern::parse("/users").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "/users");
        assert_eq!(PathPattern::parse("/").unwrap().as_str(), "/");
    }

    #[test]
    fn parse_rejects_bad_patterns() {
        assert!(matches!(
            PathPattern::parse("users"),
            Err(PathPatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            PathPattern::parse("/users//id"),
            Err(PathPatternError::EmptySegment(_))
        ));
        assert!(matches!(
            PathPattern::parse("//"),
            Err(PathPatternError::EmptySegment(_))
        ));
        assert!(matches!(
            PathPattern::parse("/users//"),
            Err(PathPatternError::EmptySegment(_))
        ));
        assert!(matches!(
            PathPattern::parse("/users/:1id"),
            Err(PathPatternError::InvalidParam { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/us ers"),
            Err(PathPatternError::InvalidSegment { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/:id/b/:id"),
            Err(PathPatternError::DuplicateParam { .. })
        ));
    }

    #[test]
    fn matches_captures_params() {
        let pattern = PathPattern::parse("/users/:id/posts/:post_id").unwrap();
        let params = pattern.matches("/users/7/posts/99").unwrap();
        assert_eq!(params["id"], "7");
        assert_eq!(params["post_id"], "99");
        assert_eq!(pattern.params().collect::<Vec<_>>(), vec!["id", "post_id"]);

        assert!(pattern.matches("/users/7/posts").is_none());
        assert!(pattern.matches("/users/7/comments/99").is_none());
    }

    #[test]
    fn shape_ignores_parameter_names() {
        let id = PathPattern::parse("/users/:id/posts").unwrap();
        let uid = PathPattern::parse("/users/:uid/posts/").unwrap();
        assert_eq!(id.shape(), "/users/:/posts");
        assert_eq!(id.shape(), uid.shape());
        assert_ne!(id.shape(), PathPattern::parse("/users/me/posts").unwrap().shape());
        assert_eq!(PathPattern::parse("/").unwrap().shape(), "/");
    }

    #[test]
    fn root_matches_only_root() {
        let root = PathPattern::parse("/").unwrap();
        assert!(root.matches("/").is_some());
        assert!(root.matches("/health").is_none());
        assert!(root.matches("//").is_none());
    }

    #[test]
    fn specificity_counts_literals() {
        assert_eq!(PathPattern::parse("/users/me").unwrap().specificity(), 2);
        assert_eq!(PathPattern::parse("/users/:id").unwrap().specificity(), 1);
    }

    #[test]
    fn serde_uses_normalised_text() {
        let pattern = PathPattern::parse("/health/").unwrap();
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json, serde_json::json!("/health"));

        let back: PathPattern = serde_json::from_value(json).unwrap();
        assert_eq!(back, pattern);
        assert!(serde_json::from_value::<PathPattern>(serde_json::json!("nope")).is_err());
    }
}
