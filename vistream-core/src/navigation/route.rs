use crate::error::{CoreError, Result};
use std::fmt;

/// A route location: path plus query string.
///
/// Two locations are the same route identity when both parts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteLocation {
    /// Normalized absolute path, always starting with `/`
    pub path: String,
    /// Query string without the leading `?`, possibly empty
    pub query: String,
}

impl RouteLocation {
    /// Parse an absolute target such as `/watch/12?t=30`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRoute`] if the target is empty or relative.
    pub fn parse(target: &str) -> Result<Self> {
        let target = strip_fragment(target.trim());
        if !target.starts_with('/') {
            return Err(CoreError::InvalidRoute {
                reason: format!("'{target}' is not an absolute path"),
            });
        }

        let (path, query) = split_query(target);
        Ok(Self {
            path: normalize_segments(path.split('/')),
            query: query.to_string(),
        })
    }

    /// Resolve a navigation target relative to this location.
    ///
    /// Absolute targets replace the location, `?query` targets keep the path,
    /// and anything else is joined onto the current path's directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRoute`] for an empty target.
    pub fn resolve(&self, to: &str) -> Result<Self> {
        let to = strip_fragment(to.trim());
        if to.is_empty() {
            return Err(CoreError::InvalidRoute {
                reason: "navigation target is empty".to_string(),
            });
        }

        if to.starts_with('/') {
            return Self::parse(to);
        }

        if let Some(query) = to.strip_prefix('?') {
            return Ok(Self {
                path: self.path.clone(),
                query: query.to_string(),
            });
        }

        let (relative, query) = split_query(to);
        let base_dir = self.path.rsplit_once('/').map_or("", |(dir, _)| dir);
        Ok(Self {
            path: normalize_segments(base_dir.split('/').chain(relative.split('/'))),
            query: query.to_string(),
        })
    }

    /// The location as a link target (`/path?query`)
    #[must_use]
    pub fn href(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

impl fmt::Display for RouteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

fn strip_fragment(target: &str) -> &str {
    target.split_once('#').map_or(target, |(before, _)| before)
}

fn split_query(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

fn normalize_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    format!("/{}", stack.join("/"))
}
