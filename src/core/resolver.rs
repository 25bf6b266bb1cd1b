//! Finds the newest download link on a vendor page whose URLs change with each
//! release.
//!
//! Only the shape of the links is known ahead of time, so each [`LinkPatterns`]
//! pair carries one `*` wildcard. The relative pattern is matched against every
//! hyperlink on the page and its wildcard captures the version token. The
//! winning token is then substituted into the absolute pattern to build the
//! download URL.

use crate::core::http::HttpTransport;
use crate::core::version;
use crate::error::{PgkitError, Result};
use regex::Regex;
use std::cmp::Ordering;

/// Characters a version token may contain: anything except path, query and
/// fragment delimiters, whitespace, quotes and angle brackets.
const TOKEN_CLASS: &str = r#"[^/?#\s"'<>]+"#;

const HREF_PATTERN: &str = r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#;

/// A pattern with exactly one `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    raw: String,
    prefix: String,
    suffix: String,
}

impl GlobPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let wildcards = pattern.matches('*').count();
        let invalid = |message: String| PgkitError::InvalidPattern {
            pattern: pattern.to_string(),
            message,
        };

        if wildcards != 1 {
            return Err(invalid(format!(
                "expected exactly one '*' version wildcard, found {wildcards}"
            )));
        }

        let (prefix, suffix) = pattern
            .split_once('*')
            .ok_or_else(|| invalid("missing '*' version wildcard".to_string()))?;

        Ok(Self {
            raw: pattern.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Regex matching the pattern anywhere in a string, capturing the token.
    fn matcher(&self) -> Result<Regex> {
        let source = format!(
            "{}({TOKEN_CLASS}){}",
            regex::escape(&self.prefix),
            regex::escape(&self.suffix)
        );
        Regex::new(&source).map_err(|e| PgkitError::InvalidPattern {
            pattern: self.raw.clone(),
            message: e.to_string(),
        })
    }

    /// The version token, if `candidate` contains a match.
    pub fn capture(&self, candidate: &str) -> Result<Option<String>> {
        Ok(self
            .matcher()?
            .captures(candidate)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()))
    }

    pub fn substitute(&self, token: &str) -> String {
        format!("{}{token}{}", self.prefix, self.suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPatterns {
    pub relative: GlobPattern,
    pub absolute: GlobPattern,
}

impl LinkPatterns {
    pub fn new(relative: &str, absolute: &str) -> Result<Self> {
        Ok(Self {
            relative: GlobPattern::parse(relative)?,
            absolute: GlobPattern::parse(absolute)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Absolute download URL.
    pub url: String,
    pub version: String,
    /// The hyperlink on the page that produced the version.
    pub source: String,
}

pub struct LinkResolver<'a> {
    transport: &'a dyn HttpTransport,
}

impl<'a> LinkResolver<'a> {
    pub fn new(transport: &'a dyn HttpTransport) -> Self {
        Self { transport }
    }

    /// Fetch `page_url` and pick the newest link matching `patterns`.
    ///
    /// `Ok(None)` means the page carried no matching link.
    pub fn resolve(&self, page_url: &str, patterns: &LinkPatterns) -> Result<Option<ResolvedLink>> {
        let page = self.transport.fetch_text(page_url)?;
        let resolved = select_latest(&page, patterns)?;

        match &resolved {
            Some(link) => tracing::info!("Resolved version {} -> {}", link.version, link.url),
            None => tracing::info!(
                "No link on {page_url} matches '{}'",
                patterns.relative.as_str()
            ),
        }
        Ok(resolved)
    }
}

/// Every hyperlink target in `html`, in document order.
pub fn scan_links(html: &str) -> Result<Vec<String>> {
    let href = Regex::new(HREF_PATTERN).map_err(|e| PgkitError::config_error(e.to_string()))?;

    Ok(href
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().trim().replace("&amp;", "&"))
        .filter(|link| !link.is_empty())
        .collect())
}

/// Choose the link with the highest version token. Ties keep the earliest link.
pub fn select_latest(page: &str, patterns: &LinkPatterns) -> Result<Option<ResolvedLink>> {
    let links = scan_links(page)?;
    let matcher = patterns.relative.matcher()?;

    let mut best: Option<(String, String)> = None;
    for link in links {
        let Some(token) = matcher
            .captures(&link)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };

        let newer = match &best {
            Some((best_token, _)) => version::compare(&token, best_token) == Ordering::Greater,
            None => true,
        };
        if newer {
            best = Some((token, link));
        }
    }

    let Some((version, source)) = best else {
        return Ok(None);
    };

    let url = patterns.absolute.substitute(&version);
    reqwest::Url::parse(&url).map_err(|e| PgkitError::InvalidPattern {
        pattern: patterns.absolute.as_str().to_string(),
        message: format!("'{url}' is not an absolute URL: {e}"),
    })?;

    Ok(Some(ResolvedLink {
        url,
        version,
        source,
    }))
}
