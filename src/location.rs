use std::fmt::{self, Display};

use crate::RewriteConfig;

/// A URL split into the six components used when rewriting service locations.
///
/// Splitting never normalises anything, so formatting an unmodified
/// value gives back the original text as long as every component was present.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub scheme: String,
    pub netloc: String,
    pub path: String,
    pub params: String,
    pub query: String,
    pub fragment: String,
}

fn is_scheme_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
}

impl ParsedLocation {
    pub fn parse(url: &str) -> Self {
        let mut rest = url;

        let mut scheme = "";
        if let Some(idx) = rest.find(':') {
            let candidate = &rest[..idx];
            let starts_alpha = candidate.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
            if starts_alpha && candidate.chars().all(is_scheme_char) {
                scheme = candidate;
                rest = &rest[idx + 1..];
            }
        }

        let mut netloc = "";
        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find(['/', '?', '#']).unwrap_or(after.len());
            netloc = &after[..end];
            rest = &after[end..];
        }

        // The fragment takes everything after the first '#', '?' included.
        let mut fragment = "";
        if let Some((before, after)) = rest.split_once('#') {
            fragment = after;
            rest = before;
        }

        let mut query = "";
        if let Some((before, after)) = rest.split_once('?') {
            query = after;
            rest = before;
        }

        // Params only ever belong to the last path segment.
        let last_segment = rest.rfind('/').unwrap_or(0);
        let (path, params) = match rest[last_segment..].find(';') {
            Some(idx) => (&rest[..last_segment + idx], &rest[last_segment + idx + 1..]),
            None => (rest, ""),
        };

        Self {
            scheme: scheme.into(),
            netloc: netloc.into(),
            path: path.into(),
            params: params.into(),
            query: query.into(),
            fragment: fragment.into(),
        }
    }

    /// Rebuilds the URL with the scheme and host replaced where `config` sets them.
    pub fn rewrite(&self, config: &RewriteConfig) -> String {
        let scheme = config.scheme.as_deref().unwrap_or(&self.scheme);
        let netloc = config.host.as_deref().unwrap_or(&self.netloc);
        self.assemble(scheme, netloc)
    }

    fn assemble(&self, scheme: &str, netloc: &str) -> String {
        let mut url = format!("{scheme}://{netloc}{}", self.path);
        if !self.params.is_empty() {
            url.push(';');
            url.push_str(&self.params);
        }
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            url.push('#');
            url.push_str(&self.fragment);
        }
        url
    }
}

impl Display for ParsedLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.assemble(&self.scheme, &self.netloc))
    }
}
