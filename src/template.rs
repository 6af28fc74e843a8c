//! Route templates and path-parameter extraction.
//!
//! A template is the resource path a proxy-event handler was declared for,
//! e.g. `/users/{userId}/orders/{orderId}`. A segment is literal text, a
//! `{name}` placeholder, or a mix of both (`/files/{name}.json`). A
//! placeholder may carry its own pattern, `{id:[0-9]+}`; without one it
//! matches one or more characters of its segment.
//!
//! Matching has two stages. A one-route [`matchit`] tree checks the literal
//! segments and captures each placeholder segment whole, so matching is
//! anchored at both ends and never crosses a `/`: a template with N segments
//! only ever matches a path with N segments. Segments that are not a bare
//! `{name}` are then checked against an anchored [`Regex`].

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;

use matchit::Router as MatchitRouter;
use regex::Regex;

/// Pattern of a placeholder declared without one.
const DEFAULT_PATTERN: &str = "[^/]+";

/// Why a route template failed to compile.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,

    #[error("template `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("unclosed `{{` in segment `{0}`")]
    UnclosedBrace(String),

    #[error("unmatched `}}` in segment `{0}`")]
    UnmatchedClosingBrace(String),

    #[error("nested `{{` in segment `{0}`")]
    NestedBrace(String),

    #[error("empty parameter name in segment `{0}`")]
    EmptyName(String),

    #[error("invalid parameter name `{0}`")]
    InvalidName(String),

    #[error("parameter `{0}` is declared more than once")]
    DuplicateName(String),

    /// A placeholder pattern that is not a valid regular expression.
    #[error("invalid pattern in segment `{segment}`: {message}")]
    Pattern { segment: String, message: String },

    /// Rejected by the underlying radix tree.
    #[error("{0}")]
    Router(String),
}

/// A compiled route template.
///
/// Compile once, share freely: matching takes `&self` and the template is
/// never mutated after [`RouteTemplate::compile`].
pub struct RouteTemplate {
    template: String,
    names: Vec<String>,
    tree: MatchitRouter<()>,
    segments: Vec<SegmentMatcher>,
}

/// How one placeholder-bearing segment turns into parameters.
struct SegmentMatcher {
    /// Parameter key of the segment in the matchit route.
    key: String,
    kind: SegmentKind,
}

enum SegmentKind {
    /// `{name}`: the whole segment is the value.
    Whole(String),
    /// Anything else: `(parameter, capture group)` pairs of `regex`.
    Pattern { regex: Regex, groups: Vec<(String, String)> },
}

/// A piece of a segment.
#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Literal(&'a str),
    Param { name: &'a str, pattern: Option<&'a str> },
}

impl RouteTemplate {
    /// Compiles `template`.
    ///
    /// ```rust
    /// use proxy_shim::RouteTemplate;
    ///
    /// let route = RouteTemplate::compile("/users/{userId}").unwrap();
    /// assert_eq!(route.extract("/users/42")["userId"], "42");
    /// assert!(route.extract("/users/42/orders").is_empty());
    ///
    /// let route = RouteTemplate::compile("/files/{name}.json").unwrap();
    /// assert_eq!(route.extract("/files/report.json")["name"], "report");
    /// ```
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        if template.is_empty() {
            return Err(TemplateError::Empty);
        }
        if !template.starts_with('/') {
            return Err(TemplateError::MissingLeadingSlash(template.to_owned()));
        }

        let mut names: Vec<String> = Vec::new();
        let mut segments = Vec::new();
        let mut route = String::new();

        for (index, segment) in template.split('/').skip(1).enumerate() {
            route.push('/');
            let pieces = parse_segment(segment)?;
            if !pieces.iter().any(|p| matches!(p, Piece::Param { .. })) {
                route.push_str(segment);
                continue;
            }

            for piece in &pieces {
                if let Piece::Param { name, .. } = piece {
                    if names.iter().any(|n| n == name) {
                        return Err(TemplateError::DuplicateName((*name).to_owned()));
                    }
                    names.push((*name).to_owned());
                }
            }

            let key = format!("s{index}");
            let _ = write!(route, "{{{key}}}");
            segments.push(SegmentMatcher { key, kind: segment_kind(segment, &pieces)? });
        }

        let mut tree = MatchitRouter::new();
        tree.insert(route, ())
            .map_err(|e| TemplateError::Router(e.to_string()))?;

        Ok(Self { template: template.to_owned(), names, tree, segments })
    }

    /// The template text as it was declared.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Parameter names in declaration order.
    pub fn parameters(&self) -> &[String] {
        &self.names
    }

    /// Whether `path` has this template's shape.
    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Extracts every placeholder from `path`.
    ///
    /// Returns an empty map when the path does not match. A template without
    /// placeholders also yields an empty map for a path that does match.
    pub fn extract(&self, path: &str) -> HashMap<String, String> {
        self.captures(path).unwrap_or_default()
    }

    fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let matched = self.tree.at(path).ok()?;
        let mut params = HashMap::with_capacity(self.names.len());

        for segment in &self.segments {
            let value = matched.params.get(&segment.key)?;
            match &segment.kind {
                SegmentKind::Whole(name) => {
                    // A placeholder needs at least one character.
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), value.to_owned());
                }
                SegmentKind::Pattern { regex, groups } => {
                    let caps = regex.captures(value)?;
                    for (name, group) in groups {
                        let v = caps.name(group).map_or("", |m| m.as_str());
                        params.insert(name.clone(), v.to_owned());
                    }
                }
            }
        }
        Some(params)
    }
}

impl fmt::Debug for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTemplate")
            .field("template", &self.template)
            .field("parameters", &self.names)
            .finish()
    }
}

/// Splits a segment into literal text and placeholders. Braces nest inside
/// a placeholder so patterns may use repetition counts (`{id:[0-9]{4}}`).
fn parse_segment(segment: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in segment.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    if i > start {
                        pieces.push(Piece::Literal(&segment[start..i]));
                    }
                    start = i + 1;
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    return Err(TemplateError::UnmatchedClosingBrace(segment.to_owned()));
                }
                depth -= 1;
                if depth == 0 {
                    pieces.push(parse_placeholder(segment, &segment[start..i])?);
                    start = i + 1;
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(TemplateError::UnclosedBrace(segment.to_owned()));
    }
    if start < segment.len() {
        pieces.push(Piece::Literal(&segment[start..]));
    }
    Ok(pieces)
}

/// Parses the text between a placeholder's braces: `name` or `name:pattern`.
fn parse_placeholder<'a>(segment: &str, body: &'a str) -> Result<Piece<'a>, TemplateError> {
    let (name, pattern) = match body.split_once(':') {
        Some((name, pattern)) => (name, Some(pattern).filter(|p| !p.is_empty())),
        None => (body, None),
    };

    if name.contains(['{', '}']) {
        return Err(TemplateError::NestedBrace(segment.to_owned()));
    }
    if name.is_empty() {
        return Err(TemplateError::EmptyName(segment.to_owned()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(TemplateError::InvalidName(name.to_owned()));
    }
    Ok(Piece::Param { name, pattern })
}

fn segment_kind(segment: &str, pieces: &[Piece<'_>]) -> Result<SegmentKind, TemplateError> {
    if let [Piece::Param { name, pattern: None }] = pieces {
        return Ok(SegmentKind::Whole((*name).to_owned()));
    }

    let mut source = String::from("^");
    let mut groups = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Literal(text) => source.push_str(&regex::escape(text)),
            Piece::Param { name, pattern } => {
                // Group names are positional; parameter names may contain `-`.
                let group = format!("p{}", groups.len());
                let _ = write!(source, "(?P<{group}>{})", pattern.unwrap_or(DEFAULT_PATTERN));
                groups.push(((*name).to_owned(), group));
            }
        }
    }
    source.push('$');

    let regex = Regex::new(&source).map_err(|e| TemplateError::Pattern {
        segment: segment.to_owned(),
        message: e.to_string(),
    })?;
    Ok(SegmentKind::Pattern { regex, groups })
}
