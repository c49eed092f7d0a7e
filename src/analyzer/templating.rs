//! Path templating: literal request paths collapse to parameterized templates.
//!
//! The same rule is used by the pattern analyzer and the synthesizer, so a
//! given literal path always lands on the same template.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});
static OBJECT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{24}$").unwrap());
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^v\d+$").unwrap());

/// Ordered resource-type table matched against the full URL. First match wins.
const RESOURCE_TYPE_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)/users?/", "user"),
    (r"(?i)/auth/", "auth"),
    (r"(?i)/(login|logout|oauth|session)", "auth"),
    (r"(?i)/graphql", "graphql"),
    (r"(?i)/products?/", "product"),
    (r"(?i)/orders?/", "order"),
    (r"(?i)/search", "search"),
    (r"(?i)/v\d+/", "versioned-api"),
    (r"(?i)/api/", "api"),
    (r"(?i)\.(js|css|png|jpe?g|gif|svg|ico|woff2?)(\?|$)", "static"),
];

static RESOURCE_TYPES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    RESOURCE_TYPE_PATTERNS
        .iter()
        .map(|(pattern, label)| (Regex::new(pattern).unwrap(), *label))
        .collect()
});

pub const UNKNOWN_RESOURCE_TYPE: &str = "unknown";

/// Kind of identifier a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    Id,
    Uuid,
    ObjectId,
}

impl PlaceholderKind {
    /// Classify one path segment. Numeric check runs first.
    pub fn classify(segment: &str) -> Option<Self> {
        if NUMERIC_RE.is_match(segment) {
            Some(Self::Id)
        } else if UUID_RE.is_match(segment) {
            Some(Self::Uuid)
        } else if OBJECT_ID_RE.is_match(segment) {
            Some(Self::ObjectId)
        } else {
            None
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Uuid => "uuid",
            Self::ObjectId => "objectId",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub kind: PlaceholderKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A path with identifier segments replaced by `{placeholder}` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn from_path(path: &str) -> Self {
        let mut used: HashSet<String> = HashSet::new();
        let mut previous_literal: Option<&str> = None;
        let mut segments = Vec::new();
        let mut rendered = Vec::new();

        for raw in path.split('/') {
            if raw.is_empty() {
                rendered.push(String::new());
                continue;
            }
            match PlaceholderKind::classify(raw) {
                Some(kind) => {
                    let name = placeholder_name(kind, previous_literal, &mut used);
                    rendered.push(format!("{{{}}}", name));
                    segments.push(Segment::Placeholder(Placeholder { name, kind }));
                }
                None => {
                    previous_literal = Some(raw);
                    rendered.push(raw.to_string());
                    segments.push(Segment::Literal(raw.to_string()));
                }
            }
        }

        let joined = rendered.join("/");
        let template = if joined.starts_with('/') {
            joined
        } else {
            format!("/{}", joined)
        };

        Self { template, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholders in path order.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    fn literals(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Literal(l) => Some(l.as_str()),
            Segment::Placeholder(_) => None,
        })
    }

    /// Last literal segment, which names the resource the template addresses.
    pub fn resource_segment(&self) -> Option<&str> {
        self.literals().next_back()
    }

    /// Placeholder directly following the resource segment, which identifies
    /// a member of that resource (`{uuid}` in `/orders/{uuid}/items`, none for
    /// `/teams/{uuid}/members`).
    pub fn placeholder_after_resource(&self) -> Option<&Placeholder> {
        let last_literal = self
            .segments
            .iter()
            .rposition(|s| matches!(s, Segment::Literal(_)))?;
        match self.segments.get(last_literal + 1) {
            Some(Segment::Placeholder(p)) => Some(p),
            _ => None,
        }
    }

    /// Segment used for operation naming: the resource segment, or the
    /// placeholder name when the template holds nothing but placeholders.
    pub fn naming_segment(&self) -> Option<&str> {
        self.resource_segment().or_else(|| {
            self.placeholders().last().map(|p| p.name.as_str())
        })
    }

    /// A collection template ends on a literal segment (`/users`, not `/users/{id}`).
    pub fn is_collection(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Literal(_)))
    }

    /// First literal segment that is neither `api` nor a version prefix.
    pub fn tag_segment(&self) -> Option<&str> {
        self.literals()
            .find(|l| !l.eq_ignore_ascii_case("api") && !VERSION_RE.is_match(l))
    }

    /// Up to `n` leading non-empty segments, in templated form.
    pub fn leading_segments(&self, n: usize) -> Vec<String> {
        self.segments
            .iter()
            .take(n)
            .map(|s| match s {
                Segment::Literal(l) => l.clone(),
                Segment::Placeholder(p) => format!("{{{}}}", p.name),
            })
            .collect()
    }
}

fn placeholder_name(
    kind: PlaceholderKind,
    previous_literal: Option<&str>,
    used: &mut HashSet<String>,
) -> String {
    let token = kind.token();
    if used.insert(token.to_string()) {
        return token.to_string();
    }
    if let Some(literal) = previous_literal {
        let contextual = format!("{}{}", camel_case(literal, false), capitalize(token));
        if contextual.len() > token.len() && used.insert(contextual.clone()) {
            return contextual;
        }
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}{}", token, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Template a literal path. Deterministic: equal inputs give equal templates.
pub fn template_path(path: &str) -> String {
    PathTemplate::from_path(path).template
}

/// `host/seg1/seg2` grouping key built from the templated path.
pub fn grouping_key(url: &Url, template: &PathTemplate) -> String {
    let host = url.host_str().unwrap_or_default();
    let mut key = host.to_string();
    for segment in template.leading_segments(2) {
        key.push('/');
        key.push_str(&segment);
    }
    key
}

/// Resource type of a URL according to the static matcher table.
pub fn detect_resource_type(url: &str) -> &'static str {
    RESOURCE_TYPES
        .iter()
        .find(|(re, _)| re.is_match(url))
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_RESOURCE_TYPE)
}

/// Media type without parameters, lower-cased (`application/json; charset=utf-8` -> `application/json`).
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join alphanumeric runs into camelCase (`user-profiles` -> `userProfiles`).
pub fn camel_case(s: &str, upper_first: bool) -> String {
    let mut out = String::new();
    for (i, word) in s
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        if i == 0 && !upper_first {
            out.push_str(word);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}
