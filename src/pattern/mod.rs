//! Placeholder templates compiled to named-capture regular expressions.
//!
//! A template is regex source with placeholders such as `{title}` standing
//! in for the parts to capture:
//!
//! ```text
//! <a href="{link}">{title}</a>   →   <a href="(?P<link>(?s:.+?))">(?P<title>(?s:.+?))</a>
//! ```
//!
//! Text between placeholders is passed through to the regex untouched.

mod validate;

pub use validate::{is_valid, validate, PatternSet};

use regex::Regex;

use crate::app::{PagefeedError, Result};

/// The fixed placeholder vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Title,
    Link,
    Description,
    PubDate,
    Filter,
    Any,
}

/// How much text a capture fragment must consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    OneOrMore,
    ZeroOrMore,
}

impl Placeholder {
    pub const ALL: [Placeholder; 6] = [
        Self::Title,
        Self::Link,
        Self::Description,
        Self::PubDate,
        Self::Filter,
        Self::Any,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Link => "link",
            Self::Description => "description",
            Self::PubDate => "pubdate",
            Self::Filter => "filter",
            Self::Any => "any",
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Title => "{title}",
            Self::Link => "{link}",
            Self::Description => "{description}",
            Self::PubDate => "{pubdate}",
            Self::Filter => "{filter}",
            Self::Any => "{any}",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Placeholder → fragment table: (captured, span).
    fn shape(self) -> (bool, Span) {
        match self {
            Self::Title | Self::Link | Self::PubDate | Self::Filter => (true, Span::OneOrMore),
            Self::Description => (true, Span::ZeroOrMore),
            Self::Any => (false, Span::ZeroOrMore),
        }
    }

    fn fragment(self, group: &str) -> String {
        let (captured, span) = self.shape();
        let body = match span {
            Span::OneOrMore => "(?s:.+?)",
            Span::ZeroOrMore => "(?s:.*?)",
        };
        if captured {
            format!("(?P<{}>{})", group, body)
        } else {
            body.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Literal(&'a str),
    Placeholder(Placeholder),
}

/// Split a template into literal runs and known placeholders.
///
/// Braces that do not spell a known placeholder stay in the literal text, so
/// regex repetitions like `a{2}` survive.
pub fn tokenize(template: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while let Some(offset) = template[pos..].find('{') {
        let open = pos + offset;
        let placeholder = template[open + 1..].find('}').and_then(|len| {
            Placeholder::from_name(&template[open + 1..open + 1 + len]).map(|p| (p, len))
        });

        match placeholder {
            Some((p, len)) => {
                if literal_start < open {
                    tokens.push(Token::Literal(&template[literal_start..open]));
                }
                tokens.push(Token::Placeholder(p));
                pos = open + len + 2;
                literal_start = pos;
            }
            None => pos = open + 1,
        }
    }

    if literal_start < template.len() {
        tokens.push(Token::Literal(&template[literal_start..]));
    }
    tokens
}

/// Number of times `placeholder` occurs in `template`.
pub fn count(template: &str, placeholder: Placeholder) -> usize {
    tokenize(template)
        .into_iter()
        .filter(|t| *t == Token::Placeholder(placeholder))
        .count()
}

/// Translate a template into regex source.
///
/// Repeated `{filter}` placeholders get distinct group names (`filter`,
/// `filter_2`, ...); the returned list holds them in order.
fn translate(template: &str) -> (String, Vec<String>) {
    let mut source = String::with_capacity(template.len() * 2);
    let mut filter_groups = Vec::new();

    for token in tokenize(template) {
        match token {
            Token::Literal(text) => source.push_str(text),
            Token::Placeholder(Placeholder::Filter) => {
                let group = match filter_groups.len() {
                    0 => "filter".to_string(),
                    n => format!("filter_{}", n + 1),
                };
                source.push_str(&Placeholder::Filter.fragment(&group));
                filter_groups.push(group);
            }
            Token::Placeholder(p) => {
                source.push_str(&p.fragment(p.name()));
            }
        }
    }

    (source, filter_groups)
}

/// Compile a template to a regex.
pub fn compile(template: &str) -> Result<Regex> {
    let (source, _) = translate(template);
    Ok(Regex::new(&source)?)
}

/// A compiled template. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    regex: Regex,
    filter_groups: Vec<String>,
}

impl CompiledPattern {
    pub fn new(template: &str) -> Result<Self> {
        let (source, filter_groups) = translate(template);
        let regex = Regex::new(&source).map_err(|e| {
            PagefeedError::Pattern(format!("failed to compile pattern {:?}: {}", template, e))
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            filter_groups,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Names of the capture groups in the compiled regex.
    pub fn group_names(&self) -> Vec<&str> {
        self.regex.capture_names().flatten().collect()
    }

    /// Concatenate every `{filter}` capture of every match, in order.
    ///
    /// Returns `None` when the pattern does not match at all.
    pub fn filter(&self, body: &str) -> Option<String> {
        let mut matched = false;
        let mut out = String::new();

        for caps in self.regex.captures_iter(body) {
            matched = true;
            for group in &self.filter_groups {
                if let Some(m) = caps.name(group) {
                    out.push_str(m.as_str());
                }
            }
        }

        matched.then_some(out)
    }
}

impl std::fmt::Display for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}
