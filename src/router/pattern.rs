//! Route template compilation and matching.
//!
//! A template is a literal path with zero or more named-parameter tokens of
//! the form `:name(expr)`. Each token is rewritten into the capturing group
//! `(expr)` and the result is compiled as a case-insensitive regular
//! expression. Templates without tokens are compared literally.
//!
//! | Template                  | Path       | Parameters              |
//! |---------------------------|------------|-------------------------|
//! | `/status`                 | `/status`  | *(none)*                |
//! | `/user/:id([0-9]+)`       | `/user/42` | `id → "42"`             |
//! | `/:a([a-z]+)/:b([0-9]+)`  | `/foo/7`   | `a → "foo"`, `b → "7"`  |
//!
//! Regex templates are searched for anywhere in the path, not anchored to
//! it: `/user/:id([0-9]+)` also matches `/api/user/42/edit`. Add `^` and `$`
//! to the template to pin it to the whole path.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::debug;

use crate::http::{MethodFilter, Request};

static NAMED_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i):([_a-z0-9]+)\(([^)]*)\)").expect("named parameter parser should be valid")
});

/// Errors raised while compiling a route template.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("route template is empty")]
    Empty,

    #[error("parameter `{name}` appears more than once in `{template}`")]
    DuplicateParameter { template: String, name: String },

    #[error("`{template}` does not compile to a valid regular expression: {source}")]
    InvalidRegex {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("`{template}` declares {expected} parameter(s) but compiles to {found} capture group(s)")]
    CaptureMismatch {
        template: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Regex(Regex),
}

/// A compiled route template together with its method constraint.
///
/// ```
/// use waypost::http::{Method, MethodFilter, Request};
/// use waypost::router::RoutePattern;
///
/// let pattern = RoutePattern::compile("/user/:id([0-9]+)", MethodFilter::Any).unwrap();
/// assert_eq!(pattern.parameter_names(), ["id"]);
///
/// let mut request = Request::new(Method::Get, "/user/42");
/// assert!(pattern.matches(&mut request));
/// assert_eq!(request.param("id"), Some("42"));
/// ```
#[derive(Debug, Clone)]
pub struct RoutePattern {
    template: String,
    matcher: Matcher,
    names: Vec<String>,
    method: MethodFilter,
}

impl RoutePattern {
    /// Compiles `template`, restricting it to requests allowed by `method`.
    ///
    /// # Errors
    ///
    /// See [`PatternError`]. In particular, an expression that contains a
    /// capturing group of its own is rejected with
    /// [`PatternError::CaptureMismatch`]; use `(?:...)` inside parameter
    /// expressions instead.
    pub fn compile(template: &str, method: MethodFilter) -> Result<Self, PatternError> {
        if template.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut names: Vec<String> = Vec::new();
        let mut rewritten = String::with_capacity(template.len());
        let mut cursor = 0;

        // Scanning always resumes after the consumed token, so the loop ends
        // even when an expression looks like another token.
        for caps in NAMED_PARAM.captures_iter(template) {
            let token = caps.get_match();
            let (_, [name, expr]) = caps.extract();

            if names.iter().any(|n| n == name) {
                return Err(PatternError::DuplicateParameter {
                    template: template.to_owned(),
                    name: name.to_owned(),
                });
            }

            debug!(template, token = token.as_str(), name, expr, "found named parameter");

            rewritten.push_str(&template[cursor..token.start()]);
            rewritten.push('(');
            rewritten.push_str(expr);
            rewritten.push(')');
            cursor = token.end();
            names.push(name.to_owned());
        }

        if names.is_empty() {
            return Ok(Self {
                template: template.to_owned(),
                matcher: Matcher::Literal(template.to_owned()),
                names,
                method,
            });
        }

        rewritten.push_str(&template[cursor..]);
        debug!(template, rewritten = %rewritten, "compiling route expression");

        let regex = RegexBuilder::new(&rewritten)
            .case_insensitive(true)
            .build()
            .map_err(|source| PatternError::InvalidRegex {
                template: template.to_owned(),
                source,
            })?;

        let found = regex.captures_len() - 1;
        if found != names.len() {
            return Err(PatternError::CaptureMismatch {
                template: template.to_owned(),
                expected: names.len(),
                found,
            });
        }

        Ok(Self {
            template: template.to_owned(),
            matcher: Matcher::Regex(regex),
            names,
            method,
        })
    }

    /// The template as it was registered.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn method(&self) -> &MethodFilter {
        &self.method
    }

    /// Parameter names in declaration order.
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    /// `true` if the template declared at least one named parameter.
    pub fn is_regex(&self) -> bool {
        matches!(self.matcher, Matcher::Regex(_))
    }

    /// Tests `request` against this pattern.
    ///
    /// On success every captured group is stored in the request's parameters
    /// under its declared name. A failed match leaves the request untouched.
    pub fn matches(&self, request: &mut Request) -> bool {
        if !self.method.allows(request.method()) {
            return false;
        }

        let regex = match &self.matcher {
            Matcher::Literal(path) => return request.path() == path,
            Matcher::Regex(regex) => regex,
        };

        let values: Vec<String> = match regex.captures(request.path()) {
            Some(caps) if caps.len() == self.names.len() + 1 => caps
                .iter()
                .skip(1)
                .map(|group| group.map_or("", |m| m.as_str()).to_owned())
                .collect(),
            _ => return false,
        };

        for (name, value) in self.names.iter().zip(&values) {
            request.set_parameter(name, value);
        }
        true
    }
}
