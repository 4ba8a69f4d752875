//! Route patterns.
//!
//! Besides `matchit`'s own `{name}` and `{*rest}` segments, patterns may use angle
//! brackets with an optional type:
//!
//! | pattern       | matches                              |
//! |---------------|--------------------------------------|
//! | `<id>`        | one path segment                     |
//! | `<id:str>`    | one path segment                     |
//! | `<id:int>`    | one path segment that parses as `i64`|
//! | `<rest:path>` | the remainder of the path, last only |

use crate::error::RouteError;
use crate::request::PathParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamKind {
    Str,
    Int,
    Path,
}

/// A pattern translated to `matchit` syntax, with the typed parameters it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoutePattern {
    path: String,
    int_params: Vec<String>,
}

impl RoutePattern {
    pub(crate) fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::invalid_pattern(pattern, "must start with '/'"));
        }

        let mut path = String::with_capacity(pattern.len());
        let mut int_params = vec![];
        let mut rest = pattern;

        while let Some(start) = rest.find(['<', '>']) {
            if rest[start..].starts_with('>') {
                return Err(RouteError::invalid_pattern(pattern, "unmatched '>'"));
            }
            path.push_str(&rest[..start]);

            let Some(len) = rest[start..].find('>') else {
                return Err(RouteError::invalid_pattern(pattern, "unclosed '<'"));
            };
            let (name, kind) = parse_param(pattern, &rest[start + 1..start + len])?;
            rest = &rest[start + len + 1..];

            match kind {
                ParamKind::Str => path.push_str(&format!("{{{name}}}")),
                ParamKind::Int => {
                    path.push_str(&format!("{{{name}}}"));
                    int_params.push(name.to_string());
                }
                ParamKind::Path if rest.is_empty() => path.push_str(&format!("{{*{name}}}")),
                ParamKind::Path => return Err(RouteError::invalid_pattern(pattern, "a path parameter must come last")),
            }
        }
        path.push_str(rest);

        Ok(Self { path, int_params })
    }

    /// The pattern in `matchit` syntax.
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Whether the captured values satisfy the declared parameter types.
    pub(crate) fn accepts(&self, params: &PathParams) -> bool {
        self.int_params.iter().all(|name| params.get(name).is_some_and(|value| value.parse::<i64>().is_ok()))
    }
}

fn parse_param<'a>(pattern: &str, param: &'a str) -> Result<(&'a str, ParamKind), RouteError> {
    let (name, kind) = match param.split_once(':') {
        None => (param, ParamKind::Str),
        Some((name, "str" | "string")) => (name, ParamKind::Str),
        Some((name, "int")) => (name, ParamKind::Int),
        Some((name, "path")) => (name, ParamKind::Path),
        Some((_, kind)) => return Err(RouteError::invalid_pattern(pattern, format!("unknown parameter type '{kind}'"))),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RouteError::invalid_pattern(pattern, format!("invalid parameter name '{name}'")));
    }
    Ok((name, kind))
}
