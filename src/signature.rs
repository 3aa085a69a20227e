//! Declarative handler signatures and argument extraction.
//!
//! A [`ViewSignature`] declares which values a handler expects and where they
//! come from. Extraction runs once per request, after checks pass, and
//! produces the kwargs map merged into the route context (or passed directly
//! to plain handlers). Coercion failures surface as 422 validation errors.

use serde_json::Value;

use crate::context::RequestData;
use crate::error::ApiError;
use crate::types::Kwargs;

/// Where a declared parameter is read from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamSource {
    Path,
    Query,
    Body,
}

/// Target type a raw parameter string is coerced into.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
    Json,
}

impl ParamKind {
    fn from_converter(token: &str) -> Option<ParamKind> {
        match token {
            "str" => Some(ParamKind::Str),
            "int" => Some(ParamKind::Int),
            "float" => Some(ParamKind::Float),
            "bool" => Some(ParamKind::Bool),
            _ => None,
        }
    }

    fn coerce(self, name: &str, raw: &str) -> Result<Value, ApiError> {
        let invalid = |expected: &str| {
            ApiError::validation(format!(
                "parameter `{name}`: expected {expected}, got `{raw}`"
            ))
        };
        match self {
            ParamKind::Str => Ok(Value::String(raw.to_string())),
            ParamKind::Int => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid("an integer")),
            ParamKind::Float => raw
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| invalid("a number")),
            ParamKind::Bool => match raw {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid("a boolean")),
            },
            ParamKind::Json => {
                serde_json::from_str(raw).map_err(|_| invalid("a JSON value"))
            }
        }
    }
}

/// One declared handler parameter.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub source: ParamSource,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

/// The full set of parameters a handler expects.
#[derive(Clone, Debug, Default)]
pub struct ViewSignature {
    params: Vec<ParamSpec>,
}

impl ViewSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature derived from a route path: each `{name}` or `{kind:name}`
    /// segment becomes a required path parameter, with the converter hint
    /// selecting the coercion (`{int:id}` yields an integer kwarg).
    pub fn from_path(path: &str) -> Self {
        let mut signature = Self::new();
        for (kind, name) in parse_converters(path) {
            signature.params.push(ParamSpec {
                name,
                source: ParamSource::Path,
                kind,
                required: true,
                default: None,
            });
        }
        signature
    }

    pub fn query(mut self, name: &str, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            source: ParamSource::Query,
            kind,
            required: true,
            default: None,
        });
        self
    }

    pub fn query_optional(mut self, name: &str, kind: ParamKind, default: Option<Value>) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            source: ParamSource::Query,
            kind,
            required: false,
            default,
        });
        self
    }

    /// Declare the whole JSON body as one kwarg.
    pub fn body(mut self, name: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            source: ParamSource::Body,
            kind: ParamKind::Json,
            required: true,
            default: None,
        });
        self
    }

    pub fn body_optional(mut self, name: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            source: ParamSource::Body,
            kind: ParamKind::Json,
            required: false,
            default: None,
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub(crate) fn push_spec(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Resolve every declared parameter against the request.
    pub fn extract(&self, request: &RequestData) -> Result<Kwargs, ApiError> {
        let mut kwargs = Kwargs::new();
        let query: Vec<(String, String)> = request
            .query_string()
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        for spec in &self.params {
            let value = match spec.source {
                ParamSource::Path => match request.path_param(&spec.name) {
                    Some(raw) => Some(spec.kind.coerce(&spec.name, raw)?),
                    // A declared path parameter the router never matched means
                    // the signature and the route pattern disagree.
                    None => {
                        return Err(ApiError::validation(format!(
                            "path parameter `{}` was not matched by the route; \
                             check that the route pattern declares `{{{}}}`",
                            spec.name, spec.name
                        )))
                    }
                },
                ParamSource::Query => query
                    .iter()
                    .find(|(k, _)| k == &spec.name)
                    .map(|(_, raw)| spec.kind.coerce(&spec.name, raw))
                    .transpose()?,
                ParamSource::Body => request.json_body()?,
            };

            match value {
                Some(value) => {
                    kwargs.insert(spec.name.clone(), value);
                }
                None if spec.required => {
                    return Err(ApiError::validation(format!(
                        "missing required parameter `{}`",
                        spec.name
                    )))
                }
                None => {
                    if let Some(default) = &spec.default {
                        kwargs.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(kwargs)
    }
}

/// Converter segments of a route path: `{int:id}` yields `(Int, "id")`,
/// a bare `{id}` yields `(Str, "id")`. Unknown converter tokens are kept as
/// part of the name so the mismatch surfaces at extraction time.
pub(crate) fn parse_converters(path: &str) -> Vec<(ParamKind, String)> {
    let mut out = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let inner = &rest[open + 1..open + close];
        let (kind, name) = match inner.split_once(':') {
            Some((token, name)) => match ParamKind::from_converter(token) {
                Some(kind) => (kind, name),
                None => (ParamKind::Str, inner),
            },
            None => (ParamKind::Str, inner),
        };
        if !name.is_empty() {
            out.push((kind, name.to_string()));
        }
        rest = &rest[open + close + 1..];
    }
    out
}

/// The path with converter hints stripped to plain `{name}` segments, the
/// syntax the router expects.
pub(crate) fn strip_converters(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let inner = &rest[open + 1..open + close];
        out.push_str(&rest[..open]);
        out.push('{');
        match inner.split_once(':') {
            Some((token, name)) if ParamKind::from_converter(token).is_some() => {
                out.push_str(name)
            }
            _ => out.push_str(inner),
        }
        out.push('}');
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}
