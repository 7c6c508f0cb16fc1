//! RFC6570 URI Template parsing and expansion.
//!
//! # Design
//! A template is parsed once into literal and expression parts and can then
//! be expanded any number of times against a `TemplateParams` bag. Output
//! order always follows the template, so the order in which parameters were
//! inserted never changes the resulting URI.
//!
//! `expand` implements RFC6570 level 4 and never fails: undefined variables
//! are dropped. `try_expand` treats the variables of simple (`{x}`) and
//! reserved (`{+x}`) expressions as required path segments and reports the
//! first one that is undefined or empty.
//!
//! Query expressions (`{?..}` and `{&..}`) skip empty strings as well as
//! undefined values, so an unset filter never leaves a dangling `name=`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while parsing or strictly expanding a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriTemplateError {
    #[error("unclosed expression starting at offset {offset}")]
    UnclosedExpression { offset: usize },

    #[error("unexpected '}}' at offset {offset}")]
    UnexpectedClose { offset: usize },

    #[error("empty expression at offset {offset}")]
    EmptyExpression { offset: usize },

    #[error("invalid variable name `{name}`")]
    InvalidVariable { name: String },

    #[error("invalid prefix modifier in `{spec}`")]
    InvalidPrefix { spec: String },

    /// A path variable had no value at expansion time.
    #[error("missing required variable `{name}`")]
    MissingVariable { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Simple,
    Reserved,
    Fragment,
    Label,
    Path,
    PathParam,
    Query,
    QueryContinuation,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Reserved),
            '#' => Some(Operator::Fragment),
            '.' => Some(Operator::Label),
            '/' => Some(Operator::Path),
            ';' => Some(Operator::PathParam),
            '?' => Some(Operator::Query),
            '&' => Some(Operator::QueryContinuation),
            _ => None,
        }
    }

    fn first(self) -> &'static str {
        match self {
            Operator::Simple | Operator::Reserved => "",
            Operator::Fragment => "#",
            Operator::Label => ".",
            Operator::Path => "/",
            Operator::PathParam => ";",
            Operator::Query => "?",
            Operator::QueryContinuation => "&",
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Operator::Simple | Operator::Reserved | Operator::Fragment => ",",
            Operator::Label => ".",
            Operator::Path => "/",
            Operator::PathParam => ";",
            Operator::Query | Operator::QueryContinuation => "&",
        }
    }

    fn named(self) -> bool {
        matches!(
            self,
            Operator::PathParam | Operator::Query | Operator::QueryContinuation
        )
    }

    fn if_empty(self) -> &'static str {
        match self {
            Operator::Query | Operator::QueryContinuation => "=",
            _ => "",
        }
    }

    fn allows_reserved(self) -> bool {
        matches!(self, Operator::Reserved | Operator::Fragment)
    }

    fn is_query(self) -> bool {
        matches!(self, Operator::Query | Operator::QueryContinuation)
    }

    fn is_required(self) -> bool {
        matches!(self, Operator::Simple | Operator::Reserved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Prefix(usize),
    Explode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VarSpec {
    name: String,
    modifier: Modifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Expression { op: Operator, vars: Vec<VarSpec> },
}

/// A parsed RFC6570 URI Template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    source: String,
    parts: Vec<Part>,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self, UriTemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(pos) = rest.find(&['{', '}'][..]) {
            let (before, tail) = rest.split_at(pos);
            literal.push_str(before);
            if tail.starts_with('}') {
                return Err(UriTemplateError::UnexpectedClose {
                    offset: offset + pos,
                });
            }
            let close = tail
                .find('}')
                .ok_or(UriTemplateError::UnclosedExpression {
                    offset: offset + pos,
                })?;
            if !literal.is_empty() {
                parts.push(Part::Literal(encode(&literal, true)));
                literal.clear();
            }
            parts.push(parse_expression(&tail[1..close], offset + pos)?);
            rest = &tail[close + 1..];
            offset += pos + close + 1;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(encode(&literal, true)));
        }

        Ok(Self {
            source: template.to_string(),
            parts,
        })
    }

    /// The template text this value was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Variable names in the order they appear in the template.
    pub fn variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Expression { vars, .. } => Some(vars),
                Part::Literal(_) => None,
            })
            .flatten()
            .map(|var| var.name.as_str())
            .collect()
    }

    /// Expand the template, omitting every undefined variable.
    pub fn expand(&self, params: &TemplateParams) -> String {
        self.render(params).0
    }

    /// Expand the template, failing when a path variable is undefined or
    /// empty.
    pub fn try_expand(&self, params: &TemplateParams) -> Result<String, UriTemplateError> {
        match self.render(params) {
            (uri, None) => Ok(uri),
            (_, Some(name)) => Err(UriTemplateError::MissingVariable { name }),
        }
    }

    fn render(&self, params: &TemplateParams) -> (String, Option<String>) {
        let mut out = String::with_capacity(self.source.len());
        let mut missing = None;
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Expression { op, vars } => {
                    expand_expression(&mut out, *op, vars, params, &mut missing)
                }
            }
        }
        (out, missing)
    }
}

impl FromStr for UriTemplate {
    type Err = UriTemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_expression(body: &str, offset: usize) -> Result<Part, UriTemplateError> {
    let (op, list) = match body.chars().next().and_then(Operator::from_char) {
        Some(op) => (op, &body[1..]),
        None => (Operator::Simple, body),
    };
    if list.is_empty() {
        return Err(UriTemplateError::EmptyExpression { offset });
    }
    let vars = list
        .split(',')
        .map(parse_varspec)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Part::Expression { op, vars })
}

fn parse_varspec(spec: &str) -> Result<VarSpec, UriTemplateError> {
    let (name, modifier) = if let Some(name) = spec.strip_suffix('*') {
        (name, Modifier::Explode)
    } else if let Some((name, len)) = spec.split_once(':') {
        let valid = !len.is_empty() && len.len() <= 4 && len.bytes().all(|b| b.is_ascii_digit());
        let len = len
            .parse::<usize>()
            .ok()
            .filter(|n| valid && *n > 0)
            .ok_or_else(|| UriTemplateError::InvalidPrefix {
                spec: spec.to_string(),
            })?;
        (name, Modifier::Prefix(len))
    } else {
        (spec, Modifier::None)
    };

    let valid_name = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '%'));
    if !valid_name {
        return Err(UriTemplateError::InvalidVariable {
            name: name.to_string(),
        });
    }

    Ok(VarSpec {
        name: name.to_string(),
        modifier,
    })
}

fn expand_expression(
    out: &mut String,
    op: Operator,
    vars: &[VarSpec],
    params: &TemplateParams,
    missing: &mut Option<String>,
) {
    let mut first = true;
    for var in vars {
        let Some(value) = params.get(&var.name).filter(|v| is_defined(v)) else {
            if op.is_required() && missing.is_none() {
                *missing = Some(var.name.clone());
            }
            continue;
        };

        let is_empty_string = value.as_str() == Some("");
        if is_empty_string && op.is_required() && missing.is_none() {
            *missing = Some(var.name.clone());
        }
        if is_empty_string && op.is_query() {
            continue;
        }

        out.push_str(if first { op.first() } else { op.separator() });
        first = false;

        match value {
            Value::Array(items) => expand_list(out, op, var, items),
            Value::Object(map) => expand_map(out, op, var, map),
            scalar => expand_scalar(out, op, var, &scalar_text(scalar)),
        }
    }
}

fn expand_scalar(out: &mut String, op: Operator, var: &VarSpec, text: &str) {
    let text = match var.modifier {
        Modifier::Prefix(len) => text.chars().take(len).collect::<String>(),
        _ => text.to_string(),
    };
    if op.named() {
        out.push_str(&var.name);
        if text.is_empty() {
            out.push_str(op.if_empty());
            return;
        }
        out.push('=');
    }
    out.push_str(&encode(&text, op.allows_reserved()));
}

fn expand_list(out: &mut String, op: Operator, var: &VarSpec, items: &[Value]) {
    let reserved = op.allows_reserved();
    if var.modifier == Modifier::Explode {
        let joined = items
            .iter()
            .map(|item| {
                let text = scalar_text(item);
                match (op.named(), text.is_empty()) {
                    (true, true) => format!("{}{}", var.name, op.if_empty()),
                    (true, false) => format!("{}={}", var.name, encode(&text, reserved)),
                    (false, _) => encode(&text, reserved),
                }
            })
            .collect::<Vec<_>>()
            .join(op.separator());
        out.push_str(&joined);
        return;
    }

    let joined = items
        .iter()
        .map(|item| encode(&scalar_text(item), reserved))
        .collect::<Vec<_>>()
        .join(",");
    if op.named() {
        out.push_str(&var.name);
        out.push('=');
    }
    out.push_str(&joined);
}

fn expand_map(out: &mut String, op: Operator, var: &VarSpec, map: &Map<String, Value>) {
    let reserved = op.allows_reserved();
    if var.modifier == Modifier::Explode {
        let joined = map
            .iter()
            .map(|(key, value)| {
                let text = scalar_text(value);
                if text.is_empty() {
                    format!("{}{}", encode(key, reserved), op.if_empty())
                } else {
                    format!("{}={}", encode(key, reserved), encode(&text, reserved))
                }
            })
            .collect::<Vec<_>>()
            .join(op.separator());
        out.push_str(&joined);
        return;
    }

    let joined = map
        .iter()
        .flat_map(|(key, value)| [encode(key, reserved), encode(&scalar_text(value), reserved)])
        .collect::<Vec<_>>()
        .join(",");
    if op.named() {
        out.push_str(&var.name);
        out.push('=');
    }
    out.push_str(&joined);
}

/// `null`, empty lists and empty objects count as undefined.
fn is_defined(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        // nested composites have no RFC6570 form; fall back to their JSON text
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn is_reserved(c: char) -> bool {
    matches!(
        c,
        ':' | '/' | '?' | '#' | '[' | ']' | '@' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+'
            | ',' | ';' | '='
    )
}

fn is_pct_triplet(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3 && bytes[0] == b'%' && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}

fn encode(text: &str, allow_reserved: bool) -> String {
    if !allow_reserved {
        return urlencoding::encode(text).into_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for (idx, c) in text.char_indices() {
        if is_reserved(c) || (c == '%' && is_pct_triplet(&text[idx..])) {
            out.push(c);
        } else {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}

/// Named values supplied to a template expansion.
///
/// Later insertions overwrite earlier ones, mirroring how option objects
/// are merged on top of positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParams {
    values: BTreeMap<String, Value>,
}

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Merge `other` into `self`; keys present in both take `other`'s value.
    pub fn merge(&mut self, other: TemplateParams) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build parameters from any value that serializes to a JSON object.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(map.into()),
            Value::Null => Ok(Self::default()),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "template parameters must be an object, got {other}"
            ))),
        }
    }
}

impl From<Map<String, Value>> for TemplateParams {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for TemplateParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rfc_params() -> TemplateParams {
        let value = json!({
            "var": "value",
            "hello": "Hello World!",
            "path": "/foo/bar",
            "empty": "",
            "x": 1024,
            "y": 768,
            "list": ["red", "green", "blue"],
            "keys": {"semi": ";", "dot": ".", "comma": ","},
            "undef": null
        });
        TemplateParams::from_serializable(&value).unwrap()
    }

    fn expand(template: &str) -> String {
        UriTemplate::parse(template).unwrap().expand(&rfc_params())
    }

    #[test]
    fn simple_and_reserved_expansion() {
        assert_eq!(expand("{var}"), "value");
        assert_eq!(expand("{hello}"), "Hello%20World%21");
        assert_eq!(expand("{+hello}"), "Hello%20World!");
        assert_eq!(expand("{+path}/here"), "/foo/bar/here");
        assert_eq!(expand("{var:3}"), "val");
        assert_eq!(expand("{x,y}"), "1024,768");
    }

    #[test]
    fn label_path_and_fragment_operators() {
        assert_eq!(expand("X{.var}"), "X.value");
        assert_eq!(expand("{/var,x}/here"), "/value/1024/here");
        assert_eq!(expand("{#hello}"), "#Hello%20World!");
        assert_eq!(expand("{/list*}"), "/red/green/blue");
        assert_eq!(expand("{.list*}"), ".red.green.blue");
    }

    #[test]
    fn path_param_keeps_empty_names() {
        assert_eq!(expand("{;x,y}"), ";x=1024;y=768");
        assert_eq!(expand("{;x,y,empty}"), ";x=1024;y=768;empty");
        assert_eq!(expand("{;list*}"), ";list=red;list=green;list=blue");
    }

    #[test]
    fn composite_values() {
        assert_eq!(expand("{list}"), "red,green,blue");
        assert_eq!(expand("{keys}"), "semi,%3B,dot,.,comma,%2C");
        assert_eq!(expand("{keys*}"), "semi=%3B,dot=.,comma=%2C");
        assert_eq!(expand("{+keys}"), "semi,;,dot,.,comma,,");
        assert_eq!(expand("{?list}"), "?list=red,green,blue");
        assert_eq!(expand("{?list*}"), "?list=red&list=green&list=blue");
        assert_eq!(expand("{?keys*}"), "?semi=%3B&dot=.&comma=%2C");
    }

    #[test]
    fn query_skips_undefined_and_empty() {
        assert_eq!(expand("{?x,y}"), "?x=1024&y=768");
        assert_eq!(expand("{?x,y,undef}"), "?x=1024&y=768");
        assert_eq!(expand("{?x,y,empty}"), "?x=1024&y=768");
        assert_eq!(expand("{?undef,y}"), "?y=768");
        assert_eq!(expand("?fixed=yes{&x}"), "?fixed=yes&x=1024");
    }

    #[test]
    fn omitted_query_yields_bare_path() {
        let template = UriTemplate::parse("resources/{schemaName}/{?searchQuery,page,rpp}").unwrap();
        let params = TemplateParams::new().with("schemaName", "widgets");
        assert_eq!(template.expand(&params), "resources/widgets/");
    }

    #[test]
    fn get_route_example() {
        let template = UriTemplate::parse("resources/{schemaName}/{id}/{?embed,fields}").unwrap();
        let params = TemplateParams::new()
            .with("schemaName", "widgets")
            .with("id", "42");
        assert_eq!(template.try_expand(&params).unwrap(), "resources/widgets/42/");
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let template = UriTemplate::parse("schemas/{?searchQuery,page,rpp}").unwrap();
        let a = TemplateParams::new()
            .with("rpp", 10)
            .with("page", 2)
            .with("searchQuery", "car");
        let b = TemplateParams::new()
            .with("searchQuery", "car")
            .with("page", 2)
            .with("rpp", 10);
        assert_eq!(template.expand(&a), "schemas/?searchQuery=car&page=2&rpp=10");
        assert_eq!(template.expand(&a), template.expand(&b));
        assert_eq!(template.expand(&a), template.expand(&a));
    }

    #[test]
    fn try_expand_reports_missing_path_variable() {
        let template = UriTemplate::parse("resources/{schemaName}/{id}/{?embed}").unwrap();
        let params = TemplateParams::new().with("schemaName", "widgets");
        let err = template.try_expand(&params).unwrap_err();
        assert_eq!(err, UriTemplateError::MissingVariable { name: "id".into() });

        let params = TemplateParams::new().with("schemaName", "").with("id", "1");
        let err = template.try_expand(&params).unwrap_err();
        assert_eq!(err, UriTemplateError::MissingVariable { name: "schemaName".into() });
    }

    #[test]
    fn try_expand_ignores_missing_query_variables() {
        let template = UriTemplate::parse("schemas/{name}/{?embed,fields}").unwrap();
        let params = TemplateParams::new().with("name", "cars");
        assert_eq!(template.try_expand(&params).unwrap(), "schemas/cars/");
    }

    #[test]
    fn values_are_percent_encoded() {
        let template = UriTemplate::parse("resources/{schemaName}/{?searchQuery}").unwrap();
        let params = TemplateParams::new()
            .with("schemaName", "my widgets")
            .with("searchQuery", "a&b=c");
        assert_eq!(
            template.expand(&params),
            "resources/my%20widgets/?searchQuery=a%26b%3Dc"
        );
    }

    #[test]
    fn reserved_expansion_keeps_pct_triplets() {
        let template = UriTemplate::parse("{+base}x").unwrap();
        let params = TemplateParams::new().with("base", "a%20b c");
        assert_eq!(template.expand(&params), "a%20b%20cx");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            UriTemplate::parse("resources/{id").unwrap_err(),
            UriTemplateError::UnclosedExpression { offset: 10 }
        );
        assert_eq!(
            UriTemplate::parse("resources/id}").unwrap_err(),
            UriTemplateError::UnexpectedClose { offset: 12 }
        );
        assert_eq!(
            UriTemplate::parse("a{}").unwrap_err(),
            UriTemplateError::EmptyExpression { offset: 1 }
        );
        assert_eq!(
            UriTemplate::parse("{?}").unwrap_err(),
            UriTemplateError::EmptyExpression { offset: 0 }
        );
        assert!(matches!(
            UriTemplate::parse("{a b}").unwrap_err(),
            UriTemplateError::InvalidVariable { .. }
        ));
        assert!(matches!(
            UriTemplate::parse("{var:0}").unwrap_err(),
            UriTemplateError::InvalidPrefix { .. }
        ));
        assert!(matches!(
            UriTemplate::parse("{var:10000}").unwrap_err(),
            UriTemplateError::InvalidPrefix { .. }
        ));
    }

    #[test]
    fn variables_in_template_order() {
        let template =
            UriTemplate::parse("resources/{schemaName}/{id}/permissions/{?fields}").unwrap();
        assert_eq!(template.variables(), vec!["schemaName", "id", "fields"]);
        assert_eq!(template.to_string(), "resources/{schemaName}/{id}/permissions/{?fields}");
    }

    #[test]
    fn from_serializable_rejects_non_objects() {
        assert!(TemplateParams::from_serializable(&json!([1, 2])).is_err());
        assert!(TemplateParams::from_serializable(&json!(null)).unwrap().is_empty());
    }

    #[test]
    fn merge_prefers_later_values() {
        let mut params = TemplateParams::new().with("page", 1).with("rpp", 10);
        params.merge(TemplateParams::new().with("page", 3));
        assert_eq!(params.get("page"), Some(&json!(3)));
        assert_eq!(params.get("rpp"), Some(&json!(10)));
    }
}
