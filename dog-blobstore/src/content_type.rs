use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{BlobError, BlobResult};

const OCTET_STREAM: (&str, &str) = ("application", "octet-stream");
const WILDCARD: &str = "*";

/// A parsed MIME type such as `text/plain;charset=UTF-8`.
///
/// Type, subtype and parameter names are normalized to lower case.
/// Parameter values keep their case and order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentType {
    type_: String,
    subtype: String,
    parameters: Vec<(String, String)>,
}

impl ContentType {
    /// `application/octet-stream`, the content type used when none is given
    pub fn octet_stream() -> Self {
        Self::from_static(OCTET_STREAM.0, OCTET_STREAM.1)
    }

    /// `text/plain` without parameters
    pub fn text_plain() -> Self {
        Self::from_static("text", "plain")
    }

    fn from_static(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
            parameters: Vec::new(),
        }
    }

    /// Parse a content type string
    pub fn parse(value: &str) -> BlobResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(BlobError::invalid_content_type(value, "must not be empty"));
        }

        let (full_type, rest) = match trimmed.find(';') {
            Some(idx) => (trimmed[..idx].trim(), Some(&trimmed[idx + 1..])),
            None => (trimmed, None),
        };

        // A lone `*` is shorthand for `*/*`
        let full_type = if full_type == WILDCARD { "*/*" } else { full_type };

        let (type_, subtype) = full_type
            .split_once('/')
            .ok_or_else(|| BlobError::invalid_content_type(value, "does not contain '/'"))?;

        if type_.is_empty() {
            return Err(BlobError::invalid_content_type(value, "type must not be empty"));
        }
        if subtype.is_empty() {
            return Err(BlobError::invalid_content_type(value, "subtype must not be empty"));
        }
        if !is_token(type_) {
            return Err(BlobError::invalid_content_type(value, "type contains illegal characters"));
        }
        if !is_token(subtype) {
            return Err(BlobError::invalid_content_type(value, "subtype contains illegal characters"));
        }
        if type_ == WILDCARD && subtype != WILDCARD {
            return Err(BlobError::invalid_content_type(
                value,
                "wildcard type is legal only in '*/*'",
            ));
        }

        let mut parameters = Vec::new();
        if let Some(rest) = rest {
            for raw in split_parameters(rest) {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                parameters.push(parse_parameter(value, raw)?);
            }
        }

        Ok(Self {
            type_: type_.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters,
        })
    }

    /// Primary type, e.g. `text`
    pub fn type_(&self) -> &str {
        &self.type_
    }

    /// Subtype, e.g. `plain`
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// `type/subtype` without parameters
    pub fn essence(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// Look up a parameter value by case-insensitive name
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Add or replace a parameter
    pub fn with_parameter<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.parameters.iter_mut().find(|(key, _)| *key == name) {
            Some(existing) => existing.1 = value,
            None => self.parameters.push((name, value)),
        }
        self
    }

    /// Whether type and subtype are both free of wildcards
    pub fn is_concrete(&self) -> bool {
        self.type_ != WILDCARD && self.subtype != WILDCARD
    }

    pub fn is_octet_stream(&self) -> bool {
        self.type_ == OCTET_STREAM.0 && self.subtype == OCTET_STREAM.1
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::octet_stream()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (name, value) in &self.parameters {
            if is_token(value) {
                write!(f, ";{}={}", name, value)?;
            } else {
                write!(f, ";{}=\"{}\"", name, value.replace('\\', "\\\\").replace('"', "\\\""))?;
            }
        }
        Ok(())
    }
}

impl FromStr for ContentType {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentType {
    type Error = BlobError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ContentType {
    type Error = BlobError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentType> for String {
    fn from(content_type: ContentType) -> Self {
        content_type.to_string()
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii()
        && !c.is_ascii_control()
        && c != ' '
        && !matches!(
            c,
            '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
        )
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

/// Split on `;` outside of quoted strings
fn split_parameters(rest: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (idx, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&rest[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&rest[start..]);
    parts
}

fn parse_parameter(original: &str, raw: &str) -> BlobResult<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| BlobError::invalid_content_type(original, format!("parameter {raw:?} has no value")))?;

    let name = name.trim();
    let value = value.trim();

    if !is_token(name) {
        return Err(BlobError::invalid_content_type(
            original,
            format!("parameter name {name:?} contains illegal characters"),
        ));
    }

    let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        unquote(&value[1..value.len() - 1])
    } else if is_token(value) {
        value.to_string()
    } else {
        return Err(BlobError::invalid_content_type(
            original,
            format!("parameter value {value:?} contains illegal characters"),
        ));
    };

    Ok((name.to_ascii_lowercase(), value))
}

fn unquote(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
