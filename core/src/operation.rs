//! Catalog entries describing one sample API call each.
//!
//! # Design
//! An `Operation` is built once when the catalog is assembled and never
//! mutated afterwards: fields are private and only readable through getters.
//! Each constructor accepts exactly one payload shape (params, custom
//! header+body, or multipart parts) and rejects kinds that need a different
//! one, so a built `Operation` always carries the payload its kind sends.
//!
//! URL templates may hold `{key}` placeholders. They are filled at dispatch
//! time from `ParamValues`, which usually come from a previous call (the id of
//! an event picked from `GET me/events`, for example).

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OperationError;
use crate::http::HttpMethod;
use crate::multipart::MultipartPart;

/// Query or JSON body parameters.
pub type Params = serde_json::Map<String, Value>;

/// Where each parameter's value comes from, keyed by parameter name.
pub type ParamsSources = BTreeMap<String, ParamsSource>;

/// Custom request headers.
pub type Headers = BTreeMap<String, String>;

/// Runtime values supplied by the host: placeholder fills and param overrides.
pub type ParamValues = BTreeMap<String, String>;

pub const PARAMS_EVENT_ID_KEY: &str = "event-id";
pub const PARAMS_GROUP_ID_KEY: &str = "group-id";
pub const PARAMS_POST_DATA_KEY: &str = "post-data";

/// Everything but RFC 3986 unreserved characters is escaped, so a filled
/// value always stays one path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A piece of a URL template.
enum TemplatePiece<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Which gateway verb an operation dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Post,
    PostCustom,
    Get,
    Delete,
    PostMultipart,
    Patch,
    PatchCustom,
}

/// Payload shape an operation kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Params,
    Custom,
    Multipart,
}

impl OperationKind {
    pub fn method(self) -> HttpMethod {
        match self {
            OperationKind::Post | OperationKind::PostCustom | OperationKind::PostMultipart => {
                HttpMethod::Post
            }
            OperationKind::Get => HttpMethod::Get,
            OperationKind::Delete => HttpMethod::Delete,
            OperationKind::Patch | OperationKind::PatchCustom => HttpMethod::Patch,
        }
    }

    pub fn payload(self) -> PayloadShape {
        match self {
            OperationKind::PostCustom | OperationKind::PatchCustom => PayloadShape::Custom,
            OperationKind::PostMultipart => PayloadShape::Multipart,
            _ => PayloadShape::Params,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Post => "Post",
            OperationKind::PostCustom => "PostCustom",
            OperationKind::Get => "Get",
            OperationKind::Delete => "Delete",
            OperationKind::PostMultipart => "PostMultipart",
            OperationKind::Patch => "Patch",
            OperationKind::PatchCustom => "PatchCustom",
        }
    }
}

/// Origin of a parameter's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParamsSource {
    /// Typed in by the user.
    TextEdit = 1,
    /// Picked from the result of listing the user's events.
    GetEvents = 2,
    /// Picked from the result of listing groups.
    GetGroups = 3,
    /// Taken from the response of a prior POST.
    PostData = 4,
}

impl ParamsSource {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ParamsSource::TextEdit),
            2 => Some(ParamsSource::GetEvents),
            3 => Some(ParamsSource::GetGroups),
            4 => Some(ParamsSource::PostData),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    url_template: String,
    kind: OperationKind,
    description: String,
    documentation_link: String,
    custom_header: Option<Headers>,
    custom_body: Option<String>,
    params: Option<Params>,
    params_source: Option<ParamsSources>,
    custom_response_type: Option<String>,
    multipart_parts: Option<Vec<MultipartPart>>,
    requires_admin: bool,
}

impl Operation {
    /// A params-driven call (`Get`, `Delete`, `Post`, `Patch`).
    pub fn new(
        name: &str,
        url_template: &str,
        kind: OperationKind,
        description: &str,
        documentation_link: &str,
        params: Option<Params>,
        params_source: Option<ParamsSources>,
    ) -> Result<Self, OperationError> {
        if kind.payload() != PayloadShape::Params {
            return Err(OperationError::KindMismatch { kind: kind.as_str() });
        }
        check_sources(params.as_ref(), params_source.as_ref())?;
        Ok(Self::base(name, url_template, kind, description, documentation_link)
            .with_params(params, params_source))
    }

    /// A call that sends a raw body with caller-chosen headers
    /// (`PostCustom`, `PatchCustom`).
    #[allow(clippy::too_many_arguments)]
    pub fn with_custom_payload(
        name: &str,
        url_template: &str,
        kind: OperationKind,
        custom_header: Option<Headers>,
        custom_body: Option<String>,
        description: &str,
        documentation_link: &str,
        params: Option<Params>,
        params_source: Option<ParamsSources>,
    ) -> Result<Self, OperationError> {
        if kind.payload() != PayloadShape::Custom {
            return Err(OperationError::KindMismatch { kind: kind.as_str() });
        }
        let custom_body = custom_body.ok_or(OperationError::MissingCustomBody)?;
        check_sources(params.as_ref(), params_source.as_ref())?;
        let mut op = Self::base(name, url_template, kind, description, documentation_link)
            .with_params(params, params_source);
        op.custom_header = custom_header;
        op.custom_body = Some(custom_body);
        Ok(op)
    }

    /// A multipart upload (`PostMultipart`).
    pub fn with_multipart(
        name: &str,
        url_template: &str,
        kind: OperationKind,
        description: &str,
        documentation_link: &str,
        parts: Vec<MultipartPart>,
    ) -> Result<Self, OperationError> {
        if kind.payload() != PayloadShape::Multipart {
            return Err(OperationError::KindMismatch { kind: kind.as_str() });
        }
        if parts.is_empty() {
            return Err(OperationError::MissingMultipartParts);
        }
        let mut op = Self::base(name, url_template, kind, description, documentation_link);
        op.multipart_parts = Some(parts);
        Ok(op)
    }

    /// Expect `mime` instead of JSON in the response.
    pub fn with_custom_response_type(mut self, mime: &str) -> Self {
        self.custom_response_type = Some(mime.to_string());
        self
    }

    /// Mark the call as needing tenant administrator consent.
    pub fn admin_required(mut self) -> Self {
        self.requires_admin = true;
        self
    }

    fn base(
        name: &str,
        url_template: &str,
        kind: OperationKind,
        description: &str,
        documentation_link: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            kind,
            description: description.to_string(),
            documentation_link: documentation_link.to_string(),
            custom_header: None,
            custom_body: None,
            params: None,
            params_source: None,
            custom_response_type: None,
            multipart_parts: None,
            requires_admin: false,
        }
    }

    fn with_params(mut self, params: Option<Params>, params_source: Option<ParamsSources>) -> Self {
        self.params = params;
        self.params_source = params_source;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn documentation_link(&self) -> &str {
        &self.documentation_link
    }

    pub fn custom_header(&self) -> Option<&Headers> {
        self.custom_header.as_ref()
    }

    pub fn custom_body(&self) -> Option<&str> {
        self.custom_body.as_deref()
    }

    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    pub fn params_source(&self) -> Option<&ParamsSources> {
        self.params_source.as_ref()
    }

    pub fn custom_response_type(&self) -> Option<&str> {
        self.custom_response_type.as_deref()
    }

    pub fn multipart_parts(&self) -> Option<&[MultipartPart]> {
        self.multipart_parts.as_deref()
    }

    pub fn requires_admin(&self) -> bool {
        self.requires_admin
    }

    fn template_pieces(&self) -> Result<Vec<TemplatePiece<'_>>, OperationError> {
        let mut pieces = Vec::new();
        let mut rest = self.url_template.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or_else(|| OperationError::MalformedTemplate(self.url_template.clone()))?;
            if start > 0 {
                pieces.push(TemplatePiece::Literal(&rest[..start]));
            }
            pieces.push(TemplatePiece::Placeholder(&after[..end]));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            pieces.push(TemplatePiece::Literal(rest));
        }
        Ok(pieces)
    }

    /// Placeholder keys in the URL template, in order of appearance.
    pub fn placeholders(&self) -> Result<Vec<String>, OperationError> {
        Ok(self
            .template_pieces()?
            .into_iter()
            .filter_map(|piece| match piece {
                TemplatePiece::Placeholder(key) => Some(key.to_string()),
                TemplatePiece::Literal(_) => None,
            })
            .collect())
    }

    /// Fill every `{key}` placeholder in the URL template in a single pass.
    ///
    /// Runtime `values` win over the descriptor's own params. Each value is
    /// percent-encoded as one path segment; `.` and `..` are rejected.
    pub fn resolve_path(&self, values: &ParamValues) -> Result<String, OperationError> {
        let mut path = String::with_capacity(self.url_template.len());
        for piece in self.template_pieces()? {
            let key = match piece {
                TemplatePiece::Literal(text) => {
                    path.push_str(text);
                    continue;
                }
                TemplatePiece::Placeholder(key) => key,
            };
            let value = values
                .get(key)
                .cloned()
                .or_else(|| self.params.as_ref().and_then(|p| p.get(key)).map(value_text))
                .filter(|v| !v.is_empty())
                .ok_or_else(|| OperationError::UnresolvedPlaceholder(key.to_string()))?;
            if value == "." || value == ".." {
                return Err(OperationError::DotSegment(key.to_string()));
            }
            path.extend(utf8_percent_encode(&value, PATH_SEGMENT));
        }
        Ok(path)
    }

    /// Params to send once placeholders have consumed their keys.
    ///
    /// A runtime value overrides the declared param of the same name. Values
    /// for `PostData` params that parse as a JSON object or array are sent
    /// structurally; anything else stays a string.
    pub fn effective_params(&self, values: &ParamValues) -> Result<Params, OperationError> {
        let placeholders = self.placeholders()?;
        let mut params = self.params.clone().unwrap_or_default();
        for (key, value) in params.iter_mut() {
            let Some(runtime) = values.get(key) else {
                continue;
            };
            let source = self.params_source.as_ref().and_then(|s| s.get(key)).copied();
            *value = match source {
                Some(ParamsSource::PostData) => match serde_json::from_str(runtime) {
                    Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
                    _ => Value::String(runtime.clone()),
                },
                _ => Value::String(runtime.clone()),
            };
        }
        params.retain(|key, _| !placeholders.contains(key));
        Ok(params)
    }
}

/// Text form of a param value as it appears in a path or query string.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn check_sources(
    params: Option<&Params>,
    sources: Option<&ParamsSources>,
) -> Result<(), OperationError> {
    let Some(sources) = sources else {
        return Ok(());
    };
    for key in sources.keys() {
        if !params.is_some_and(|p| p.contains_key(key)) {
            return Err(OperationError::UnknownParamSource(key.clone()));
        }
    }
    Ok(())
}
