//! Stateless HTTP request builder and response classifier for the unified API.
//!
//! # Design
//! `ApiClient` holds only a base URL and an optional bearer token, and carries
//! no mutable state between calls. Every gateway verb has a `build_*` method
//! that produces an `HttpRequest`; `parse_response` turns the matching
//! `HttpResponse` into either an `ApiResponse` or an `ApiError`. Executing the
//! request is someone else's job (a `Transport`, or the C host).

use serde_json::Value;
use url::Url;

use crate::error::{ApiError, OperationError};
use crate::http::{set_header, HttpMethod, HttpRequest, HttpResponse, ResponseHeaders};
use crate::multipart::{self, MultipartPart};
use crate::operation::{value_text, Headers, Operation, OperationKind, ParamValues, Params};

const JSON: &str = "application/json";

/// A successful exchange: response headers plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: ResponseHeaders,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Synchronous, stateless request builder.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// Attach `Authorization: Bearer <token>` to every built request.
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_get(&self, path: &str, query: Option<&Params>) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, path, query, JSON)
    }

    /// GET that negotiates `response_type` (for example `text/html`) instead
    /// of JSON.
    pub fn build_get_with_response_type(
        &self,
        path: &str,
        query: Option<&Params>,
        response_type: &str,
    ) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, path, query, response_type)
    }

    /// POST with `params` serialized as a JSON object body.
    pub fn build_post(&self, path: &str, params: Option<&Params>) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, path, params)
    }

    /// POST `body` verbatim with `header` merged over the defaults.
    pub fn build_post_custom(
        &self,
        path: &str,
        header: Option<&Headers>,
        body: &str,
    ) -> Result<HttpRequest, ApiError> {
        self.custom_request(HttpMethod::Post, path, header, body)
    }

    pub fn build_delete(&self, path: &str, query: Option<&Params>) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, path, query, JSON)
    }

    /// PATCH with `params` serialized as a JSON object body.
    pub fn build_patch(&self, path: &str, params: Option<&Params>) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, path, params)
    }

    /// PATCH `body` verbatim with `header` merged over the defaults.
    pub fn build_patch_custom(
        &self,
        path: &str,
        header: Option<&Headers>,
        body: &str,
    ) -> Result<HttpRequest, ApiError> {
        self.custom_request(HttpMethod::Patch, path, header, body)
    }

    /// POST a `multipart/form-data` body; `query` goes on the URL.
    pub fn build_post_multipart(
        &self,
        path: &str,
        query: Option<&Params>,
        parts: &[MultipartPart],
    ) -> Result<HttpRequest, ApiError> {
        self.build_post_multipart_with_boundary(path, query, parts, &multipart::new_boundary())
    }

    pub(crate) fn build_post_multipart_with_boundary(
        &self,
        path: &str,
        query: Option<&Params>,
        parts: &[MultipartPart],
        boundary: &str,
    ) -> Result<HttpRequest, ApiError> {
        let mut req = self.request(HttpMethod::Post, path, query, JSON)?;
        set_header(&mut req.headers, "content-type", &multipart::content_type(boundary));
        req.body = Some(multipart::encode(parts, boundary));
        Ok(req)
    }

    /// Build the request a catalog entry describes.
    ///
    /// `values` fill URL placeholders and override declared params.
    pub fn build_operation(
        &self,
        op: &Operation,
        values: &ParamValues,
    ) -> Result<HttpRequest, ApiError> {
        let path = op.resolve_path(values)?;
        let params = op.effective_params(values)?;
        let params = (!params.is_empty()).then_some(&params);
        match op.kind() {
            OperationKind::Get => match op.custom_response_type() {
                Some(mime) => self.build_get_with_response_type(&path, params, mime),
                None => self.build_get(&path, params),
            },
            OperationKind::Delete => self.build_delete(&path, params),
            OperationKind::Post => self.build_post(&path, params),
            OperationKind::Patch => self.build_patch(&path, params),
            OperationKind::PostCustom => {
                let body = op.custom_body().ok_or(OperationError::MissingCustomBody)?;
                self.build_post_custom(&path, op.custom_header(), body)
            }
            OperationKind::PatchCustom => {
                let body = op.custom_body().ok_or(OperationError::MissingCustomBody)?;
                self.build_patch_custom(&path, op.custom_header(), body)
            }
            OperationKind::PostMultipart => {
                let parts = op.multipart_parts().ok_or(OperationError::MissingMultipartParts)?;
                self.build_post_multipart(&path, params, parts)
            }
        }
    }

    /// Classify a response: 2xx is success, anything else an error kind.
    pub fn parse_response(&self, response: HttpResponse) -> Result<ApiResponse, ApiError> {
        if !response.is_success() {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            return Err(ApiError::from_status(response.status, body));
        }
        let body = String::from_utf8(response.body).map_err(|e| {
            ApiError::Decode(format!("response body is not UTF-8: {}", e.utf8_error()))
        })?;
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }

    fn json_request(
        &self,
        method: HttpMethod,
        path: &str,
        params: Option<&Params>,
    ) -> Result<HttpRequest, ApiError> {
        let body = match params {
            Some(p) => serde_json::to_vec(p),
            None => serde_json::to_vec(&Value::Object(Params::new())),
        }
        .map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut req = self.request(method, path, None, JSON)?;
        set_header(&mut req.headers, "content-type", JSON);
        req.body = Some(body);
        Ok(req)
    }

    fn custom_request(
        &self,
        method: HttpMethod,
        path: &str,
        header: Option<&Headers>,
        body: &str,
    ) -> Result<HttpRequest, ApiError> {
        let mut req = self.request(method, path, None, JSON)?;
        set_header(&mut req.headers, "content-type", JSON);
        for (name, value) in header.into_iter().flatten() {
            set_header(&mut req.headers, name, value);
        }
        req.body = Some(body.as_bytes().to_vec());
        Ok(req)
    }

    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: Option<&Params>,
        accept: &str,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![("accept".to_string(), accept.to_string())];
        if let Some(token) = &self.access_token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        Ok(HttpRequest {
            method,
            url: self.url(path, query)?,
            headers,
            body: None,
        })
    }

    fn url(&self, path: &str, query: Option<&Params>) -> Result<String, ApiError> {
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        let query = match query {
            Some(q) if !q.is_empty() => q,
            _ => return Ok(joined),
        };
        let mut url = Url::parse(&joined)
            .map_err(|e| ApiError::Serialization(format!("invalid url `{joined}`: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, &value_text(value));
            }
        }
        Ok(url.into())
    }
}
