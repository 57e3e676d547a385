//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Values handed to callbacks (`FfiResponse`, `FfiError`) are borrowed: they
//! live on the Rust side only for the duration of the callback, so the C
//! caller copies what it needs and never frees them. Values returned from
//! functions (`FfiOperationInfo`) are owned by the caller and released with
//! the matching `snippets_free_*` function.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use snippets_core::{
    ApiError, Catalog, HttpGateway, Operation, OperationKind, ResponseHeaders, UreqTransport,
};

/// Opaque handle to a gateway and its catalog. C callers receive a pointer
/// to this and pass it back into every FFI function.
pub struct FfiGateway {
    pub(crate) inner: HttpGateway<UreqTransport>,
    pub(crate) catalog: Catalog,
}

/// Called once with the response when a call succeeds.
pub type FfiSuccessCallback = extern "C" fn(user_data: *mut c_void, response: *const FfiResponse);

/// Called once with the error when a call fails.
pub type FfiFailureCallback = extern "C" fn(user_data: *mut c_void, error: *const FfiError);

/// Opaque caller context carried to the worker thread and handed back to the
/// callbacks untouched.
#[derive(Clone, Copy)]
pub(crate) struct UserData(*mut c_void);

// The pointer is never dereferenced on the Rust side; thread-safety of the
// pointee is the C caller's contract.
unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub(crate) fn get(self) -> *mut c_void {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Dispatch status
// ---------------------------------------------------------------------------

/// Returned by every call function.
///
/// Only `Dispatched` means a callback will fire; for every other value no
/// callback is ever invoked.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDispatchStatus {
    Dispatched = 0,
    NullArg = 1,
    InvalidArg = 2,
    Panic = 3,
}

// ---------------------------------------------------------------------------
// Callback payloads
// ---------------------------------------------------------------------------

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// A successful response, borrowed for the duration of the success callback.
#[repr(C)]
pub struct FfiResponse {
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub body: *const c_char,
}

/// Error categories delivered to the failure callback.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Network = 1,
    ClientError = 2,
    ServerError = 3,
    Decode = 4,
    Serialization = 5,
    InvalidOperation = 6,
}

/// A failed call, borrowed for the duration of the failure callback.
///
/// `http_status` is 0 and `body` is null unless the server answered.
#[repr(C)]
pub struct FfiError {
    pub code: FfiErrorCode,
    pub http_status: u16,
    pub message: *const c_char,
    pub body: *const c_char,
}

/// Build a C string, dropping interior NULs rather than failing.
pub(crate) fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// Owns the C strings behind an `FfiResponse` while the callback runs.
pub(crate) struct OwnedResponse {
    _keys: Vec<CString>,
    _values: Vec<CString>,
    headers: Vec<FfiHeader>,
    body: CString,
}

impl OwnedResponse {
    pub(crate) fn new(headers: ResponseHeaders, body: &str) -> Self {
        let keys: Vec<CString> = headers.iter().map(|(k, _)| c_string(k)).collect();
        let values: Vec<CString> = headers.iter().map(|(_, v)| c_string(v)).collect();
        let ffi_headers = keys
            .iter()
            .zip(&values)
            .map(|(k, v)| FfiHeader {
                key: k.as_ptr(),
                value: v.as_ptr(),
            })
            .collect();
        Self {
            _keys: keys,
            _values: values,
            headers: ffi_headers,
            body: c_string(body),
        }
    }

    pub(crate) fn as_ffi(&self) -> FfiResponse {
        FfiResponse {
            headers: if self.headers.is_empty() {
                std::ptr::null()
            } else {
                self.headers.as_ptr()
            },
            headers_len: self.headers.len() as u32,
            body: self.body.as_ptr(),
        }
    }
}

/// Owns the C strings behind an `FfiError` while the callback runs.
pub(crate) struct OwnedError {
    code: FfiErrorCode,
    http_status: u16,
    message: CString,
    body: Option<CString>,
}

impl OwnedError {
    pub(crate) fn new(err: &ApiError) -> Self {
        let code = match err {
            ApiError::Network(_) => FfiErrorCode::Network,
            ApiError::ClientError { .. } => FfiErrorCode::ClientError,
            ApiError::ServerError { .. } => FfiErrorCode::ServerError,
            ApiError::Decode(_) => FfiErrorCode::Decode,
            ApiError::Serialization(_) => FfiErrorCode::Serialization,
            ApiError::InvalidOperation(_) => FfiErrorCode::InvalidOperation,
        };
        Self {
            code,
            http_status: err.status().unwrap_or(0),
            message: c_string(&err.to_string()),
            body: err.body().map(c_string),
        }
    }

    pub(crate) fn as_ffi(&self) -> FfiError {
        FfiError {
            code: self.code,
            http_status: self.http_status,
            message: self.message.as_ptr(),
            body: self.body.as_ref().map_or(std::ptr::null(), |b| b.as_ptr()),
        }
    }
}

// ---------------------------------------------------------------------------
// Call inputs
// ---------------------------------------------------------------------------

/// One multipart part supplied by the C caller. The FFI layer copies the
/// data before returning; `file_name` may be null.
#[repr(C)]
pub struct FfiMultipartPart {
    pub name: *const c_char,
    pub content_type: *const c_char,
    pub file_name: *const c_char,
    pub content: *const u8,
    pub content_len: usize,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Operation kind as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiOperationKind {
    Post = 0,
    PostCustom = 1,
    Get = 2,
    Delete = 3,
    PostMultipart = 4,
    Patch = 5,
    PatchCustom = 6,
}

impl From<OperationKind> for FfiOperationKind {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Post => FfiOperationKind::Post,
            OperationKind::PostCustom => FfiOperationKind::PostCustom,
            OperationKind::Get => FfiOperationKind::Get,
            OperationKind::Delete => FfiOperationKind::Delete,
            OperationKind::PostMultipart => FfiOperationKind::PostMultipart,
            OperationKind::Patch => FfiOperationKind::Patch,
            OperationKind::PatchCustom => FfiOperationKind::PatchCustom,
        }
    }
}

/// Where the host should get the value for one param.
///
/// `source_code` is a `ParamsSource` code: 1 text entry, 2 events picker,
/// 3 groups picker, 4 data from a prior POST.
#[repr(C)]
pub struct FfiParamSource {
    pub key: *mut c_char,
    pub source_code: u8,
}

/// Display data for one catalog entry. Free with
/// `snippets_free_operation_info`.
#[repr(C)]
pub struct FfiOperationInfo {
    pub name: *mut c_char,
    pub url_template: *mut c_char,
    pub description: *mut c_char,
    pub documentation_link: *mut c_char,
    pub kind: FfiOperationKind,
    pub requires_admin: bool,
    /// Null unless the entry negotiates a non-JSON response.
    pub custom_response_type: *mut c_char,
    /// Declared params as a JSON object; null when the entry has none.
    pub params_json: *mut c_char,
    /// Null when `param_sources_len` is 0.
    pub param_sources: *mut FfiParamSource,
    pub param_sources_len: u32,
}

impl FfiOperationInfo {
    pub(crate) fn from_operation(op: &Operation) -> *mut Self {
        let params_json = op
            .params()
            .and_then(|p| serde_json::to_string(p).ok())
            .map_or(std::ptr::null_mut(), |json| c_string(&json).into_raw());
        let sources: Vec<FfiParamSource> = op
            .params_source()
            .into_iter()
            .flatten()
            .map(|(key, source)| FfiParamSource {
                key: c_string(key).into_raw(),
                source_code: source.code(),
            })
            .collect();
        let param_sources_len = sources.len() as u32;
        let param_sources = if sources.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(sources.into_boxed_slice()) as *mut FfiParamSource
        };
        let info = Box::new(FfiOperationInfo {
            name: c_string(op.name()).into_raw(),
            url_template: c_string(op.url_template()).into_raw(),
            description: c_string(op.description()).into_raw(),
            documentation_link: c_string(op.documentation_link()).into_raw(),
            kind: op.kind().into(),
            requires_admin: op.requires_admin(),
            custom_response_type: op
                .custom_response_type()
                .map_or(std::ptr::null_mut(), |t| c_string(t).into_raw()),
            params_json,
            param_sources,
            param_sources_len,
        });
        Box::into_raw(info)
    }
}
