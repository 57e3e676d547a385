//! C-ABI wrapper around `snippets-core`.
//!
//! # Overview
//! Exposes the gateway verbs and the sample catalog through `extern "C"`
//! functions so a native host (the iOS app) can issue calls and receive the
//! outcome through a success/failure callback pair.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Call functions return an `FfiDispatchStatus` immediately. On
//!   `Dispatched`, exactly one of the two callbacks fires, normally from a
//!   worker thread after the call has returned. If the worker thread cannot
//!   be spawned, the failure callback runs before the call returns. On any
//!   other status, neither fires.
//! - Params, query and custom headers cross the boundary as JSON object
//!   strings; a null pointer means "none".
//! - Callback payloads are borrowed for the duration of the callback only.
//!   Pointers returned from functions are owned by the caller and released
//!   with the matching `snippets_*_free` / `snippets_free_*` function.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use snippets_core::{
    ApiError, Catalog, GatewayConfig, Headers, HttpGateway, MultipartPart, ParamValues, Params,
    ResponseHeaders,
};
use tracing::warn;

use types::*;

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Borrow a C string as UTF-8. Null or invalid UTF-8 yields `None`.
fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Borrow a required C string argument.
fn required_str<'a>(ptr: *const c_char) -> Result<&'a str, FfiDispatchStatus> {
    if ptr.is_null() {
        return Err(FfiDispatchStatus::NullArg);
    }
    str_arg(ptr).ok_or(FfiDispatchStatus::InvalidArg)
}

/// Parse an optional JSON object argument.
fn json_arg<T: serde::de::DeserializeOwned>(ptr: *const c_char) -> Result<Option<T>, FfiDispatchStatus> {
    if ptr.is_null() {
        return Ok(None);
    }
    let raw = str_arg(ptr).ok_or(FfiDispatchStatus::InvalidArg)?;
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|_| FfiDispatchStatus::InvalidArg)
}

fn params_arg(ptr: *const c_char) -> Result<Option<Params>, FfiDispatchStatus> {
    json_arg::<Params>(ptr)
}

fn headers_arg(ptr: *const c_char) -> Result<Option<Headers>, FfiDispatchStatus> {
    json_arg::<Headers>(ptr)
}

fn gateway_arg<'a>(gateway: *const FfiGateway) -> Result<&'a FfiGateway, FfiDispatchStatus> {
    if gateway.is_null() {
        return Err(FfiDispatchStatus::NullArg);
    }
    Ok(unsafe { &*gateway })
}

/// Wrap the C callbacks as the closures the gateway expects.
fn callbacks(
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> Result<
    (
        impl FnOnce(ResponseHeaders, String) + Send + 'static,
        impl FnOnce(ApiError) + Send + 'static,
    ),
    FfiDispatchStatus,
> {
    let (Some(success), Some(failure)) = (success, failure) else {
        return Err(FfiDispatchStatus::NullArg);
    };
    let ok_data = UserData::new(user_data);
    let fail_data = UserData::new(user_data);
    let on_success = move |headers: ResponseHeaders, body: String| {
        let owned = OwnedResponse::new(headers, &body);
        let response = owned.as_ffi();
        success(ok_data.get(), &response);
    };
    let on_failure = move |err: ApiError| {
        let owned = OwnedError::new(&err);
        let error = owned.as_ffi();
        failure(fail_data.get(), &error);
    };
    Ok((on_success, on_failure))
}

/// Run `body` behind `catch_unwind` and turn its outcome into a status.
fn guarded(name: &str, body: impl FnOnce() -> Result<(), FfiDispatchStatus>) -> FfiDispatchStatus {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => FfiDispatchStatus::Dispatched,
        Ok(Err(status)) => {
            warn!(function = name, ?status, "call rejected");
            status
        }
        Err(_) => {
            warn!(function = name, "panic while dispatching");
            FfiDispatchStatus::Panic
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway lifecycle
// ---------------------------------------------------------------------------

/// Create a gateway bound to `base_url`. `access_token` may be null.
///
/// Returns null if `base_url` is null or not UTF-8, or if an internal panic
/// occurs. The caller must free the returned pointer with
/// `snippets_gateway_free`.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_gateway_new(
    base_url: *const c_char,
    access_token: *const c_char,
) -> *mut FfiGateway {
    catch_unwind(|| {
        let Some(url) = str_arg(base_url) else {
            return std::ptr::null_mut();
        };
        let mut config = GatewayConfig::new(url);
        if let Some(token) = str_arg(access_token) {
            config = config.access_token(token);
        }
        new_gateway(&config)
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a gateway configured from `SNIPPETS_*` environment variables.
///
/// Returns null if the environment holds an invalid value.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_gateway_from_env() -> *mut FfiGateway {
    catch_unwind(|| match GatewayConfig::from_env() {
        Ok(config) => new_gateway(&config),
        Err(err) => {
            warn!(error = %err, "invalid gateway configuration");
            std::ptr::null_mut()
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

fn new_gateway(config: &GatewayConfig) -> *mut FfiGateway {
    match Catalog::sample() {
        Ok(catalog) => Box::into_raw(Box::new(FfiGateway {
            inner: HttpGateway::from_config(config),
            catalog,
        })),
        Err(err) => {
            warn!(error = %err, "sample catalog failed to build");
            std::ptr::null_mut()
        }
    }
}

/// Free a gateway created by `snippets_gateway_new`. Safe to call with null.
/// Calls already dispatched still complete and fire their callbacks.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_gateway_free(gateway: *mut FfiGateway) {
    if !gateway.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(gateway) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Verb calls
// ---------------------------------------------------------------------------

/// GET `path` with `query_json` (nullable JSON object) as query params.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_get(
    gateway: *const FfiGateway,
    path: *const c_char,
    query_json: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_get", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let query = params_arg(query_json)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.get(path, query, ok, fail);
        Ok(())
    })
}

/// GET accepting `response_type` (for example `text/html`) instead of JSON.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_get_with_response_type(
    gateway: *const FfiGateway,
    path: *const c_char,
    query_json: *const c_char,
    response_type: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_get_with_response_type", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let response_type = required_str(response_type)?;
        let query = params_arg(query_json)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.get_with_response_type(path, query, response_type, ok, fail);
        Ok(())
    })
}

/// POST `params_json` (nullable JSON object) as a JSON body.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_post(
    gateway: *const FfiGateway,
    path: *const c_char,
    params_json: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_post", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let params = params_arg(params_json)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.post(path, params, ok, fail);
        Ok(())
    })
}

/// POST `body` verbatim with `header_json` (nullable JSON object of strings)
/// merged into the request headers.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_post_custom(
    gateway: *const FfiGateway,
    path: *const c_char,
    header_json: *const c_char,
    body: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_post_custom", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let body = required_str(body)?;
        let header = headers_arg(header_json)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.post_custom(path, header, body, ok, fail);
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn snippets_delete(
    gateway: *const FfiGateway,
    path: *const c_char,
    query_json: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_delete", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let query = params_arg(query_json)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.delete(path, query, ok, fail);
        Ok(())
    })
}

/// PATCH `params_json` (nullable JSON object) as a JSON body.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_patch(
    gateway: *const FfiGateway,
    path: *const c_char,
    params_json: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_patch", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let params = params_arg(params_json)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.patch(path, params, ok, fail);
        Ok(())
    })
}

/// PATCH `body` verbatim with `header_json` merged into the request headers.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_patch_custom(
    gateway: *const FfiGateway,
    path: *const c_char,
    header_json: *const c_char,
    body: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_patch_custom", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let body = required_str(body)?;
        let header = headers_arg(header_json)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.patch_custom(path, header, body, ok, fail);
        Ok(())
    })
}

/// POST a multipart body built from `parts` (in order); `query_json` goes on
/// the URL. The part data is copied before this function returns.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_post_multipart(
    gateway: *const FfiGateway,
    path: *const c_char,
    query_json: *const c_char,
    parts: *const FfiMultipartPart,
    parts_len: u32,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_post_multipart", || {
        let gw = gateway_arg(gateway)?;
        let path = required_str(path)?;
        let query = params_arg(query_json)?;
        let parts = multipart_parts(parts, parts_len)?;
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.post_multipart(path, query, parts, ok, fail);
        Ok(())
    })
}

fn multipart_parts(
    parts: *const FfiMultipartPart,
    len: u32,
) -> Result<Vec<MultipartPart>, FfiDispatchStatus> {
    if parts.is_null() {
        return Err(FfiDispatchStatus::NullArg);
    }
    if len == 0 {
        return Err(FfiDispatchStatus::InvalidArg);
    }
    let raw = unsafe { std::slice::from_raw_parts(parts, len as usize) };
    raw.iter()
        .map(|part| {
            let name = required_str(part.name)?;
            let content_type = required_str(part.content_type)?;
            let content = match (part.content.is_null(), part.content_len) {
                (_, 0) => Vec::new(),
                (true, _) => return Err(FfiDispatchStatus::NullArg),
                (false, n) => unsafe { std::slice::from_raw_parts(part.content, n) }.to_vec(),
            };
            let mut converted = MultipartPart::bytes(name, content_type, content);
            if !part.file_name.is_null() {
                converted = converted.file_name(required_str(part.file_name)?);
            }
            Ok(converted)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Number of entries in the gateway's catalog. Returns 0 for a null gateway.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_catalog_len(gateway: *const FfiGateway) -> u32 {
    catch_unwind(AssertUnwindSafe(|| match gateway_arg(gateway) {
        Ok(gw) => gw.catalog.len() as u32,
        Err(_) => 0,
    }))
    .unwrap_or(0)
}

/// Display data for catalog entry `index`, or null when out of range.
/// The caller must free the result with `snippets_free_operation_info`.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_catalog_entry(
    gateway: *const FfiGateway,
    index: u32,
) -> *mut FfiOperationInfo {
    catch_unwind(AssertUnwindSafe(|| {
        let Ok(gw) = gateway_arg(gateway) else {
            return std::ptr::null_mut();
        };
        match gw.catalog.get(index as usize) {
            Some(op) => FfiOperationInfo::from_operation(op),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Run catalog entry `index`. `values_json` is a nullable JSON object of
/// strings that fills URL placeholders and overrides declared params.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_run_operation(
    gateway: *const FfiGateway,
    index: u32,
    values_json: *const c_char,
    success: Option<FfiSuccessCallback>,
    failure: Option<FfiFailureCallback>,
    user_data: *mut c_void,
) -> FfiDispatchStatus {
    guarded("snippets_run_operation", || {
        let gw = gateway_arg(gateway)?;
        let op = gw
            .catalog
            .get(index as usize)
            .ok_or(FfiDispatchStatus::InvalidArg)?;
        let values = json_arg::<ParamValues>(values_json)?.unwrap_or_default();
        let (ok, fail) = callbacks(success, failure, user_data)?;
        gw.inner.run_operation(op, &values, ok, fail);
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiOperationInfo` returned by `snippets_catalog_entry`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn snippets_free_operation_info(info: *mut FfiOperationInfo) {
    if info.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let info = unsafe { Box::from_raw(info) };
        for ptr in [
            info.name,
            info.url_template,
            info.description,
            info.documentation_link,
            info.custom_response_type,
            info.params_json,
        ] {
            if !ptr.is_null() {
                drop(unsafe { CString::from_raw(ptr) });
            }
        }
        if !info.param_sources.is_null() {
            let sources = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    info.param_sources,
                    info.param_sources_len as usize,
                ))
            };
            for source in sources.iter() {
                if !source.key.is_null() {
                    drop(unsafe { CString::from_raw(source.key) });
                }
            }
        }
    });
}
