//! Callback-pair entry points over `ApiClient` + `Transport`.
//!
//! # Design
//! Every verb method returns at once. Building the request, running it on the
//! transport and classifying the response all happen on a worker thread, and
//! exactly one of `success(headers, body)` or `failure(error)` is invoked,
//! exactly once, from that thread. Build errors and transport panics are
//! reported through `failure` as well, so the contract holds for every input.
//!
//! The one exception to "fires from the worker" is when the OS refuses to
//! spawn the worker thread: `failure` then runs on the caller's thread before
//! the verb method returns, and the returned `Dispatch` has nothing to join.
//!
//! There is no retry, caching or deduplication here; whatever the transport
//! does is what happens.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::client::{ApiClient, ApiResponse};
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, ResponseHeaders};
use crate::multipart::MultipartPart;
use crate::operation::{Headers, Operation, ParamValues, Params};
use crate::transport::{Transport, UreqTransport};

/// Handle to an in-flight call. Dropping it does not cancel the call.
///
/// Empty when the worker could not be spawned; the failure callback has
/// already run in that case.
#[derive(Debug)]
pub struct Dispatch {
    handle: Option<JoinHandle<()>>,
}

impl Dispatch {
    /// Block until the callback for this call has returned.
    pub fn join(self) {
        if let Some(handle) = self.handle {
            if handle.join().is_err() {
                warn!("gateway callback panicked");
            }
        }
    }
}

pub struct HttpGateway<T> {
    client: ApiClient,
    transport: Arc<T>,
}

impl<T> Clone for HttpGateway<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl HttpGateway<UreqTransport> {
    /// Gateway over a ureq transport configured from `config`.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut client = ApiClient::new(&config.base_url);
        if let Some(token) = &config.access_token {
            client = client.with_access_token(token);
        }
        let transport = UreqTransport::with_timeout(config.timeout).user_agent(&config.user_agent);
        Self::new(client, transport)
    }
}

impl<T: Transport + 'static> HttpGateway<T> {
    pub fn new(client: ApiClient, transport: T) -> Self {
        Self {
            client,
            transport: Arc::new(transport),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Execute `request` on the calling thread and classify the response.
    pub fn send(&self, request: HttpRequest) -> Result<ApiResponse, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(&request)?;
        debug!(status = response.status, "received response");
        self.client.parse_response(response)
    }

    pub fn get<S, F>(&self, path: &str, query: Option<Params>, success: S, failure: F) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        self.dispatch(
            move |c| c.build_get(&path, query.as_ref()),
            success,
            failure,
        )
    }

    /// GET accepting `response_type` instead of JSON.
    pub fn get_with_response_type<S, F>(
        &self,
        path: &str,
        query: Option<Params>,
        response_type: &str,
        success: S,
        failure: F,
    ) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        let response_type = response_type.to_string();
        self.dispatch(
            move |c| c.build_get_with_response_type(&path, query.as_ref(), &response_type),
            success,
            failure,
        )
    }

    /// POST with `params` as a JSON body.
    pub fn post<S, F>(&self, path: &str, params: Option<Params>, success: S, failure: F) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        self.dispatch(
            move |c| c.build_post(&path, params.as_ref()),
            success,
            failure,
        )
    }

    /// POST `body` unmodified with `header` merged into the request headers.
    pub fn post_custom<S, F>(
        &self,
        path: &str,
        header: Option<Headers>,
        body: &str,
        success: S,
        failure: F,
    ) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        let body = body.to_string();
        self.dispatch(
            move |c| c.build_post_custom(&path, header.as_ref(), &body),
            success,
            failure,
        )
    }

    pub fn delete<S, F>(&self, path: &str, query: Option<Params>, success: S, failure: F) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        self.dispatch(
            move |c| c.build_delete(&path, query.as_ref()),
            success,
            failure,
        )
    }

    /// PATCH with `params` as a JSON body.
    pub fn patch<S, F>(&self, path: &str, params: Option<Params>, success: S, failure: F) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        self.dispatch(
            move |c| c.build_patch(&path, params.as_ref()),
            success,
            failure,
        )
    }

    /// PATCH `body` unmodified with `header` merged into the request headers.
    pub fn patch_custom<S, F>(
        &self,
        path: &str,
        header: Option<Headers>,
        body: &str,
        success: S,
        failure: F,
    ) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        let body = body.to_string();
        self.dispatch(
            move |c| c.build_patch_custom(&path, header.as_ref(), &body),
            success,
            failure,
        )
    }

    pub fn post_multipart<S, F>(
        &self,
        path: &str,
        query: Option<Params>,
        parts: Vec<MultipartPart>,
        success: S,
        failure: F,
    ) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let path = path.to_string();
        self.dispatch(
            move |c| c.build_post_multipart(&path, query.as_ref(), &parts),
            success,
            failure,
        )
    }

    /// Run a catalog entry, filling its placeholders from `values`.
    pub fn run_operation<S, F>(
        &self,
        op: &Operation,
        values: &ParamValues,
        success: S,
        failure: F,
    ) -> Dispatch
    where
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        debug!(operation = op.name(), kind = op.kind().as_str(), "running operation");
        let op = op.clone();
        let values = values.clone();
        self.dispatch(
            move |c| c.build_operation(&op, &values),
            success,
            failure,
        )
    }

    fn dispatch<B, S, F>(&self, build: B, success: S, failure: F) -> Dispatch
    where
        B: FnOnce(&ApiClient) -> Result<HttpRequest, ApiError> + Send + 'static,
        S: FnOnce(ResponseHeaders, String) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        let callbacks = Arc::new(Mutex::new(Some((success, failure))));
        let worker_callbacks = Arc::clone(&callbacks);
        let gateway = self.clone();

        let spawned = thread::Builder::new()
            .name("snippets-dispatch".to_string())
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let request = build(&gateway.client)?;
                    gateway.send(request)
                }))
                .unwrap_or_else(|_| Err(ApiError::Network("transport panicked".to_string())));
                if let Some((success, failure)) = take(&worker_callbacks) {
                    deliver(outcome, success, failure);
                }
            });

        match spawned {
            Ok(handle) => Dispatch {
                handle: Some(handle),
            },
            Err(err) => {
                warn!(error = %err, "could not spawn dispatch thread");
                if let Some((_, failure)) = take(&callbacks) {
                    failure(ApiError::Network(err.to_string()));
                }
                Dispatch { handle: None }
            }
        }
    }
}

fn take<S, F>(slot: &Mutex<Option<(S, F)>>) -> Option<(S, F)> {
    slot.lock().ok().and_then(|mut guard| guard.take())
}

fn deliver<S, F>(outcome: Result<ApiResponse, ApiError>, success: S, failure: F)
where
    S: FnOnce(ResponseHeaders, String),
    F: FnOnce(ApiError),
{
    match outcome {
        Ok(response) => success(response.headers, response.body),
        Err(err) => {
            warn!(error = %err, "request failed");
            failure(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use serde_json::{json, Value};

    use super::*;
    use crate::error::TransportError;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::operation::OperationKind;

    /// Records every request and answers with a fixed response.
    struct FakeTransport {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn answering(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse {
                status: self.status,
                headers: vec![("request-id".to_string(), "r1".to_string())],
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn execute(&self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Io("connection refused".to_string()))
        }
    }

    struct PanickingTransport;

    impl Transport for PanickingTransport {
        fn execute(&self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
            panic!("boom")
        }
    }

    #[derive(Debug)]
    enum Outcome {
        Success(ResponseHeaders, String),
        Failure(ApiError),
    }

    fn callbacks() -> (
        impl FnOnce(ResponseHeaders, String) + Send + 'static,
        impl FnOnce(ApiError) + Send + 'static,
        mpsc::Receiver<Outcome>,
    ) {
        let (tx, rx) = mpsc::channel();
        let tx_fail = tx.clone();
        (
            move |headers, body| tx.send(Outcome::Success(headers, body)).unwrap(),
            move |err| tx_fail.send(Outcome::Failure(err)).unwrap(),
            rx,
        )
    }

    /// Join the dispatch and return the single outcome it produced.
    fn single_outcome(dispatch: Dispatch, rx: mpsc::Receiver<Outcome>) -> Outcome {
        dispatch.join();
        let outcomes: Vec<Outcome> = rx.try_iter().collect();
        assert_eq!(outcomes.len(), 1, "expected exactly one callback: {outcomes:?}");
        outcomes.into_iter().next().unwrap()
    }

    fn gateway<T: Transport + 'static>(transport: T) -> HttpGateway<T> {
        HttpGateway::new(ApiClient::new("http://graph.test/v1.0"), transport)
    }

    fn last_request(gateway: &HttpGateway<FakeTransport>) -> HttpRequest {
        gateway.transport.seen.lock().unwrap().last().cloned().unwrap()
    }

    #[test]
    fn success_fires_once_with_headers_and_body() {
        let gw = gateway(FakeTransport::answering(200, r#"{"displayName":"Ada"}"#));
        let (ok, fail, rx) = callbacks();
        let outcome = single_outcome(gw.get("me", None, ok, fail), rx);
        match outcome {
            Outcome::Success(headers, body) => {
                assert_eq!(headers, vec![("request-id".to_string(), "r1".to_string())]);
                assert_eq!(body, r#"{"displayName":"Ada"}"#);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_failure_fires_once_with_body() {
        let gw = gateway(FakeTransport::answering(403, "forbidden"));
        let (ok, fail, rx) = callbacks();
        let outcome = single_outcome(gw.delete("me/events/1", None, ok, fail), rx);
        match outcome {
            Outcome::Failure(err) => {
                assert_eq!(err.status(), Some(403));
                assert_eq!(err.body(), Some("forbidden"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transport_error_is_network_failure() {
        let gw = gateway(FailingTransport);
        let (ok, fail, rx) = callbacks();
        let outcome = single_outcome(gw.patch("me/events/1", None, ok, fail), rx);
        assert!(matches!(outcome, Outcome::Failure(ApiError::Network(_))));
    }

    #[test]
    fn transport_panic_still_reports_failure() {
        let gw = gateway(PanickingTransport);
        let (ok, fail, rx) = callbacks();
        let outcome = single_outcome(gw.post("me/events", None, ok, fail), rx);
        assert!(matches!(outcome, Outcome::Failure(ApiError::Network(_))));
    }

    #[test]
    fn build_error_is_reported_asynchronously() {
        let gw = gateway(FakeTransport::answering(200, "{}"));
        let op = Operation::new("Members", "groups/{group-id}/members", OperationKind::Get, "", "", None, None).unwrap();
        let (ok, fail, rx) = callbacks();
        let outcome = single_outcome(gw.run_operation(&op, &ParamValues::new(), ok, fail), rx);
        assert!(matches!(outcome, Outcome::Failure(ApiError::InvalidOperation(_))));
        assert!(gw.transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn every_verb_reaches_the_transport() {
        let gw = gateway(FakeTransport::answering(204, ""));
        let params = match json!({"subject": "Sync"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let (ok, fail, rx) = callbacks();
        single_outcome(gw.get_with_response_type("me/onenote/pages/1/content", None, "text/html", ok, fail), rx);
        let req = last_request(&gw);
        assert_eq!(req.header("accept"), Some("text/html"));

        let (ok, fail, rx) = callbacks();
        single_outcome(gw.post("me/events", Some(params.clone()), ok, fail), rx);
        let req = last_request(&gw);
        assert_eq!(req.method, HttpMethod::Post);
        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"subject": "Sync"}));

        let (ok, fail, rx) = callbacks();
        single_outcome(gw.patch("me/events/1", Some(params), ok, fail), rx);
        assert_eq!(last_request(&gw).method, HttpMethod::Patch);

        let raw = "{\"message\":{}}";
        let (ok, fail, rx) = callbacks();
        single_outcome(gw.post_custom("me/sendMail", None, raw, ok, fail), rx);
        assert_eq!(last_request(&gw).body_text(), Some(raw));

        let header = Headers::from([("content-type".to_string(), "text/html".to_string())]);
        let (ok, fail, rx) = callbacks();
        single_outcome(gw.patch_custom("me/onenote/pages/1/content", Some(header), "<p/>", ok, fail), rx);
        let req = last_request(&gw);
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.header("content-type"), Some("text/html"));

        let parts = vec![
            MultipartPart::text("Presentation", "text/html", "<html/>"),
            MultipartPart::text("notes", "text/plain", "n"),
        ];
        let (ok, fail, rx) = callbacks();
        single_outcome(gw.post_multipart("me/onenote/pages", None, parts, ok, fail), rx);
        let req = last_request(&gw);
        let body = req.body_text().unwrap();
        assert!(body.find("Presentation").unwrap() < body.find("notes").unwrap());

        assert_eq!(gw.transport.seen.lock().unwrap().len(), 6);
    }

    #[test]
    fn send_returns_single_result() {
        let gw = gateway(FakeTransport::answering(201, r#"{"id":"e1"}"#));
        let request = gw.client().build_post("me/events", None).unwrap();
        let response = gw.send(request).unwrap();
        assert_eq!(response.status, 201);
        let value: Value = response.json().unwrap();
        assert_eq!(value["id"], "e1");
    }
}
