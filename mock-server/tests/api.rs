use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, Collection, Event, Group, Page};
use serde_json::Value;
use tower::ServiceExt;

const TOKEN: &str = "Bearer test-token";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, TOKEN)
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, TOKEN)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn multipart_request(uri: &str, parts: &[(&str, &str, &str)]) -> Request<String> {
    let mut body = String::new();
    for (name, content_type, content) in parts {
        body.push_str(&format!(
            "--BND\r\nContent-Disposition: form-data; name=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str("--BND--\r\n");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::AUTHORIZATION, TOKEN)
        .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=BND")
        .body(body)
        .unwrap()
}

async fn create_event(app: &Router, subject: &str) -> Event {
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/me/events", &format!(r#"{{"subject":"{subject}"}}"#)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

async fn create_page(app: &Router) -> Page {
    let resp = app
        .clone()
        .oneshot(multipart_request(
            "/me/onenote/pages",
            &[
                ("Presentation", "text/html", "<html><head><title>Notes</title></head><body><p>hi</p></body></html>"),
                ("notes", "text/plain", "attached"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

// --- auth ---

#[tokio::test]
async fn missing_token_returns_401() {
    let resp = app()
        .oneshot(Request::builder().uri("/me").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"]["code"], "InvalidAuthenticationToken");
}

#[tokio::test]
async fn get_me_returns_profile() {
    let resp = app().oneshot(request("GET", "/me")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["displayName"], "Megan Bowen");
}

#[tokio::test]
async fn photo_value_is_binary() {
    let resp = app().oneshot(request("GET", "/me/photo/$value")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(body_bytes(resp).await.as_ref(), mock_server::PHOTO_BYTES);
}

// --- events ---

#[tokio::test]
async fn list_events_starts_empty() {
    let resp = app().oneshot(request("GET", "/me/events")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let events: Collection<Event> = body_json(resp).await;
    assert!(events.value.is_empty());
}

#[tokio::test]
async fn event_lifecycle() {
    let app = app();
    let event = create_event(&app, "Standup").await;
    assert_eq!(event.subject, "Standup");

    let resp = app
        .clone()
        .oneshot(json_request("PATCH", &format!("/me/events/{}", event.id), r#"{"subject":"Retro"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Event = body_json(resp).await;
    assert_eq!(updated.subject, "Retro");

    let resp = app.clone().oneshot(request("GET", "/me/events")).await.unwrap();
    let events: Collection<Event> = body_json(resp).await;
    assert_eq!(events.value, vec![updated]);

    let resp = app
        .clone()
        .oneshot(request("DELETE", &format!("/me/events/{}", event.id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = app
        .oneshot(request("DELETE", &format!("/me/events/{}", event.id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_event_without_subject_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/me/events", r#"{"start":{}}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn update_missing_event_returns_404() {
    let resp = app()
        .oneshot(json_request("PATCH", "/me/events/nope", r#"{"subject":"x"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"]["code"], "ErrorItemNotFound");
}

// --- mail ---

#[tokio::test]
async fn send_mail_accepts_message() {
    let resp = app()
        .oneshot(json_request("POST", "/me/sendMail", r#"{"message":{"subject":"hi"}}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn send_mail_rejects_missing_message() {
    let resp = app()
        .oneshot(json_request("POST", "/me/sendMail", r#"{"saveToSentItems":true}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- groups ---

#[tokio::test]
async fn groups_and_members() {
    let app = app();
    let resp = app.clone().oneshot(request("GET", "/groups")).await.unwrap();
    let groups: Collection<Group> = body_json(resp).await;
    assert_eq!(groups.value.len(), 2);

    let uri = format!("/groups/{}/members", groups.value[0].id);
    let resp = app.clone().oneshot(request("GET", &uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(request("GET", "/groups/unknown/members")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- onenote ---

#[tokio::test]
async fn create_page_records_parts_in_order() {
    let page = create_page(&app()).await;
    assert_eq!(page.title, "Notes");
    let names: Vec<&str> = page.parts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Presentation", "notes"]);
    assert_eq!(page.parts[1].content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn create_page_requires_presentation() {
    let resp = app()
        .oneshot(multipart_request("/me/onenote/pages", &[("notes", "text/plain", "x")]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn page_content_needs_html_accept() {
    let app = app();
    let page = create_page(&app).await;
    let uri = format!("/me/onenote/pages/{}/content", page.id);

    let resp = app.clone().oneshot(request("GET", &uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

    let mut req = request("GET", &uri);
    req.headers_mut()
        .insert(http::header::ACCEPT, "text/html".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/html");
    let html = body_bytes(resp).await;
    assert!(String::from_utf8_lossy(&html).contains("<p>hi</p>"));
}

#[tokio::test]
async fn append_to_page_content() {
    let app = app();
    let page = create_page(&app).await;
    let uri = format!("/me/onenote/pages/{}/content", page.id);

    let resp = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &uri,
            r#"[{"target":"body","action":"append","content":"<p>more</p>"}]"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let mut req = request("GET", &uri);
    req.headers_mut()
        .insert(http::header::ACCEPT, "text/html".parse().unwrap());
    let html = body_bytes(app.oneshot(req).await.unwrap()).await;
    assert!(String::from_utf8_lossy(&html).ends_with("<p>hi</p><p>more</p></body></html>"));
}
