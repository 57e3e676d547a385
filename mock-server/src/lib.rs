use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,
}

#[derive(Deserialize)]
pub struct CreateEvent {
    pub subject: String,
    pub start: Option<Value>,
    pub end: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateEvent {
    pub subject: Option<String>,
    pub start: Option<Value>,
    pub end: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub display_name: String,
}

/// Envelope the unified API wraps collections in.
#[derive(Debug, Serialize, Deserialize)]
pub struct Collection<T> {
    pub value: Vec<T>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PagePart {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub parts: Vec<PagePart>,
    #[serde(skip)]
    pub html: String,
}

#[derive(Deserialize)]
pub struct PageCommand {
    pub target: String,
    pub action: String,
    pub content: String,
}

#[derive(Default)]
pub struct Store {
    pub events: HashMap<String, Event>,
    pub groups: Vec<Group>,
    pub pages: HashMap<String, Page>,
    pub sent_mail: Vec<Value>,
}

pub type Db = Arc<RwLock<Store>>;

/// Store seeded with the groups the catalog's group snippets list.
pub fn seeded_store() -> Store {
    Store {
        groups: vec![
            Group {
                id: "02bd9fd6-8f93-4758-87c3-1fb73740a315".to_string(),
                display_name: "HR Taskforce".to_string(),
            },
            Group {
                id: "06f62f70-9827-4e6e-93ef-8e0f2d9b7b23".to_string(),
                display_name: "Mark 8 Project Team".to_string(),
            },
        ],
        ..Store::default()
    }
}

pub fn app() -> Router {
    app_with_store(Arc::new(RwLock::new(seeded_store())))
}

pub fn app_with_store(db: Db) -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/photo", get(get_photo))
        .route("/me/photo/$value", get(get_photo_value))
        .route("/me/events", get(list_events).post(create_event))
        .route("/me/events/{id}", patch(update_event).delete(delete_event))
        .route("/me/sendMail", post(send_mail))
        .route("/me/onenote/pages", post(create_page))
        .route(
            "/me/onenote/pages/{id}/content",
            get(get_page_content).patch(update_page_content),
        )
        .route("/groups", get(list_groups))
        .route("/groups/{id}/members", get(list_group_members))
        .layer(middleware::from_fn(require_bearer))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn graph_error(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({"error": {"code": code, "message": message}});
    (status, Json(body)).into_response()
}

async fn require_bearer(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer ") && v.len() > "Bearer ".len());
    if !authorized {
        return graph_error(
            StatusCode::UNAUTHORIZED,
            "InvalidAuthenticationToken",
            "Access token is empty.",
        );
    }
    next.run(request).await
}

async fn get_me() -> Json<Value> {
    Json(json!({
        "id": "48d31887-5fad-4d73-a9f5-3c356e68a038",
        "displayName": "Megan Bowen",
        "userPrincipalName": "meganb@contoso.com"
    }))
}

/// Four-byte JPEG SOI/APP0 prefix standing in for profile photo bytes.
pub const PHOTO_BYTES: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

async fn get_photo() -> Json<Value> {
    Json(json!({
        "@odata.mediaContentType": "image/jpeg",
        "height": 48,
        "width": 48
    }))
}

async fn get_photo_value() -> Response {
    ([(header::CONTENT_TYPE, "image/jpeg")], PHOTO_BYTES.to_vec()).into_response()
}

async fn list_events(State(db): State<Db>) -> Json<Collection<Event>> {
    let store = db.read().await;
    let mut value: Vec<Event> = store.events.values().cloned().collect();
    value.sort_by(|a, b| a.id.cmp(&b.id));
    Json(Collection { value })
}

async fn create_event(
    State(db): State<Db>,
    Json(input): Json<CreateEvent>,
) -> (StatusCode, Json<Event>) {
    let event = Event {
        id: Uuid::new_v4().to_string(),
        subject: input.subject,
        start: input.start,
        end: input.end,
    };
    db.write().await.events.insert(event.id.clone(), event.clone());
    (StatusCode::CREATED, Json(event))
}

async fn update_event(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<UpdateEvent>,
) -> Result<Json<Event>, Response> {
    let mut store = db.write().await;
    let event = store
        .events
        .get_mut(&id)
        .ok_or_else(|| graph_error(StatusCode::NOT_FOUND, "ErrorItemNotFound", "The specified object was not found in the store."))?;
    if let Some(subject) = input.subject {
        event.subject = subject;
    }
    if let Some(start) = input.start {
        event.start = Some(start);
    }
    if let Some(end) = input.end {
        event.end = Some(end);
    }
    Ok(Json(event.clone()))
}

async fn delete_event(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let mut store = db.write().await;
    match store.events.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => graph_error(
            StatusCode::NOT_FOUND,
            "ErrorItemNotFound",
            "The specified object was not found in the store.",
        ),
    }
}

async fn send_mail(State(db): State<Db>, body: String) -> Response {
    let parsed: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => return graph_error(StatusCode::BAD_REQUEST, "BadRequest", &e.to_string()),
    };
    if !parsed.get("message").is_some_and(Value::is_object) {
        return graph_error(StatusCode::BAD_REQUEST, "BadRequest", "Missing message.");
    }
    db.write().await.sent_mail.push(parsed);
    StatusCode::ACCEPTED.into_response()
}

async fn list_groups(State(db): State<Db>) -> Json<Collection<Group>> {
    let store = db.read().await;
    Json(Collection {
        value: store.groups.clone(),
    })
}

async fn list_group_members(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let store = db.read().await;
    if !store.groups.iter().any(|g| g.id == id) {
        return graph_error(StatusCode::NOT_FOUND, "Request_ResourceNotFound", "Group not found.");
    }
    Json(json!({"value": [{"id": "48d31887-5fad-4d73-a9f5-3c356e68a038", "displayName": "Megan Bowen"}]}))
        .into_response()
}

async fn create_page(State(db): State<Db>, mut multipart: Multipart) -> Response {
    let mut parts = Vec::new();
    let mut html = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return graph_error(StatusCode::BAD_REQUEST, "BadRequest", &e.to_string()),
        };
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return graph_error(StatusCode::BAD_REQUEST, "BadRequest", &e.to_string()),
        };
        if name == "Presentation" {
            html = Some(String::from_utf8_lossy(&data).into_owned());
        }
        parts.push(PagePart {
            name,
            content_type,
            size: data.len(),
        });
    }
    let Some(html) = html else {
        return graph_error(StatusCode::BAD_REQUEST, "BadRequest", "Missing Presentation part.");
    };

    let page = Page {
        id: Uuid::new_v4().to_string(),
        title: page_title(&html),
        parts,
        html,
    };
    db.write().await.pages.insert(page.id.clone(), page.clone());
    (StatusCode::CREATED, Json(page)).into_response()
}

async fn get_page_content(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let accepts_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"));
    if !accepts_html {
        return graph_error(StatusCode::NOT_ACCEPTABLE, "NotAcceptable", "Page content is text/html.");
    }
    let store = db.read().await;
    match store.pages.get(&id) {
        Some(page) => ([(header::CONTENT_TYPE, "text/html")], page.html.clone()).into_response(),
        None => graph_error(StatusCode::NOT_FOUND, "ItemNotFound", "Page not found."),
    }
}

async fn update_page_content(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(commands): Json<Vec<PageCommand>>,
) -> Response {
    let mut store = db.write().await;
    let Some(page) = store.pages.get_mut(&id) else {
        return graph_error(StatusCode::NOT_FOUND, "ItemNotFound", "Page not found.");
    };
    for command in commands {
        if command.target != "body" || command.action != "append" {
            return graph_error(StatusCode::BAD_REQUEST, "BadRequest", "Unsupported page command.");
        }
        match page.html.rfind("</body>") {
            Some(at) => page.html.insert_str(at, &command.content),
            None => page.html.push_str(&command.content),
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

fn page_title(html: &str) -> String {
    html.split_once("<title>")
        .and_then(|(_, rest)| rest.split_once("</title>"))
        .map(|(title, _)| title.trim().to_string())
        .unwrap_or_default()
}
