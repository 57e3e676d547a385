//! The sample snippet catalog, grouped into sections.

use serde_json::{json, Value};

use crate::error::OperationError;
use crate::multipart::MultipartPart;
use crate::operation::{
    Headers, Operation, OperationKind, Params, ParamsSource, ParamsSources, PARAMS_EVENT_ID_KEY,
    PARAMS_GROUP_ID_KEY, PARAMS_POST_DATA_KEY,
};

const DOCS: &str = "https://graph.microsoft.io/en-us/docs/api-reference/v1.0/api";

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSection {
    pub title: String,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    sections: Vec<CatalogSection>,
}

impl Catalog {
    pub fn new(sections: Vec<CatalogSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[CatalogSection] {
        &self.sections
    }

    /// All operations, section by section.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.sections.iter().flat_map(|s| s.operations.iter())
    }

    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.operations.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operation at a flat index across all sections.
    pub fn get(&self, index: usize) -> Option<&Operation> {
        self.operations().nth(index)
    }

    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations().find(|op| op.name() == name)
    }

    /// The snippets shipped with the sample app.
    pub fn sample() -> Result<Self, OperationError> {
        Ok(Self::new(vec![
            section("Users", users()?),
            section("Me", me()?),
            section("Events", events()?),
            section("Mail", mail()?),
            section("Groups", groups()?),
            section("Files", files()?),
            section("OneNote", onenote()?),
        ]))
    }
}

fn section(title: &str, operations: Vec<Operation>) -> CatalogSection {
    CatalogSection {
        title: title.to_string(),
        operations,
    }
}

fn obj(value: Value) -> Option<Params> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn sources(entries: &[(&str, ParamsSource)]) -> Option<ParamsSources> {
    Some(entries.iter().map(|(k, s)| (k.to_string(), *s)).collect())
}

fn doc(page: &str) -> String {
    format!("{DOCS}/{page}")
}

fn get(name: &str, url: &str, description: &str, page: &str) -> Result<Operation, OperationError> {
    Operation::new(name, url, OperationKind::Get, description, &doc(page), None, None)
}

fn users() -> Result<Vec<Operation>, OperationError> {
    Ok(vec![
        get("Get users", "users", "Lists the users in the tenant.", "user_list")?.admin_required(),
        Operation::new(
            "Get user",
            "users/{user-id}",
            OperationKind::Get,
            "Gets one user by id or user principal name.",
            &doc("user_get"),
            obj(json!({"user-id": ""})),
            sources(&[("user-id", ParamsSource::TextEdit)]),
        )?,
    ])
}

fn me() -> Result<Vec<Operation>, OperationError> {
    Ok(vec![
        get("Get me", "me", "Gets the signed-in user's profile.", "user_get")?,
        get("Get my manager", "me/manager", "Gets the signed-in user's manager.", "user_list_manager")?,
        get(
            "Get my direct reports",
            "me/directReports",
            "Lists the users who report to the signed-in user.",
            "user_list_directreports",
        )?,
        get("Get my photo", "me/photo", "Gets metadata for the signed-in user's photo.", "profilephoto_get")?,
    ])
}

fn events() -> Result<Vec<Operation>, OperationError> {
    Ok(vec![
        Operation::new(
            "Get events",
            "me/events",
            OperationKind::Get,
            "Lists events on the signed-in user's calendar.",
            &doc("user_list_events"),
            obj(json!({"$select": "subject,start,end"})),
            None,
        )?,
        Operation::new(
            "Create event",
            "me/events",
            OperationKind::Post,
            "Creates an event on the signed-in user's calendar.",
            &doc("user_post_events"),
            obj(json!({
                "subject": "Snippets sample event",
                "body": {"contentType": "HTML", "content": "Created by the snippets sample."},
                "start": {"dateTime": "2026-01-01T09:00:00", "timeZone": "UTC"},
                "end": {"dateTime": "2026-01-01T10:00:00", "timeZone": "UTC"}
            })),
            sources(&[("subject", ParamsSource::TextEdit)]),
        )?,
        Operation::new(
            "Update event",
            "me/events/{event-id}",
            OperationKind::Patch,
            "Changes the subject of an event.",
            &doc("event_update"),
            obj(json!({PARAMS_EVENT_ID_KEY: "", "subject": "Updated by the snippets sample"})),
            sources(&[
                (PARAMS_EVENT_ID_KEY, ParamsSource::GetEvents),
                ("subject", ParamsSource::TextEdit),
            ]),
        )?,
        Operation::new(
            "Delete event",
            "me/events/{event-id}",
            OperationKind::Delete,
            "Deletes an event.",
            &doc("event_delete"),
            obj(json!({PARAMS_EVENT_ID_KEY: ""})),
            sources(&[(PARAMS_EVENT_ID_KEY, ParamsSource::GetEvents)]),
        )?,
    ])
}

fn mail() -> Result<Vec<Operation>, OperationError> {
    let header = Headers::from([("Content-Type".to_string(), "application/json".to_string())]);
    let body = json!({
        "message": {
            "subject": "Mail sent from the snippets sample",
            "body": {"contentType": "Text", "content": "Hello from the snippets sample."},
            "toRecipients": [{"emailAddress": {"address": "me@contoso.com"}}]
        },
        "saveToSentItems": true
    })
    .to_string();

    Ok(vec![
        Operation::new(
            "Get messages",
            "me/messages",
            OperationKind::Get,
            "Lists messages in the signed-in user's mailbox.",
            &doc("user_list_messages"),
            obj(json!({"$top": 10})),
            None,
        )?,
        Operation::with_custom_payload(
            "Send mail",
            "me/sendMail",
            OperationKind::PostCustom,
            Some(header),
            Some(body),
            "Sends a message as the signed-in user.",
            &doc("user_sendmail"),
            None,
            None,
        )?,
    ])
}

fn groups() -> Result<Vec<Operation>, OperationError> {
    let by_group = || {
        (
            obj(json!({PARAMS_GROUP_ID_KEY: ""})),
            sources(&[(PARAMS_GROUP_ID_KEY, ParamsSource::GetGroups)]),
        )
    };
    let (members_params, members_sources) = by_group();
    let (conv_params, conv_sources) = by_group();

    Ok(vec![
        get("Get groups", "groups", "Lists the groups in the tenant.", "group_list")?,
        Operation::new(
            "Get group members",
            "groups/{group-id}/members",
            OperationKind::Get,
            "Lists the members of a group.",
            &doc("group_list_members"),
            members_params,
            members_sources,
        )?,
        Operation::new(
            "Get group conversations",
            "groups/{group-id}/conversations",
            OperationKind::Get,
            "Lists the conversations of a group.",
            &doc("group_list_conversations"),
            conv_params,
            conv_sources,
        )?,
        Operation::new(
            "Create group",
            "groups",
            OperationKind::Post,
            "Creates a security group.",
            &doc("group_post_groups"),
            obj(json!({
                "displayName": "Snippets sample group",
                "mailEnabled": false,
                "mailNickname": "snippetsgroup",
                "securityEnabled": true
            })),
            sources(&[("displayName", ParamsSource::TextEdit)]),
        )?
        .admin_required(),
    ])
}

fn files() -> Result<Vec<Operation>, OperationError> {
    Ok(vec![
        get(
            "Get files",
            "me/drive/root/children",
            "Lists the items in the root of the signed-in user's drive.",
            "item_list_children",
        )?,
        Operation::new(
            "Create folder",
            "me/drive/root/children",
            OperationKind::Post,
            "Creates a folder in the root of the drive.",
            &doc("item_post_children"),
            obj(json!({"name": "Snippets sample folder", "folder": {}})),
            sources(&[("name", ParamsSource::TextEdit)]),
        )?,
        Operation::new(
            "Rename folder",
            "me/drive/items/{post-data}",
            OperationKind::Patch,
            "Renames the folder created by Create folder.",
            &doc("item_update"),
            obj(json!({PARAMS_POST_DATA_KEY: "", "name": "Renamed snippets folder"})),
            sources(&[
                (PARAMS_POST_DATA_KEY, ParamsSource::PostData),
                ("name", ParamsSource::TextEdit),
            ]),
        )?,
        Operation::new(
            "Delete folder",
            "me/drive/items/{post-data}",
            OperationKind::Delete,
            "Deletes the folder created by Create folder.",
            &doc("item_delete"),
            obj(json!({PARAMS_POST_DATA_KEY: ""})),
            sources(&[(PARAMS_POST_DATA_KEY, ParamsSource::PostData)]),
        )?,
    ])
}

fn onenote() -> Result<Vec<Operation>, OperationError> {
    let page_html = "<!DOCTYPE html><html><head><title>Snippets sample page</title></head>\
                     <body><p>Created by the snippets sample.</p>\
                     <object data-attachment=\"notes.txt\" data=\"name:notes\" type=\"text/plain\" />\
                     </body></html>";
    let parts = vec![
        MultipartPart::text("Presentation", "text/html", page_html),
        MultipartPart::text("notes", "text/plain", "Attachment from the snippets sample.")
            .file_name("notes.txt"),
    ];
    let append = json!([{
        "target": "body",
        "action": "append",
        "content": "<p>Appended by the snippets sample.</p>"
    }])
    .to_string();
    let page = || {
        (
            obj(json!({"page-id": ""})),
            sources(&[("page-id", ParamsSource::TextEdit)]),
        )
    };
    let (content_params, content_sources) = page();
    let (append_params, append_sources) = page();

    Ok(vec![
        get("Get notebooks", "me/onenote/notebooks", "Lists the user's notebooks.", "onenote_list_notebooks")?,
        get("Get pages", "me/onenote/pages", "Lists the user's OneNote pages.", "onenote_list_pages")?,
        Operation::new(
            "Get page content",
            "me/onenote/pages/{page-id}/content",
            OperationKind::Get,
            "Gets the HTML content of a page.",
            &doc("page_get"),
            content_params,
            content_sources,
        )?
        .with_custom_response_type("text/html"),
        Operation::with_multipart(
            "Create page",
            "me/onenote/pages",
            OperationKind::PostMultipart,
            "Creates a page with an attached file.",
            &doc("section_post_pages"),
            parts,
        )?,
        Operation::with_custom_payload(
            "Append to page",
            "me/onenote/pages/{page-id}/content",
            OperationKind::PatchCustom,
            Some(Headers::from([("Content-Type".to_string(), "application/json".to_string())])),
            Some(append),
            "Appends a paragraph to a page.",
            &doc("page_update"),
            append_params,
            append_sources,
        )?,
    ])
}
