//! `multipart/form-data` parts and their wire encoding.
//!
//! OneNote page creation is the main multipart caller: a `Presentation` part
//! carrying the page HTML followed by the binary parts it references by name.
//! Parts are written in the order given.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One named, typed chunk of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartPart {
    pub name: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub content: Vec<u8>,
}

impl MultipartPart {
    pub fn text(name: &str, content_type: &str, text: &str) -> Self {
        Self::bytes(name, content_type, text.as_bytes().to_vec())
    }

    pub fn bytes(name: &str, content_type: &str, content: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            file_name: None,
            content,
        }
    }

    pub fn file_name(mut self, file_name: &str) -> Self {
        self.file_name = Some(file_name.to_string());
        self
    }
}

/// A boundary unlikely to collide with part content.
pub fn new_boundary() -> String {
    format!("snippets-{}", Uuid::new_v4().simple())
}

/// `Content-Type` header value for a body encoded with `boundary`.
pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

/// Encode `parts` as a `multipart/form-data` body.
pub fn encode(parts: &[MultipartPart], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let disposition = match &part.file_name {
            Some(file) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(&part.name),
                escape_quoted(file)
            ),
            None => format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n",
                escape_quoted(&part.name)
            ),
        };
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        out.extend_from_slice(&part.content);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_parts_in_order() {
        let parts = vec![
            MultipartPart::text("Presentation", "text/html", "<html></html>"),
            MultipartPart::bytes("image", "image/png", vec![0x89, 0x50]).file_name("logo.png"),
        ];
        let body = encode(&parts, "XYZ");
        let expected = [
            b"--XYZ\r\n".as_slice(),
            b"Content-Disposition: form-data; name=\"Presentation\"\r\n",
            b"Content-Type: text/html\r\n\r\n",
            b"<html></html>\r\n",
            b"--XYZ\r\n",
            b"Content-Disposition: form-data; name=\"image\"; filename=\"logo.png\"\r\n",
            b"Content-Type: image/png\r\n\r\n",
            &[0x89, 0x50],
            b"\r\n--XYZ--\r\n",
        ]
        .concat();
        assert_eq!(body, expected);
    }

    #[test]
    fn empty_part_list_still_closes() {
        assert_eq!(encode(&[], "B"), b"--B--\r\n".to_vec());
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let part = MultipartPart::text("a\"b", "text/plain", "x");
        let body = String::from_utf8(encode(&[part], "B")).unwrap();
        assert!(body.contains("name=\"a\\\"b\""));
    }

    #[test]
    fn boundaries_are_unique() {
        let a = new_boundary();
        let b = new_boundary();
        assert_ne!(a, b);
        assert!(content_type(&a).starts_with("multipart/form-data; boundary=snippets-"));
    }
}
