use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, MartechResult};

/// A file part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

/// Body of an outgoing request. Cloned for every delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Empty,
    Bytes { content_type: String, data: Bytes },
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartPart>),
}

impl HttpBody {
    /// Returns the number of payload bytes carried by the body.
    ///
    /// JSON bodies are measured on their compact serialization.
    pub fn len(&self) -> usize {
        match self {
            HttpBody::Empty => 0,
            HttpBody::Bytes { data, .. } => data.len(),
            HttpBody::Json(value) => serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0),
            HttpBody::Form(pairs) => pairs.iter().map(|(k, v)| k.len() + v.len() + 2).sum(),
            HttpBody::Multipart(parts) => parts.iter().map(|part| part.data.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An HTTP call relative to a destination base url.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path joined onto the base url of the client.
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

impl HttpRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: HttpBody::Empty,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = HttpBody::Json(value);
        self
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = HttpBody::Form(pairs);
        self
    }

    pub fn bytes(mut self, content_type: impl Into<String>, data: Bytes) -> Self {
        self.body = HttpBody::Bytes {
            content_type: content_type.into(),
            data,
        };
        self
    }

    pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = HttpBody::Multipart(parts);
        self
    }

    /// Returns the value of the first header named `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parses the body as JSON. A body that is not JSON is a malformed response.
    pub fn json(&self) -> MartechResult<Value> {
        match serde_json::from_slice(&self.body) {
            Ok(value) => Ok(value),
            Err(_) => bail!(
                ErrorKind::MalformedResponse,
                "Destination response is not valid JSON",
                format!("status {}: {}", self.status, truncate(&self.text(), 512))
            ),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
