use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::delivery::{HttpBody, HttpRequest, HttpResponse};
use crate::error::MartechResult;

/// Executes a single HTTP exchange.
///
/// Any completed exchange is returned as an [`HttpResponse`], including error statuses.
/// Failures to complete the exchange are returned as errors, with connect failures and
/// timeouts classified as [`crate::error::ErrorKind::DestinationConnectionFailed`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, url: Url, request: HttpRequest) -> MartechResult<HttpResponse>;
}

/// [`HttpTransport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport applying `timeout` to every request.
    pub fn new(timeout: Duration) -> MartechResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, url: Url, request: HttpRequest) -> MartechResult<HttpResponse> {
        let has_content_type = request.header_value(CONTENT_TYPE.as_str()).is_some();

        let mut builder = self.client.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Bytes { content_type, data } => {
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, content_type);
                }
                builder.body(data)
            }
            HttpBody::Json(value) => {
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, "application/json");
                }
                builder.body(serde_json::to_vec(&value)?)
            }
            HttpBody::Form(pairs) => builder.form(&pairs),
            HttpBody::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    let mut file = Part::bytes(part.data.to_vec()).mime_str(&part.content_type)?;
                    if let Some(file_name) = part.file_name {
                        file = file.file_name(file_name);
                    }
                    form = form.part(part.name, file);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(HttpResponse { status, body })
    }
}
