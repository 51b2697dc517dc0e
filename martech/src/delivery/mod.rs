//! HTTP delivery with bounded retries.

mod client;
mod request;
mod retry;
mod transport;

pub use client::DeliveryClient;
pub use request::{HttpBody, HttpRequest, HttpResponse, MultipartPart};
pub use reqwest::Method;
pub use retry::{RetryPolicy, RetryablePredicate, is_retryable};
pub use transport::{HttpTransport, ReqwestTransport};
