//! Error types and result definitions for sync runs.
//!
//! [`MartechError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, an optional source error and the call site that created it. Several errors can
//! be aggregated into one, which is how a run reports more than one failed batch.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for sync operations using [`MartechError`] as the error type.
pub type MartechResult<T> = Result<T, MartechError>;

/// Detailed payload stored for single [`MartechError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for sync operations.
#[derive(Debug, Clone)]
pub struct MartechError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<MartechError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures that can occur during a sync run.
///
/// The kind decides how the failure is handled: configuration kinds abort a run before any
/// delivery, transient kinds are retried by the delivery client, delivery kinds fail a single
/// batch.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigError,
    ConnectionNotFound,
    SecretNotFound,
    UnknownTransformFunction,

    // Data & Transformation Errors
    ValidationError,
    InvalidData,
    ConversionError,

    // Network & Delivery Errors
    DestinationConnectionFailed,
    DestinationRejected,
    MalformedResponse,
    DeliveryError,

    // IO & Serialization Errors
    IoError,
    ObjectStoreError,
    SecretsStoreError,
    SerializationError,
    DeserializationError,

    // Security & Authentication Errors
    AuthenticationError,

    // Control Flow
    OperationCanceled,

    // Unknown / Uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns `true` for failures expected to go away on their own, such as refused
    /// connections and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::DestinationConnectionFailed)
    }

    /// Returns `true` for failures that must abort a run before anything is delivered.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConfigError
                | ErrorKind::ConnectionNotFound
                | ErrorKind::SecretNotFound
                | ErrorKind::UnknownTransformFunction
        )
    }
}

impl MartechError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "multiple errors",
        }
    }

    /// Returns the dynamic detail, if any.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the call site that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        MartechError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for MartechError {
    fn eq(&self, other: &MartechError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Hash for MartechError {
    /// Hashes only the kind and static description so equal failures group together.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for MartechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_indented(f, "Detail:", detail)?;
                }
                if let Some(source) = payload.source.as_ref() {
                    write_indented(f, "Caused by:", &source.to_string())?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_indented(f, "Backtrace:", &backtrace)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

/// Writes a labelled block indented under the headline.
fn write_indented(f: &mut fmt::Formatter<'_>, label: &str, body: &str) -> fmt::Result {
    if body.trim().is_empty() {
        return write!(f, "\n  {label} <empty>");
    }

    write!(f, "\n  {label}")?;
    for line in body.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

impl error::Error for MartechError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`MartechError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for MartechError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> MartechError {
        MartechError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`MartechError`] from an error kind, static description and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for MartechError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> MartechError {
        MartechError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors; a single error is returned unwrapped.
impl<E> From<Vec<E>> for MartechError
where
    E: Into<MartechError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> MartechError {
        let location = Location::caller();
        let mut errors: Vec<MartechError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        MartechError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Builds a [`MartechError`] that keeps `err` as its source and its message as detail.
#[track_caller]
fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> MartechError
where
    E: error::Error + Send + Sync + 'static,
{
    let detail = err.to_string();
    MartechError::from_components(
        kind,
        Cow::Borrowed(description),
        Some(Cow::Owned(detail)),
        Some(Arc::new(err)),
    )
}

impl From<std::io::Error> for MartechError {
    #[track_caller]
    fn from(err: std::io::Error) -> MartechError {
        wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

/// Maps JSON failures to serialization or deserialization kinds based on their category.
impl From<serde_json::Error> for MartechError {
    #[track_caller]
    fn from(err: serde_json::Error) -> MartechError {
        match err.classify() {
            serde_json::error::Category::Io => {
                wrap(ErrorKind::IoError, "JSON I/O operation failed", err)
            }
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => wrap(
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
                err,
            ),
        }
    }
}

impl From<csv::Error> for MartechError {
    #[track_caller]
    fn from(err: csv::Error) -> MartechError {
        let kind = if err.is_io_error() {
            ErrorKind::IoError
        } else {
            ErrorKind::SerializationError
        };
        wrap(kind, "CSV encoding failed", err)
    }
}

/// Classifies HTTP client failures: refused connections and timeouts are transient, anything
/// else (invalid request, body or redirect failures) is a non-retryable delivery error.
impl From<reqwest::Error> for MartechError {
    #[track_caller]
    fn from(err: reqwest::Error) -> MartechError {
        if err.is_connect() || err.is_timeout() {
            wrap(
                ErrorKind::DestinationConnectionFailed,
                "Could not reach the destination",
                err,
            )
        } else if err.is_builder() {
            wrap(ErrorKind::ConfigError, "Invalid HTTP request", err)
        } else {
            wrap(ErrorKind::DeliveryError, "HTTP request failed", err)
        }
    }
}

impl From<url::ParseError> for MartechError {
    #[track_caller]
    fn from(err: url::ParseError) -> MartechError {
        wrap(ErrorKind::ConfigError, "Invalid URL", err)
    }
}

impl From<jsonwebtoken::errors::Error> for MartechError {
    #[track_caller]
    fn from(err: jsonwebtoken::errors::Error) -> MartechError {
        wrap(ErrorKind::AuthenticationError, "Could not sign the payload token", err)
    }
}

impl From<chrono::ParseError> for MartechError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> MartechError {
        wrap(ErrorKind::ConversionError, "Date parsing failed", err)
    }
}

impl From<base64::DecodeError> for MartechError {
    #[track_caller]
    fn from(err: base64::DecodeError) -> MartechError {
        wrap(ErrorKind::ConversionError, "Base64 decoding failed", err)
    }
}

impl From<std::str::Utf8Error> for MartechError {
    #[track_caller]
    fn from(err: std::str::Utf8Error) -> MartechError {
        wrap(ErrorKind::ConversionError, "UTF-8 conversion failed", err)
    }
}

impl From<std::string::FromUtf8Error> for MartechError {
    #[track_caller]
    fn from(err: std::string::FromUtf8Error) -> MartechError {
        wrap(
            ErrorKind::ConversionError,
            "UTF-8 string conversion failed",
            err,
        )
    }
}

impl From<config::shared::ValidationError> for MartechError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> MartechError {
        wrap(ErrorKind::ConfigError, "Invalid run configuration", err)
    }
}
