use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::error;
use url::Url;

use crate::error::{ErrorKind, MartechResult};
use crate::{bail, martech_error};

/// Credentials and settings of an external system, as stored in the secrets bundle.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    pub host: Option<String>,
    pub login: Option<String>,
    pub password: Option<SecretString>,
    pub schema: Option<String>,
    pub port: Option<u16>,
    /// Destination specific settings such as api keys and bucket names.
    pub extra: Map<String, Value>,
}

/// Raw shape of a connection entry inside a secrets bundle.
#[derive(Debug, Deserialize)]
struct ConnectionFields {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    port: Option<Value>,
    #[serde(default)]
    extra: Option<Value>,
}

impl Connection {
    /// Parses the bundle entry stored under `id`.
    ///
    /// `extra` may be stored as an object or as JSON text. Text that does not parse into an
    /// object is logged and replaced by an empty object.
    pub fn from_bundle_entry(id: &str, entry: Value) -> MartechResult<Connection> {
        let fields: ConnectionFields = serde_json::from_value(entry).map_err(|err| {
            martech_error!(
                ErrorKind::DeserializationError,
                "Invalid connection entry in secrets bundle",
                id,
                source: err
            )
        })?;

        let port = match fields.port {
            None | Some(Value::Null) => None,
            Some(Value::Number(port)) => port.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(port)) if port.is_empty() => None,
            Some(Value::String(port)) => port.trim().parse::<u16>().ok(),
            Some(_) => None,
        };

        Ok(Connection {
            id: id.to_owned(),
            host: fields.host.filter(|host| !host.is_empty()),
            login: fields.login.filter(|login| !login.is_empty()),
            password: fields.password.map(SecretString::new),
            schema: fields.schema.filter(|schema| !schema.is_empty()),
            port,
            extra: parse_extra(id, fields.extra),
        })
    }

    /// Returns the string stored under `key` in `extra`.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the string stored under `key` in `extra`, failing with a configuration error.
    pub fn require_extra_str(&self, key: &str) -> MartechResult<&str> {
        match self.extra_str(key) {
            Some(value) => Ok(value),
            None => bail!(
                ErrorKind::ConfigError,
                "Connection is missing a required extra field",
                format!("{}.extra.{key}", self.id)
            ),
        }
    }

    /// Returns the login, failing with a configuration error.
    pub fn require_login(&self) -> MartechResult<&str> {
        match self.login.as_deref() {
            Some(login) => Ok(login),
            None => bail!(
                ErrorKind::ConfigError,
                "Connection has no login",
                self.id.clone()
            ),
        }
    }

    /// Returns the password, failing with a configuration error.
    pub fn require_password(&self) -> MartechResult<&str> {
        match self.password.as_ref() {
            Some(password) => Ok(password.expose_secret()),
            None => bail!(
                ErrorKind::ConfigError,
                "Connection has no password",
                self.id.clone()
            ),
        }
    }

    /// Returns the base url of the connection, or `default` when it has no host.
    ///
    /// A host without a scheme is taken as `https`. The connection port, when set, replaces the
    /// default port of the scheme.
    pub fn base_url(&self, default: &str) -> MartechResult<Url> {
        let host = self.host.as_deref().unwrap_or(default);
        let raw = if host.contains("://") {
            host.to_owned()
        } else {
            format!("https://{host}")
        };

        let mut url = Url::parse(&raw)?;
        if let Some(port) = self.port {
            url.set_port(Some(port)).map_err(|_| {
                martech_error!(
                    ErrorKind::ConfigError,
                    "Connection port cannot be applied to its host",
                    self.id.clone()
                )
            })?;
        }

        Ok(url)
    }
}

fn parse_extra(id: &str, extra: Option<Value>) -> Map<String, Value> {
    match extra {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(extra)) => extra,
        Some(Value::String(text)) if text.trim().is_empty() => Map::new(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(extra)) => extra,
            Ok(_) => {
                error!(connection_id = id, "connection extra is not a JSON object");
                Map::new()
            }
            Err(err) => {
                error!(connection_id = id, error = %err, "failed parsing connection extra");
                Map::new()
            }
        },
        Some(_) => {
            error!(connection_id = id, "connection extra is not a JSON object");
            Map::new()
        }
    }
}
