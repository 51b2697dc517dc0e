//! Connection lookup from the secrets bundle.

#[allow(clippy::module_inception)]
mod connection;
mod resolver;

pub use connection::Connection;
pub use resolver::{
    ConnectionResolver, DEV_SECRET_NAME, PROD_SECRET_NAME, SecretBundleCache, default_secret_name,
};
