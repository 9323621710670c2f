//! MongoDB connection credentials.

use std::{fmt, str::FromStr};

use mongodb::options::{
    AuthMechanism, ClientOptions, Credential, ServerAddress, Tls, TlsOptions,
};
use serde::{Deserialize, Serialize};

use docclient_core::error::{DocumentStoreError, DocumentStoreResult};

/// Default MongoDB port.
pub const DEFAULT_PORT: u16 = 27017;

/// Default authentication mechanism.
pub const DEFAULT_AUTH_MECHANISM: &str = "SCRAM-SHA-1";

/// Coordinates and credentials of a MongoDB server.
///
/// `port`, `auth_mechanism` and `tls` may be omitted when deserializing and fall
/// back to `27017`, `SCRAM-SHA-1` and `false`.
///
/// ```ignore
/// let auth = DbAuth::from_json(r#"{
///     "host": "10.0.0.5",
///     "username": "reader",
///     "password": "secret",
///     "database_name": "admin"
/// }"#)?;
/// let store = MongoDbStoreBuilder::from_auth(auth, "bookstore").build().await?;
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DbAuth {
    /// Server host name or IP address.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Database the credentials are defined in.
    pub database_name: String,
    #[serde(default = "default_auth_mechanism")]
    pub auth_mechanism: String,
    #[serde(default)]
    pub tls: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_auth_mechanism() -> String {
    DEFAULT_AUTH_MECHANISM.to_string()
}

impl DbAuth {
    /// Creates credentials with the default port, mechanism and TLS setting.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            database_name: database_name.into(),
            auth_mechanism: default_auth_mechanism(),
            tls: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auth_mechanism(mut self, mechanism: impl Into<String>) -> Self {
        self.auth_mechanism = mechanism.into();
        self
    }

    pub fn with_tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    /// Parses credentials from a JSON object.
    pub fn from_json(json: &str) -> DocumentStoreResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DocumentStoreError::Configuration(format!("invalid credentials: {e}")))
    }

    /// Converts the credentials into driver client options.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if the mechanism is not one
    /// the driver knows.
    pub fn to_client_options(&self) -> DocumentStoreResult<ClientOptions> {
        let mechanism = AuthMechanism::from_str(&self.auth_mechanism).map_err(|e| {
            DocumentStoreError::Configuration(format!(
                "unknown auth mechanism {}: {e}",
                self.auth_mechanism
            ))
        })?;

        let mut options = ClientOptions::default();

        options.hosts = vec![ServerAddress::Tcp {
            host: self.host.clone(),
            port: Some(self.port),
        }];
        options.credential = Some(
            Credential::builder()
                .username(self.username.clone())
                .password(self.password.clone())
                .source(self.database_name.clone())
                .mechanism(mechanism)
                .build(),
        );
        options.tls = Some(if self.tls {
            Tls::Enabled(TlsOptions::default())
        } else {
            Tls::Disabled
        });

        Ok(options)
    }
}

impl fmt::Debug for DbAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbAuth")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database_name", &self.database_name)
            .field("auth_mechanism", &self.auth_mechanism)
            .field("tls", &self.tls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_applies_defaults() {
        let auth = DbAuth::from_json(
            r#"{ "host": "10.0.0.5", "username": "u", "password": "p", "database_name": "admin" }"#,
        )
        .unwrap();

        assert_eq!(auth, DbAuth::new("10.0.0.5", "u", "p", "admin"));
        assert_eq!(auth.port, 27017);
        assert_eq!(auth.auth_mechanism, "SCRAM-SHA-1");
        assert!(!auth.tls);
    }

    #[test]
    fn test_from_json_rejects_missing_fields() {
        let result = DbAuth::from_json(r#"{ "host": "localhost" }"#);

        assert!(matches!(result, Err(DocumentStoreError::Configuration(_))));
    }

    #[test]
    fn test_client_options() {
        let options = DbAuth::new("db.local", "u", "p", "admin")
            .with_port(27018)
            .with_tls(true)
            .to_client_options()
            .unwrap();

        assert_eq!(
            options.hosts,
            vec![ServerAddress::Tcp { host: "db.local".into(), port: Some(27018) }]
        );

        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("u"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
        assert_eq!(credential.mechanism, Some(AuthMechanism::ScramSha1));
        assert!(matches!(options.tls, Some(Tls::Enabled(_))));
    }

    #[test]
    fn test_unknown_mechanism() {
        let result = DbAuth::new("h", "u", "p", "admin")
            .with_auth_mechanism("NOPE")
            .to_client_options();

        assert!(matches!(result, Err(DocumentStoreError::Configuration(_))));
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", DbAuth::new("h", "u", "hunter2", "admin"));

        assert!(!rendered.contains("hunter2"));
    }
}
