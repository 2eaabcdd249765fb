use serde::Deserialize;
use std::fmt;

use crate::shared::ValidationError;

/// Connection configuration for the source MySQL server.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid
/// accidentally leaking the password into serialized forms. [`fmt::Debug`]
/// redacts it for the same reason.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MySqlConnectionConfig {
    /// Host of the MySQL server.
    pub host: String,
    /// Port of the MySQL server.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username used for both the query connection and binlog streaming.
    pub username: String,
    /// Password, if the server requires one.
    #[serde(default)]
    pub password: Option<String>,
    /// The source database (schema) that is being mirrored.
    pub database: String,
}

impl MySqlConnectionConfig {
    /// Default MySQL server port.
    pub const DEFAULT_PORT: u16 = 3306;

    /// Validates the connection settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::SourceConnection(
                "`host` must not be empty".to_string(),
            ));
        }

        if self.database.is_empty() {
            return Err(ValidationError::SourceConnection(
                "`database` must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for MySqlConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .finish()
    }
}

fn default_port() -> u16 {
    MySqlConnectionConfig::DEFAULT_PORT
}
