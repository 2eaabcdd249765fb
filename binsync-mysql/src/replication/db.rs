use std::num::NonZeroI32;

use binsync_config::shared::MySqlConnectionConfig;
use mysql_async::{Opts, OptsBuilder, Pool};

/// Builds a connection pool for the configured source database.
///
/// The pool connects lazily; the first query performs the actual handshake.
pub fn connect_to_source_database(config: &MySqlConnectionConfig) -> Pool {
    let mut options = OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.username.clone()))
        .db_name(Some(config.database.clone()));

    if let Some(password) = &config.password {
        options = options.pass(Some(password.clone()));
    }

    Pool::new(Opts::from(options))
}

/// Parses a MySQL server version string into its numeric form.
///
/// Accepts strings like `8.0.35` or `5.7.44-log` and encodes them as
/// `MAJOR * 10000 + MINOR * 100 + PATCH`, e.g. `80035` for MySQL 8.0.35.
/// Returns `None` when the string cannot be parsed or encodes to zero.
pub fn extract_server_version(server_version: impl AsRef<str>) -> Option<NonZeroI32> {
    let version = server_version
        .as_ref()
        .split_whitespace()
        .next()
        .and_then(|part| part.split('-').next())?;

    let mut components = version.split('.');
    let mut encoded = 0i32;
    for weight in [10000, 100, 1] {
        let component = components
            .next()
            .and_then(|raw| raw.parse::<i32>().ok())
            .unwrap_or(0);
        encoded += component * weight;
    }

    NonZeroI32::new(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_server_version_basic_versions() {
        assert_eq!(extract_server_version("8.0.35"), NonZeroI32::new(80035));
        assert_eq!(extract_server_version("5.7.44"), NonZeroI32::new(50744));
        assert_eq!(extract_server_version("8.2.5"), NonZeroI32::new(80205));
    }

    #[test]
    fn test_extract_server_version_with_suffixes() {
        assert_eq!(extract_server_version("8.0.35-log"), NonZeroI32::new(80035));
        assert_eq!(
            extract_server_version("5.7.44-0ubuntu0.18.04.1"),
            NonZeroI32::new(50744)
        );
    }

    #[test]
    fn test_extract_server_version_invalid_inputs() {
        assert_eq!(extract_server_version(""), None);
        assert_eq!(extract_server_version("invalid"), None);
        assert_eq!(extract_server_version("not.a.version"), None);
    }

    #[test]
    fn test_extract_server_version_zero_versions() {
        assert_eq!(extract_server_version("0.0.0"), None);
    }

    #[test]
    fn test_extract_server_version_partial_versions() {
        assert_eq!(extract_server_version("8.0"), NonZeroI32::new(80000));
        assert_eq!(extract_server_version("  8.0.35  "), NonZeroI32::new(80035));
    }
}
