//! Preflight validation of the source server's replication configuration.

use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::replication::source::SourceConnection;

/// The variable settings row-based replication requires on the source.
///
/// The authentication plugin requirement exists so that plain replica
/// connections succeed; any plugin the client library supports would do.
const REQUIRED_VARIABLES: [(&str, &str); 4] = [
    ("log_bin", "ON"),
    ("binlog_format", "ROW"),
    ("binlog_row_image", "FULL"),
    ("default_authentication_plugin", "mysql_native_password"),
];

/// Verifies the source is configured for row-based replication and returns
/// its version string.
///
/// Fails with [`ErrorKind::IllegalSourceConfig`] listing every missing
/// requirement. Any failure of the underlying queries, transport loss and
/// rejected statements alike, surfaces as
/// [`ErrorKind::SourceConnectionFailed`] per the
/// [`SourceConnection`] contract: the source is unavailable for
/// replication either way.
pub async fn check_source_and_get_version<S>(source: &mut S) -> SyncResult<String>
where
    S: SourceConnection,
{
    let variables = source.replication_variables().await?;
    debug!(?variables, "source replication variables");

    let missing: Vec<String> = REQUIRED_VARIABLES
        .iter()
        .filter(|(name, expected)| {
            !variables.iter().any(|(variable, value)| {
                variable.eq_ignore_ascii_case(name) && value.eq_ignore_ascii_case(expected)
            })
        })
        .map(|(name, expected)| format!("{name}='{expected}'"))
        .collect();

    if !missing.is_empty() {
        bail!(
            ErrorKind::IllegalSourceConfig,
            "source server is not configured for row-based replication; required settings",
            missing.join(", ")
        );
    }

    source.server_version().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::source::ScriptedSourceConnection;

    fn all_variables() -> Vec<(String, String)> {
        REQUIRED_VARIABLES
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_fully_configured_source_passes() {
        let mut source = ScriptedSourceConnection::new()
            .with_variables(all_variables())
            .with_server_version("8.0.35-log");

        let version = check_source_and_get_version(&mut source).await.unwrap();
        assert_eq!(version, "8.0.35-log");
    }

    #[tokio::test]
    async fn test_missing_requirements_are_listed() {
        let variables = vec![
            ("log_bin".to_string(), "ON".to_string()),
            ("binlog_row_image".to_string(), "FULL".to_string()),
        ];
        let mut source = ScriptedSourceConnection::new().with_variables(variables);

        let error = check_source_and_get_version(&mut source).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::IllegalSourceConfig);
        let detail = error.detail().unwrap();
        assert!(detail.contains("binlog_format='ROW'"));
        assert!(
            detail.contains("default_authentication_plugin='mysql_native_password'")
        );
        assert!(!detail.contains("log_bin"));
    }

    #[tokio::test]
    async fn test_variable_comparison_is_case_insensitive() {
        let variables = vec![
            ("log_bin".to_string(), "on".to_string()),
            ("binlog_format".to_string(), "row".to_string()),
            ("binlog_row_image".to_string(), "full".to_string()),
            (
                "default_authentication_plugin".to_string(),
                "MYSQL_NATIVE_PASSWORD".to_string(),
            ),
        ];
        let mut source = ScriptedSourceConnection::new()
            .with_variables(variables)
            .with_server_version("5.7.44");

        assert!(check_source_and_get_version(&mut source).await.is_ok());
    }
}
