use std::time::Duration;

/// Configuration for [`Session`](crate::session::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Read whole result sets on execution (restartable cursors). When off,
    /// statements stream rows and hold the connection until released.
    pub buffered: bool,
    /// Statements slower than this are logged at WARN.
    pub slow_query_threshold: Option<Duration>,
    /// Whether to log executed statements at DEBUG.
    pub log_sql: bool,
    /// Truncate logged SQL to this many bytes (None: no truncation).
    pub max_sql_log_length: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffered: true,
            slow_query_threshold: None,
            log_sql: true,
            max_sql_log_length: Some(200),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default result mode of prepared statements.
    pub fn buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    /// Set the slow query threshold.
    pub fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Enable or disable statement logging.
    pub fn log_sql(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    /// Set the maximum logged SQL length in bytes.
    pub fn max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_log_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_log_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.buffered);
        assert!(config.log_sql);
        assert_eq!(config.max_sql_log_length, Some(200));
        assert!(config.slow_query_threshold.is_none());
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let config = SessionConfig::new().max_sql_log_length(8);
        assert_eq!(config.truncate_sql("SELECT 1"), "SELECT 1");
        assert_eq!(config.truncate_sql("SELECT 'ééé'"), "SELECT '...");
        assert_eq!(
            SessionConfig::new().no_truncate().truncate_sql("SELECT 'ééé'"),
            "SELECT 'ééé'"
        );
    }
}
