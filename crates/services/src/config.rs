use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://progress.sqlite3";
pub const DEFAULT_UPCOMING_WINDOW_DAYS: u32 = 7;

/// Runtime settings for progress tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressConfig {
    pub database_url: String,
    /// Default look-ahead for upcoming deadlines.
    pub upcoming_window_days: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            upcoming_window_days: DEFAULT_UPCOMING_WINDOW_DAYS,
        }
    }
}

impl ProgressConfig {
    /// Read `LEARN_DB_URL` and `LEARN_UPCOMING_WINDOW_DAYS`, falling back to
    /// defaults for missing or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("LEARN_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let upcoming_window_days = lookup("LEARN_UPCOMING_WINDOW_DAYS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_UPCOMING_WINDOW_DAYS);
        Self {
            database_url,
            upcoming_window_days,
        }
    }

    #[must_use]
    pub fn with_database_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = database_url.into();
        self
    }

    #[must_use]
    pub fn with_upcoming_window_days(mut self, days: u32) -> Self {
        self.upcoming_window_days = days;
        self
    }
}
