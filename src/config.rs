//! Runtime settings for the relay

/// Default contact string sent to the upstream API.
pub const DEFAULT_USER_AGENT: &str =
    "SecureX Threat Response Integrations <tr-integrations-support@cisco.com>";

pub const DEFAULT_API_URL: &str = "https://api.dnsdb.info/";
pub const DEFAULT_UI_SEARCH_URL: &str = "https://scout.dnsdb.info/?seed={query}";

/// Settings shared by every request handler.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the upstream passive-DNS API.
    pub api_url: String,
    /// Search-UI deep-link template with a `{query}` placeholder.
    pub ui_search_url: String,
    pub user_agent: String,
    /// Result limit applied when the caller does not override it.
    pub entities_limit_default: usize,
    /// Hard ceiling for caller-supplied limit overrides.
    pub entities_limit_max: usize,
    /// Whether lookups collapse into a single aggregated sighting by default.
    pub aggregate_default: bool,
    /// Day window sent upstream as a `time_last_after` filter in
    /// aggregation mode.
    pub time_filter_days: i64,
}

impl Settings {
    /// Deep link into the upstream search UI for one observable value.
    pub fn search_url_for(&self, value: &str) -> String {
        self.ui_search_url.replace("{query}", value)
    }

    /// Clamp a caller-supplied limit override to the configured ceiling.
    pub fn clamp_entities_limit(&self, requested: usize) -> usize {
        requested.min(self.entities_limit_max)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ui_search_url: DEFAULT_UI_SEARCH_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            entities_limit_default: 100,
            entities_limit_max: 1000,
            aggregate_default: true,
            time_filter_days: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_substitutes_query() {
        let settings = Settings::default();
        assert_eq!(
            settings.search_url_for("google.com"),
            "https://scout.dnsdb.info/?seed=google.com"
        );
    }

    #[test]
    fn limit_overrides_are_clamped() {
        let settings = Settings::default();
        assert_eq!(settings.clamp_entities_limit(25), 25);
        assert_eq!(settings.clamp_entities_limit(5000), 1000);
    }
}
