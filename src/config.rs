//! Runtime configuration, read from the environment

use std::env;

pub const DEFAULT_ORG_WALLET_KEY: &str = "organization";
pub const DEFAULT_SENDER_EMAIL: &str = "no-reply@cvconnect.app";
pub const DEFAULT_SENDER_NAME: &str = "CVConnect NoReply";

/// Settings for the reconciliation engine and its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Key the organization wallet singleton is stored under
    pub organization_wallet_key: String,
    pub sender_email: String,
    pub sender_name: String,
    /// Retries of a statement update after a version conflict
    pub max_conflict_retries: u32,
    pub notifications_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            organization_wallet_key: DEFAULT_ORG_WALLET_KEY.to_string(),
            sender_email: DEFAULT_SENDER_EMAIL.to_string(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            max_conflict_retries: 3,
            notifications_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Build the configuration from `CVCONNECT_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source, falling back to the
    /// defaults for missing or unparsable values
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source(lookup);
        let defaults = Self::default();
        Self {
            organization_wallet_key: source.or(
                "CVCONNECT_ORG_WALLET_KEY",
                &defaults.organization_wallet_key,
            ),
            sender_email: source.or("CVCONNECT_SENDER_EMAIL", &defaults.sender_email),
            sender_name: source.or("CVCONNECT_SENDER_NAME", &defaults.sender_name),
            max_conflict_retries: source.parse_or(
                "CVCONNECT_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            ),
            notifications_enabled: source.parse_bool_or(
                "CVCONNECT_NOTIFICATIONS_ENABLED",
                defaults.notifications_enabled,
            ),
        }
    }
}

struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + Copy,
    {
        self.opt(key)
            .and_then(|raw| raw.parse::<T>().ok())
            .unwrap_or(default)
    }

    fn parse_bool_or(&self, key: &str, default: bool) -> bool {
        parse_bool(self.opt(key).as_deref()).unwrap_or(default)
    }
}

fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => Some(true),
        Some("0" | "false" | "no" | "off") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.organization_wallet_key, "organization");
        assert_eq!(config.sender_email, "no-reply@cvconnect.app");
        assert_eq!(config.max_conflict_retries, 3);
        assert!(config.notifications_enabled);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(Some("YES")), Some(true));
        assert_eq!(parse_bool(Some("off")), Some(false));
        assert_eq!(parse_bool(Some("maybe")), None);
        assert_eq!(parse_bool(None), None);
    }

    #[test]
    fn test_lookup_overrides_and_fallbacks() {
        let values: HashMap<&str, &str> = HashMap::from([
            ("CVCONNECT_CONFLICT_RETRIES", "7"),
            ("CVCONNECT_ORG_WALLET_KEY", "  hoa-main  "),
            ("CVCONNECT_SENDER_NAME", "   "),
            ("CVCONNECT_NOTIFICATIONS_ENABLED", "off"),
        ]);
        let config = EngineConfig::from_lookup(|key| values.get(key).map(|v| v.to_string()));

        assert_eq!(config.max_conflict_retries, 7);
        assert_eq!(config.organization_wallet_key, "hoa-main");
        assert_eq!(config.sender_name, DEFAULT_SENDER_NAME);
        assert_eq!(config.sender_email, DEFAULT_SENDER_EMAIL);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn test_unparsable_retries_fall_back() {
        let config = EngineConfig::from_lookup(|key| {
            (key == "CVCONNECT_CONFLICT_RETRIES").then(|| "many".to_string())
        });
        assert_eq!(config.max_conflict_retries, 3);
    }
}
