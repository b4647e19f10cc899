use serde::{Deserialize, Serialize};

/// Configuration for the users module (`modules.users` in the app config).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsersConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    /// Cap for the plain (unpaginated) list.
    #[serde(default = "default_max_list_size")]
    pub max_list_size: u64,
    #[serde(default = "default_limit")]
    pub cursor_default_limit: u64,
    #[serde(default = "default_max_limit")]
    pub cursor_max_limit: u64,
    #[serde(default = "default_limit")]
    pub search_default_limit: u64,
    #[serde(default = "default_max_limit")]
    pub search_max_limit: u64,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_max_bulk_size")]
    pub max_bulk_size: usize,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_list_size: default_max_list_size(),
            cursor_default_limit: default_limit(),
            cursor_max_limit: default_max_limit(),
            search_default_limit: default_limit(),
            search_max_limit: default_max_limit(),
            max_name_length: default_max_name_length(),
            max_bulk_size: default_max_bulk_size(),
        }
    }
}

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    100
}

fn default_max_list_size() -> u64 {
    1000
}

fn default_limit() -> u64 {
    20
}

fn default_max_limit() -> u64 {
    100
}

fn default_max_name_length() -> usize {
    100
}

fn default_max_bulk_size() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_keeps_defaults() {
        let cfg: UsersConfig =
            serde_json::from_value(serde_json::json!({ "max_page_size": 50 })).unwrap();
        assert_eq!(cfg.max_page_size, 50);
        assert_eq!(cfg.default_page_size, 20);
        assert_eq!(cfg.max_list_size, 1000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<UsersConfig, _> =
            serde_json::from_value(serde_json::json!({ "page_sise": 5 }));
        assert!(res.is_err());
    }
}
