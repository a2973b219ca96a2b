use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub editor: EditorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and authority of the CMS backend.
    pub base_url: String,
    /// Path every API route is mounted under.
    pub mount_prefix: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Typeahead inputs shorter than this never reach the server.
    pub search_min_length: usize,
    pub search_throttle_ms: u64,
    /// Entity types that may hold children in the content tree.
    pub branch_types: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            editor: EditorConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            mount_prefix: "/".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            search_min_length: 3,
            search_throttle_ms: 300,
            branch_types: vec!["Section".to_string(), "CommemoCollection".to_string()],
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `cms` file and `CMS_*` environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        config = config.add_source(config::File::with_name("cms").required(false));

        // CMS_API__BASE_URL -> api.base_url
        config = config.add_source(
            config::Environment::with_prefix("CMS")
                .separator("__")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        if app_config.editor.search_min_length == 0 {
            anyhow::bail!("editor.search_min_length must be at least 1");
        }

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.editor.search_min_length, 3);
        assert_eq!(config.editor.search_throttle_ms, 300);
        assert_eq!(config.api.mount_prefix, "/");
        assert!(config.editor.branch_types.contains(&"Section".to_string()));
    }

    #[test]
    fn test_defaults_survive_layering() {
        let built = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default()).unwrap())
            .set_override("api.mount_prefix", "/cms")
            .unwrap()
            .build()
            .unwrap();
        let config: AppConfig = built.try_deserialize().unwrap();
        assert_eq!(config.api.mount_prefix, "/cms");
        assert_eq!(config.api.timeout_secs, 30);
    }
}
