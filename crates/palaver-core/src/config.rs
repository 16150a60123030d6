//! Configuration management for palaver.
//!
//! Loads configuration from ${PALAVER_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How a freshly created topic gets its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TitlePolicy {
    /// First characters of the first message, ellipsis when cut.
    #[default]
    Truncate,
    /// Ask the title model for a short label after the first answer.
    Generated,
}

impl TitlePolicy {
    pub fn display_name(&self) -> &'static str {
        match self {
            TitlePolicy::Truncate => "truncate",
            TitlePolicy::Generated => "generated",
        }
    }
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// This ensures new comments/sections from the template are always present,
/// while preserving user's customized values.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for palaver configuration and data directories.
    //!
    //! PALAVER_HOME resolution order:
    //! 1. PALAVER_HOME environment variable (if set)
    //! 2. ~/.config/palaver (default)

    use std::path::PathBuf;

    /// Returns the palaver home directory.
    pub fn palaver_home() -> PathBuf {
        if let Ok(home) = std::env::var("PALAVER_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("palaver"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        palaver_home().join("config.toml")
    }

    /// Returns the directory for diagnostic logs.
    pub fn logs_dir() -> PathBuf {
        palaver_home().join("logs")
    }
}

/// Gemini provider configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeminiProviderConfig {
    /// Optional API key (overrides environment variable).
    pub api_key: Option<String>,
    /// Optional API base URL (for proxies).
    pub base_url: Option<String>,
}

impl GeminiProviderConfig {
    /// Returns the effective API key if set and non-empty.
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the effective base URL if set and non-empty.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: GeminiProviderConfig,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model used for answers
    pub model: String,

    /// Model used by the topic title summarizer
    pub title_model: String,

    /// Topic title policy
    pub title_policy: TitlePolicy,

    /// Maximum tokens for responses (optional)
    pub max_output_tokens: Option<u32>,

    /// Longest accepted submission, in characters
    pub max_input_chars: usize,

    /// Persist an interactively captured API key back to the config file
    pub remember_api_key: bool,

    /// Provider configuration (API keys, base URLs).
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Config {
    const DEFAULT_MODEL: &str = "gemini-2.0-flash";
    const DEFAULT_TITLE_MODEL: &str = "gemini-1.5-flash";
    const DEFAULT_MAX_INPUT_CHARS: usize = 1000;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves only the Gemini API key to the config file.
    ///
    /// Creates the file if it doesn't exist.
    /// Preserves existing fields and comments using toml_edit.
    pub fn save_api_key(key: &str) -> Result<()> {
        Self::save_api_key_to(&paths::config_path(), key)
    }

    /// Saves only the Gemini API key to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    pub fn save_api_key_to(path: &Path, key: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["providers"]["gemini"]["api_key"] = value(key);

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            title_model: Self::DEFAULT_TITLE_MODEL.to_string(),
            title_policy: TitlePolicy::default(),
            max_output_tokens: None,
            max_input_chars: Self::DEFAULT_MAX_INPUT_CHARS,
            remember_api_key: false,
            providers: ProvidersConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    /// Config loading: missing file returns defaults.
    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.title_model, "gemini-1.5-flash");
        assert_eq!(config.title_policy, TitlePolicy::Truncate);
        assert_eq!(config.max_input_chars, 1000);
        assert!(!config.remember_api_key);
    }

    /// Config loading: partial config merges with defaults.
    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "model = \"gemini-2.5-pro\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.title_model, "gemini-1.5-flash");
        assert_eq!(config.max_output_tokens, None);
    }

    /// Config loading: title policy parses from its lowercase name.
    #[test]
    fn test_load_title_policy_generated() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "title_policy = \"generated\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.title_policy, TitlePolicy::Generated);
        assert_eq!(config.title_policy.display_name(), "generated");
    }

    /// Config init: creates file with defaults, creates parent dirs.
    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        assert!(config_path.exists());
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("gemini-2.0-flash"));
        assert!(contents.contains("# max_output_tokens ="));

        // The template must round-trip through the loader.
        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
    }

    /// Config init: fails if file exists (no silent overwrite).
    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        let result = Config::init(&config_path);
        assert!(result.is_err());
    }

    /// save_api_key: creates new config file with template if it doesn't exist.
    #[test]
    fn test_save_api_key_creates_file_with_template() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        Config::save_api_key_to(&config_path, "test-key-123").unwrap();

        assert!(config_path.exists());

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(
            config.providers.gemini.effective_api_key(),
            Some("test-key-123")
        );

        // Template comments are preserved.
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# Palaver Configuration"));
    }

    /// save_api_key: preserves other fields in existing config.
    #[test]
    fn test_save_api_key_preserves_other_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"model = "gemini-2.5-pro"
max_input_chars = 500
"#,
        )
        .unwrap();

        Config::save_api_key_to(&config_path, "another-key").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(
            config.providers.gemini.effective_api_key(),
            Some("another-key")
        );
        assert_eq!(config.model, "gemini-2.5-pro"); // preserved
        assert_eq!(config.max_input_chars, 500); // preserved
    }

    /// Base URL: loaded from config file.
    #[test]
    fn test_gemini_base_url_loaded_from_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "[providers.gemini]\nbase_url = \"https://my-proxy.example.com\"\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(
            config.providers.gemini.effective_base_url(),
            Some("https://my-proxy.example.com")
        );
    }

    /// Base URL: empty/whitespace treated as unset.
    #[test]
    fn test_gemini_base_url_empty_is_none() {
        let config = Config {
            providers: ProvidersConfig {
                gemini: GeminiProviderConfig {
                    base_url: Some("   ".to_string()),
                    ..Default::default()
                },
            },
            ..Default::default()
        };
        assert_eq!(config.providers.gemini.effective_base_url(), None);
    }
}
