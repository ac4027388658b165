use abs_core::relation::{normalize_relation, RelationAliases};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://www.atmoburn.com";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AbsConfig {
    pub database: Option<PathBuf>,
    pub player: Option<String>,
    pub api_base_url: String,
    /// Zero disables the timeout.
    pub fetch_timeout_secs: u64,
    pub offline: bool,
    /// Scanner label → relation letter, on top of the built-in labels.
    pub relation_aliases: BTreeMap<String, String>,
    /// Replaces the built-in NPC faction list when set.
    pub neutral_players: Option<Vec<String>>,
}

impl Default for AbsConfig {
    fn default() -> Self {
        Self {
            database: None,
            player: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            fetch_timeout_secs: 20,
            offline: false,
            relation_aliases: BTreeMap::new(),
            neutral_players: None,
        }
    }
}

impl AbsConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("abs/universe.sqlite3")
        })
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    pub fn relation_aliases(&self) -> RelationAliases {
        let mut aliases = RelationAliases::default();
        for (label, code) in &self.relation_aliases {
            if let Some(relation) = normalize_relation(code, &RelationAliases::empty()) {
                aliases.insert(label.clone(), relation);
            }
        }
        aliases
    }
}

pub fn load_config(path: &Path) -> Result<AbsConfig> {
    if !path.exists() {
        return Ok(AbsConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("failed to parse config {}", path.display()))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var("ABS_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("abs/config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use abs_core::relation::Relation;
    use std::io::Write;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config, AbsConfig::default());
        assert_eq!(config.fetch_timeout(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn parses_partial_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
player = "Ann"
database = "/tmp/abs.sqlite3"
fetch_timeout_secs = 0
neutral_players = ["Civil Goverment"]

[relation_aliases]
"Allied" = "f"
"War" = "e"
"#
        )
        .expect("write config");

        let config = load_config(file.path()).expect("load");
        assert_eq!(config.player.as_deref(), Some("Ann"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/abs.sqlite3"));
        assert_eq!(config.fetch_timeout(), None);

        let aliases = config.relation_aliases();
        assert_eq!(aliases.get("Allied"), Some(Relation::Friend));
        assert_eq!(aliases.get("War"), Some(Relation::Enemy));
        assert_eq!(aliases.get("Peace"), Some(Relation::Neutral));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "offline = \"sometimes\"").expect("write config");
        assert!(load_config(file.path()).is_err());
    }
}
