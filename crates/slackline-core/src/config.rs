use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use figment::{
    providers::{Env, Format, Json},
    Figment, Provider,
};
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::{mask_token, AppError, ErrorCode, Result};

pub const DEFAULT_LOG_LEVEL: &str = "warn";
/// Project-level config file, looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".slack-mcp.json";
const GLOBAL_CONFIG_DIR: &str = "slack-fast-mcp";
const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Environment variables that override file values, and the config key each feeds.
const ENV_KEYS: [(&str, &str); 4] = [
    ("SLACK_BOT_TOKEN", "token"),
    ("SLACK_DEFAULT_CHANNEL", "default_channel"),
    ("SLACK_DISPLAY_NAME", "display_name"),
    ("SLACK_FAST_MCP_LOG_LEVEL", "log_level"),
];

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env ref regex"));
static LITERAL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^xox[bps]-").expect("valid token regex"));

/// Effective runtime configuration. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub token: String,
    pub default_channel: String,
    pub display_name: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            default_channel: String::new(),
            display_name: String::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// One source's view of the config. Missing keys stay `None`.
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    #[serde(default, deserialize_with = "string_like")]
    token: Option<String>,
    #[serde(default, deserialize_with = "string_like")]
    default_channel: Option<String>,
    #[serde(default, deserialize_with = "string_like")]
    display_name: Option<String>,
    #[serde(default, deserialize_with = "string_like")]
    log_level: Option<String>,
}

impl ConfigLayer {
    fn expanded(self) -> Self {
        let expand = |v: Option<String>| v.map(|s| expand_env_vars(&s));
        Self {
            token: expand(self.token),
            default_channel: expand(self.default_channel),
            display_name: expand(self.display_name),
            log_level: expand(self.log_level),
        }
    }
}

/// Accept any scalar where a string is expected; env values such as `123`
/// arrive as numbers.
fn string_like<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl Config {
    /// Load defaults, the global file, `<project_dir>/.slack-mcp.json`, then
    /// the environment. A broken global file is ignored; a broken project
    /// file is a `config_parse_error`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let global = global_config_path();
        Self::load_layers(global.as_deref(), &project_dir.join(LOCAL_CONFIG_FILE))
    }

    /// Load exactly one file followed by the environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::new(
                ErrorCode::ConfigParseError,
                format!("config file not found: {}", path.display()),
            ));
        }

        let mut config = Config::default();
        let layer = read_file_layer(path).map_err(|e| parse_error(path, e))?;
        config.merge_file(layer, path);
        config.merge(read_env_layer()?);
        Ok(config)
    }

    fn load_layers(global: Option<&Path>, local: &Path) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = global {
            match read_file_layer(path) {
                Ok(layer) => config.merge_file(layer, path),
                Err(e) => debug!(path = %path.display(), error = %e, "ignoring global config"),
            }
        }

        let layer = read_file_layer(local).map_err(|e| parse_error(local, e))?;
        config.merge_file(layer, local);
        config.merge(read_env_layer()?);

        debug!(
            token = %mask_token(&config.token),
            default_channel = %config.default_channel,
            log_level = %config.log_level,
            "config loaded"
        );
        Ok(config)
    }

    /// Apply command-line flags on top of everything else.
    pub fn apply_overrides(&mut self, token: Option<&str>, channel: Option<&str>, verbose: bool) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.token = token.to_string();
        }
        if let Some(channel) = channel.filter(|c| !c.is_empty()) {
            self.default_channel = channel.to_string();
        }
        if verbose {
            self.log_level = "debug".to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(AppError::new(
                ErrorCode::TokenNotConfigured,
                "Slack token is not configured",
            ));
        }
        Ok(())
    }

    /// Explicit channel, else the configured default.
    pub fn resolve_channel(&self, param: &str) -> Result<String> {
        if !param.is_empty() {
            return Ok(param.to_string());
        }
        if !self.default_channel.is_empty() {
            return Ok(self.default_channel.clone());
        }
        Err(AppError::new(
            ErrorCode::NoDefaultChannel,
            "no channel specified and no default_channel configured",
        ))
    }

    /// Explicit display name, else the configured one (possibly empty).
    pub fn resolve_display_name(&self, param: &str) -> String {
        if param.is_empty() {
            self.display_name.clone()
        } else {
            param.to_string()
        }
    }

    fn merge_file(&mut self, layer: ConfigLayer, path: &Path) {
        if let Some(token) = layer.token.as_deref() {
            if LITERAL_TOKEN.is_match(token) && !token.contains("${") {
                warn!(
                    path = %path.display(),
                    token = %mask_token(token),
                    "config file contains a literal token; prefer \"token\": \"${{SLACK_BOT_TOKEN}}\""
                );
            }
        }
        self.merge(layer.expanded());
    }

    fn merge(&mut self, layer: ConfigLayer) {
        let set = |slot: &mut String, value: Option<String>| {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                *slot = v;
            }
        };
        set(&mut self.token, layer.token);
        set(&mut self.default_channel, layer.default_channel);
        set(&mut self.display_name, layer.display_name);
        set(&mut self.log_level, layer.log_level);
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Replace every `${NAME}` with the value of that environment variable,
/// or the empty string when it is unset.
pub fn expand_env_vars(s: &str) -> String {
    expand_with(s, |name| std::env::var(name).ok())
}

pub fn expand_with(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_REF
        .replace_all(s, |caps: &Captures| lookup(&caps[1]).unwrap_or_default())
        .into_owned()
}

fn read_file_layer(path: &Path) -> std::result::Result<ConfigLayer, figment::Error> {
    extract_layer(Json::file(path))
}

fn read_env_layer() -> Result<ConfigLayer> {
    let names: Vec<&str> = ENV_KEYS.iter().map(|(name, _)| *name).collect();
    let env = Env::raw().only(&names).map(|key| {
        ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, field)| *field)
            .unwrap_or("unknown")
            .into()
    });
    extract_layer(env).map_err(|e| {
        AppError::new(
            ErrorCode::ConfigParseError,
            "failed to read configuration from environment",
        )
        .with_source(e)
    })
}

fn extract_layer(provider: impl Provider) -> std::result::Result<ConfigLayer, figment::Error> {
    Figment::from(provider).extract()
}

fn parse_error(path: &Path, err: figment::Error) -> AppError {
    AppError::new(
        ErrorCode::ConfigParseError,
        format!("failed to parse {}", path.display()),
    )
    .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn clear_env(jail: &mut Jail) {
        for (name, _) in ENV_KEYS {
            jail.set_env(name, "");
        }
    }

    fn local(jail: &Jail) -> PathBuf {
        jail.directory().join(LOCAL_CONFIG_FILE)
    }

    #[test]
    fn defaults_when_nothing_configured() {
        Jail::expect_with(|jail| {
            clear_env(jail);
            let config = Config::load_layers(None, &local(jail)).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.log_level, "warn");
            Ok(())
        });
    }

    #[test]
    fn project_file_overrides_global_but_not_with_empties() {
        Jail::expect_with(|jail| {
            clear_env(jail);
            jail.create_file(
                "global.json",
                r#"{"token": "xoxb-global", "default_channel": "general", "display_name": "Bot"}"#,
            )?;
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"{"default_channel": "dev", "display_name": ""}"#,
            )?;

            let global = jail.directory().join("global.json");
            let config = Config::load_layers(Some(&global), &local(jail)).unwrap();
            assert_eq!(config.token, "xoxb-global");
            assert_eq!(config.default_channel, "dev");
            assert_eq!(config.display_name, "Bot");
            Ok(())
        });
    }

    #[test]
    fn environment_wins_over_files() {
        Jail::expect_with(|jail| {
            clear_env(jail);
            jail.create_file(LOCAL_CONFIG_FILE, r#"{"token": "xoxb-file", "log_level": "info"}"#)?;
            jail.set_env("SLACK_BOT_TOKEN", "xoxb-env");
            jail.set_env("SLACK_DEFAULT_CHANNEL", "C0123456789");

            let config = Config::load_layers(None, &local(jail)).unwrap();
            assert_eq!(config.token, "xoxb-env");
            assert_eq!(config.default_channel, "C0123456789");
            assert_eq!(config.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn env_references_in_files_are_expanded() {
        Jail::expect_with(|jail| {
            clear_env(jail);
            jail.set_env("SLACKLINE_TEST_TOKEN", "xoxb-from-ref");
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"{"token": "${SLACKLINE_TEST_TOKEN}", "display_name": "${SLACKLINE_UNSET_NAME}"}"#,
            )?;

            let config = Config::load_layers(None, &local(jail)).unwrap();
            assert_eq!(config.token, "xoxb-from-ref");
            assert_eq!(config.display_name, "");
            Ok(())
        });
    }

    #[test]
    fn broken_project_file_is_a_parse_error() {
        Jail::expect_with(|jail| {
            clear_env(jail);
            jail.create_file(LOCAL_CONFIG_FILE, r#"{"token": "#)?;
            let err = Config::load_layers(None, &local(jail)).unwrap_err();
            assert_eq!(err.code, ErrorCode::ConfigParseError);
            Ok(())
        });
    }

    #[test]
    fn broken_global_file_is_ignored() {
        Jail::expect_with(|jail| {
            clear_env(jail);
            jail.create_file("global.json", "not json")?;
            jail.create_file(LOCAL_CONFIG_FILE, r#"{"token": "xoxb-local"}"#)?;
            let global = jail.directory().join("global.json");
            let config = Config::load_layers(Some(&global), &local(jail)).unwrap();
            assert_eq!(config.token, "xoxb-local");
            Ok(())
        });
    }

    #[test]
    fn explicit_path_must_exist() {
        Jail::expect_with(|jail| {
            clear_env(jail);
            let err = Config::load_from_path(&jail.directory().join("missing.json")).unwrap_err();
            assert_eq!(err.code, ErrorCode::ConfigParseError);

            jail.create_file("custom.json", r#"{"token": "xoxb-custom", "default_channel": "ops"}"#)?;
            let config = Config::load_from_path(&jail.directory().join("custom.json")).unwrap();
            assert_eq!(config.token, "xoxb-custom");
            assert_eq!(config.default_channel, "ops");
            Ok(())
        });
    }

    #[test]
    fn overrides_apply_last() {
        let mut config = Config {
            token: "xoxb-file".into(),
            ..Config::default()
        };
        config.apply_overrides(Some("xoxb-flag"), Some(""), true);
        assert_eq!(config.token, "xoxb-flag");
        assert_eq!(config.default_channel, "");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn validate_requires_token() {
        let err = Config::default().validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenNotConfigured);

        let config = Config {
            token: "xoxb-1".into(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn channel_resolution_order() {
        let mut config = Config::default();
        assert_eq!(
            config.resolve_channel("").unwrap_err().code,
            ErrorCode::NoDefaultChannel
        );
        config.default_channel = "general".into();
        assert_eq!(config.resolve_channel("").unwrap(), "general");
        assert_eq!(config.resolve_channel("dev").unwrap(), "dev");
    }

    #[test]
    fn display_name_resolution() {
        let mut config = Config::default();
        assert_eq!(config.resolve_display_name(""), "");
        config.display_name = "Bot".into();
        assert_eq!(config.resolve_display_name(""), "Bot");
        assert_eq!(config.resolve_display_name("Alice"), "Alice");
    }

    #[test]
    fn expansion_uses_lookup() {
        let lookup = |name: &str| (name == "A").then(|| "1".to_string());
        assert_eq!(expand_with("${A}-${B}", lookup), "1-");
        assert_eq!(expand_with("no refs", lookup), "no refs");
        assert_eq!(expand_with("${lower}", lookup), "${lower}");
    }
}
