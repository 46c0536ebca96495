use crate::application::grid_engine::GridViewport;
use crate::application::persistence_gateway::PersistenceSettings;
use crate::domain::document::Breakpoint;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub persistence: PersistenceConfig,
    pub grid: GridSettings,
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding one `<name>.json` file per document
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    pub debounce_ms: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_attempts: 4,
            backoff_ms: 200,
        }
    }
}

impl PersistenceConfig {
    pub fn settings(&self) -> PersistenceSettings {
        PersistenceSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GridSettings {
    pub max_rows: Option<u32>,
    pub columns: ColumnSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ColumnSettings {
    pub small: u32,
    pub medium: u32,
    pub large: u32,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            small: 3,
            medium: 6,
            large: 12,
        }
    }
}

impl GridSettings {
    pub fn viewport(&self, breakpoint: Breakpoint) -> GridViewport {
        let columns = match breakpoint {
            Breakpoint::Small => self.columns.small,
            Breakpoint::Medium => self.columns.medium,
            Breakpoint::Large => self.columns.large,
        };
        GridViewport {
            breakpoint,
            columns,
            max_rows: self.max_rows,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardSettings {
    /// Document loaded at startup
    pub default_config: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            default_config: "default".to_string(),
        }
    }
}

/// `config/dashboard.{toml,json,...}` if present, then `DASHBOARD__SECTION__KEY` overrides
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_empty_source_gives_defaults() {
        let config = parse("");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.bind_addr.port(), 8080);
        assert_eq!(config.persistence.settings(), PersistenceSettings::default());
        assert_eq!(config.dashboard.default_config, "default");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = parse(
            r#"
            [persistence]
            debounce_ms = 50

            [grid]
            max_rows = 8

            [grid.columns]
            large = 10
            "#,
        );

        assert_eq!(config.persistence.debounce_ms, 50);
        assert_eq!(config.persistence.max_attempts, 4);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));

        let viewport = config.grid.viewport(Breakpoint::Large);
        assert_eq!(viewport.columns, 10);
        assert_eq!(viewport.max_rows, Some(8));
        assert_eq!(config.grid.viewport(Breakpoint::Small).columns, 3);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let config = PersistenceConfig {
            max_attempts: 0,
            ..PersistenceConfig::default()
        };
        assert_eq!(config.settings().max_attempts, 1);
    }
}
