//! warden-config - 配置加载库
//!
//! 加载顺序：`{dir}/default.toml` → `{dir}/{APP_ENV}.toml` → `WARDEN_` 前缀环境变量，
//! 嵌套键用双下划线分隔，例如 `WARDEN_TELEMETRY__LOG_LEVEL=debug`。

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use secrecy::Secret;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "WARDEN_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 启动时先回滚全部迁移再重新应用
    #[serde(default)]
    pub reset_on_start: bool,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
    /// 安装 Prometheus recorder
    #[serde(default)]
    pub metrics: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            metrics: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    /// 未配置时使用内存存储
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_name() -> String {
    "warden".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

/// 构建配置源
pub fn figment(config_dir: &str) -> Figment {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

    Figment::new()
        .merge(Toml::file(format!("{}/default.toml", config_dir)))
        .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// 按任意结构提取配置（服务可在 `AppConfig` 之上扩展自己的配置段）
pub fn load<T: DeserializeOwned>(config_dir: &str) -> Result<T, ConfigError> {
    Ok(figment(config_dir).extract()?)
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        load(config_dir)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}
