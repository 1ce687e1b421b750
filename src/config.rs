use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub redemption: RedemptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// 核销/兑换事件回调地址；缺省时不发通知
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_notifier_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionConfig {
    /// 兑换码初始长度
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// 每个长度档位的生成尝试次数
    #[serde(default = "default_code_attempts")]
    pub code_attempts_per_length: u32,
    /// 碰撞耗尽后允许加宽的字符数
    #[serde(default = "default_code_widening")]
    pub code_max_widening: usize,
    /// 过期清扫间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_notifier_timeout() -> u64 {
    5
}

fn default_code_length() -> usize {
    8
}

fn default_code_attempts() -> u32 {
    5
}

fn default_code_widening() -> usize {
    2
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            code_attempts_per_length: default_code_attempts(),
            code_max_widening: default_code_widening(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => {
                toml::from_str(&config_str)
                    .with_context(|| format!("解析配置文件失败: {config_path}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 无配置文件：使用环境变量与默认值构建
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL").context(
                    "缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml",
                )?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                        allowed_origin: get_env("SERVER_ALLOWED_ORIGIN"),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                    },
                    notifier: NotifierConfig {
                        webhook_url: get_env("NOTIFIER_WEBHOOK_URL"),
                        timeout_secs: get_env_parse("NOTIFIER_TIMEOUT_SECS", 5u64),
                    },
                    redemption: RedemptionConfig {
                        code_length: get_env_parse("REDEMPTION_CODE_LENGTH", 8usize),
                        code_attempts_per_length: get_env_parse("REDEMPTION_CODE_ATTEMPTS", 5u32),
                        code_max_widening: get_env_parse("REDEMPTION_CODE_MAX_WIDENING", 2usize),
                        sweep_interval_secs: get_env_parse("REDEMPTION_SWEEP_INTERVAL", 300u64),
                    },
                }
            }
            Err(e) => {
                anyhow::bail!("无法读取配置文件 {config_path}: {e}");
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("SERVER_ALLOWED_ORIGIN") {
            config.server.allowed_origin = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("NOTIFIER_WEBHOOK_URL") {
            config.notifier.webhook_url = Some(v);
        }
        if let Ok(v) = env::var("NOTIFIER_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.notifier.timeout_secs = n;
        }
        if let Ok(v) = env::var("REDEMPTION_SWEEP_INTERVAL")
            && let Ok(n) = v.parse()
        {
            config.redemption.sweep_interval_secs = n;
        }

        Ok(config)
    }
}
