use serde::{Deserialize, Serialize};

/// Cookie SameSite 策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - server: 监听地址、worker 数量、可信代理
/// - database: 数据库连接与重试
/// - logging: 日志输出
/// - geoip: 国家解析
/// - ad_server: 投放与 cookie 行为
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub ad_server: AdServerConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > TOML 文件 > 默认值
    /// ENV 前缀：SUPPLYR，分隔符：__
    /// 示例：SUPPLYR__SERVER__PORT=9000
    pub fn load(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SUPPLYR")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.trusted_proxies")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> crate::errors::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::errors::SupplyrError::serialization(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 可信反向代理（IP 或 CIDR）。为空时无条件信任转发头
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    /// 单次存储调用超时（毫秒），超时视为存储不可达
    #[serde(default = "default_database_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// GeoIP 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    #[serde(default = "default_geoip_enabled")]
    pub enabled: bool,
    /// MaxMindDB 文件路径 (GeoLite2-Country.mmdb / GeoLite2-City.mmdb)
    /// 配置且可读时使用本地解析；否则回退到外部 API
    #[serde(default)]
    pub maxminddb_path: Option<String>,
    /// 外部 API URL，`{ip}` 为占位符
    #[serde(default = "default_geoip_api_url")]
    pub api_url: String,
    #[serde(default = "default_geoip_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

/// 投放配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdServerConfig {
    /// `/server-tag` 未指定 size 时使用
    #[serde(default = "default_ad_size")]
    pub default_size: String,
    #[serde(default = "default_cookie_max_age_days")]
    pub cookie_max_age_days: i64,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default)]
    pub cookie_same_site: SameSitePolicy,
    #[serde(default)]
    pub cookie_domain: Option<String>,
    /// 首次见到外部 ID 时在 server-tag 中附带的同步像素地址
    #[serde(default = "default_sync_pixel_url")]
    pub sync_pixel_url: String,
    /// 是否写入逐条曝光日志
    #[serde(default)]
    pub enable_impression_log: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "supplyr.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout_ms() -> u64 {
    3000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_geoip_enabled() -> bool {
    true
}

fn default_geoip_api_url() -> String {
    "http://ip-api.com/json/{ip}?fields=countryCode".to_string()
}

fn default_geoip_lookup_timeout_ms() -> u64 {
    2000
}

fn default_ad_size() -> String {
    "300x250".to_string()
}

fn default_cookie_max_age_days() -> i64 {
    365
}

fn default_sync_pixel_url() -> String {
    "/sync-ids".to_string()
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout_ms: default_database_timeout_ms(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            enabled: default_geoip_enabled(),
            maxminddb_path: None,
            api_url: default_geoip_api_url(),
            lookup_timeout_ms: default_geoip_lookup_timeout_ms(),
        }
    }
}

impl Default for AdServerConfig {
    fn default() -> Self {
        Self {
            default_size: default_ad_size(),
            cookie_max_age_days: default_cookie_max_age_days(),
            cookie_secure: false,
            cookie_same_site: SameSitePolicy::default(),
            cookie_domain: None,
            sync_pixel_url: default_sync_pixel_url(),
            enable_impression_log: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_round_trips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[ad_server]"));
        assert!(sample.contains("default_size = \"300x250\""));

        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.ad_server.cookie_max_age_days, 365);
        assert_eq!(parsed.database.timeout_ms, 3000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            trusted_proxies = ["10.0.0.0/8"]

            [ad_server]
            cookie_same_site = "None"
            cookie_secure = true
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.server.trusted_proxies, vec!["10.0.0.0/8"]);
        assert_eq!(parsed.ad_server.cookie_same_site, SameSitePolicy::None);
        assert!(parsed.ad_server.cookie_secure);
        assert!(parsed.geoip.enabled);
    }

    #[test]
    fn test_unknown_same_site_is_rejected() {
        let parsed = toml::from_str::<StaticConfig>(
            r#"
            [ad_server]
            cookie_same_site = "Sometimes"
            "#,
        );
        assert!(parsed.is_err());
    }
}
