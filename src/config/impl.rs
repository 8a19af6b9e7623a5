use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Get the global configuration instance
///
/// Falls back to in-memory defaults when `init_config` has not run yet,
/// so library consumers (tests, benches) never panic here.
pub fn get_config() -> Arc<StaticConfig> {
    match CONFIG.get() {
        Some(config) => config.load_full(),
        None => CONFIG
            .get_or_init(|| ArcSwap::from_pointee(StaticConfig::default()))
            .load_full(),
    }
}

/// Initialize the global configuration from the given TOML path
///
/// A missing file is fine: defaults plus `SUPPLYR__*` env vars apply.
pub fn init_config(path: &str) {
    let loaded = StaticConfig::load(path);
    match CONFIG.get() {
        Some(existing) => existing.store(Arc::new(loaded)),
        None => {
            if let Err(rejected) = CONFIG.set(ArcSwap::from_pointee(loaded)) {
                // 并发初始化时另一方已写入，覆盖为本次加载结果
                let loaded = rejected.load_full();
                if let Some(existing) = CONFIG.get() {
                    existing.store(loaded);
                }
            }
        }
    }
}
