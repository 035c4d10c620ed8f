//! 配置文件加载（TOML）
use std::path::Path;

use crate::error::ConfigError;
use crate::options::IndexOptions;

/// 从 TOML 文件加载索引选项，缺省字段取默认值
///
/// ```toml
/// min_string_length = 6
/// window_size = 1048576
/// threads = 4
/// ```
pub fn load_options(path: &Path) -> Result<IndexOptions, ConfigError> {
    let txt = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let opts: IndexOptions = toml::from_str(&txt).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    validate(&opts)?;
    Ok(opts)
}

pub(crate) fn validate(opts: &IndexOptions) -> Result<(), ConfigError> {
    if opts.min_string_length == 0 {
        return Err(ConfigError::Invalid { field: "min_string_length", reason: "must be at least 1".into() });
    }
    if opts.window_size == 0 {
        return Err(ConfigError::Invalid { field: "window_size", reason: "must be at least 1".into() });
    }
    if opts.threads == Some(0) {
        return Err(ConfigError::Invalid { field: "threads", reason: "must be at least 1 (omit for auto)".into() });
    }
    Ok(())
}
