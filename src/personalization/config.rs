//! 个性化配置管理模块
//!
//! 提供配置加载、验证和热重载功能，支持多种配置源：
//! 默认值 → TOML配置文件 → 环境变量，后者覆盖前者。

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::env::personalization as env_vars;
use crate::env::EnvVar;
use crate::personalization::error::PersonalizationError;

/// 个性化配置常量
pub mod constants {
    /// 单次个性化请求的默认时间预算（毫秒）
    pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
    /// 缓存默认TTL（秒）
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
    /// 缓存默认容量
    pub const DEFAULT_CACHE_CAPACITY: usize = 100;
    /// 章节批处理默认并发上限
    pub const DEFAULT_CHAPTER_BATCH_SIZE: usize = 10;
    /// 直接内容批处理默认并发上限
    pub const DEFAULT_CONTENT_BATCH_SIZE: usize = 5;
    /// 默认文档根目录
    pub const DEFAULT_DOCS_DIR: &str = "docs";

    pub const CONFIG_PATHS: &[&str] = &[
        "bookwise.toml",
        "config.toml",
        ".bookwise.toml",
        "~/.config/bookwise/config.toml",
        "/etc/bookwise/config.toml",
    ];
}

/// 个性化配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonalizationConfig {
    /// 外部生成式API凭证，None时使用本地兜底转换器
    #[serde(default)]
    pub api_key: Option<String>,

    /// 单次个性化请求的时间预算
    #[serde(with = "duration_ms_serde")]
    pub timeout: Duration,

    /// 缓存配置
    pub cache: CacheConfig,

    /// 批处理配置
    pub batch: BatchConfig,

    /// 文档根目录
    pub docs_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// 最大条目数
    pub capacity: usize,

    /// 条目存活时间
    #[serde(with = "duration_secs_serde")]
    pub ttl: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// 章节批处理并发上限
    pub chapter_batch_size: usize,

    /// 直接内容批处理并发上限
    pub content_batch_size: usize,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout: Duration::from_millis(constants::DEFAULT_TIMEOUT_MS),
            cache: CacheConfig {
                capacity: constants::DEFAULT_CACHE_CAPACITY,
                ttl: Duration::from_secs(constants::DEFAULT_CACHE_TTL_SECS),
            },
            batch: BatchConfig {
                chapter_batch_size: constants::DEFAULT_CHAPTER_BATCH_SIZE,
                content_batch_size: constants::DEFAULT_CONTENT_BATCH_SIZE,
            },
            docs_dir: constants::DEFAULT_DOCS_DIR.to_string(),
        }
    }
}

/// Duration与毫秒整数互转的序列化模块
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Duration与秒整数互转的序列化模块
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: Arc<RwLock<PersonalizationConfig>>,
    last_modified: Arc<RwLock<Option<SystemTime>>>,
    config_path: Option<String>,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> Result<Self, PersonalizationError> {
        let (config, config_path) = Self::load_config()?;

        let manager = Self {
            config: Arc::new(RwLock::new(config)),
            last_modified: Arc::new(RwLock::new(None)),
            config_path,
        };

        manager.update_last_modified()?;

        Ok(manager)
    }

    /// 获取当前配置
    pub fn get_config(&self) -> Result<PersonalizationConfig, PersonalizationError> {
        self.config
            .read()
            .map_err(|e| PersonalizationError::ConfigError(format!("读取配置失败: {}", e)))
            .map(|config| config.clone())
    }

    /// 检查并重新加载配置（如果有更改）
    pub fn reload_if_changed(&self) -> Result<bool, PersonalizationError> {
        if let Some(ref path) = self.config_path {
            let metadata = std::fs::metadata(path).map_err(|e| {
                PersonalizationError::ConfigError(format!("无法读取配置文件元数据: {}", e))
            })?;

            let modified = metadata.modified().map_err(|e| {
                PersonalizationError::ConfigError(format!("无法获取文件修改时间: {}", e))
            })?;

            let last_modified = self
                .last_modified
                .read()
                .map_err(|e| PersonalizationError::ConfigError(format!("读取锁失败: {}", e)))?;

            if last_modified.map_or(true, |last| modified > last) {
                drop(last_modified);

                let (new_config, _) = Self::load_config()?;

                *self.config.write().map_err(|e| {
                    PersonalizationError::ConfigError(format!("写入锁失败: {}", e))
                })? = new_config;

                self.update_last_modified()?;

                tracing::info!("配置文件已重新加载: {}", path);
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// 加载个性化配置
    fn load_config() -> Result<(PersonalizationConfig, Option<String>), PersonalizationError> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        let mut builder = Config::builder();

        // 添加默认配置
        builder = builder.add_source(
            Config::try_from(&PersonalizationConfig::default())
                .map_err(|e| PersonalizationError::ConfigError(format!("默认配置错误: {}", e)))?,
        );

        // 查找并加载配置文件
        let mut config_path = None;
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                builder = builder.add_source(File::with_name(&expanded_path));
                config_path = Some(expanded_path.to_string());
                tracing::info!("加载配置文件: {}", expanded_path);
                break;
            }
        }

        // 添加带前缀的环境变量覆盖（启用类型转换）
        builder = builder.add_source(
            Environment::with_prefix("BOOKWISE")
                .prefix_separator("_")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| PersonalizationError::ConfigError(format!("构建配置失败: {}", e)))?;

        let mut loaded: PersonalizationConfig = config
            .try_deserialize()
            .map_err(|e| PersonalizationError::ConfigError(format!("反序列化配置失败: {}", e)))?;

        // 应用既有约定的环境变量覆盖
        Self::apply_env_overrides(&mut loaded);

        Self::validate_config(&loaded)?;

        tracing::debug!(
            timeout_ms = loaded.timeout.as_millis() as u64,
            cache_capacity = loaded.cache.capacity,
            cache_ttl_secs = loaded.cache.ttl.as_secs(),
            chapter_batch_size = loaded.batch.chapter_batch_size,
            content_batch_size = loaded.batch.content_batch_size,
            docs_dir = %loaded.docs_dir,
            "个性化配置已加载"
        );

        Ok((loaded, config_path))
    }

    /// 手动应用部署脚本约定的环境变量覆盖
    ///
    /// 这些变量名早于TOML配置存在，不带 `BOOKWISE_` 前缀，
    /// 需要在config crate的通用映射之外单独处理。
    fn apply_env_overrides(config: &mut PersonalizationConfig) {
        if let Some(api_key) = env_vars::ApiKey::get() {
            config.api_key = Some(api_key);
        }

        if let Ok(timeout_ms) = env_vars::TimeoutMs::get() {
            if std::env::var(env_vars::TimeoutMs::NAME).is_ok() {
                config.timeout = Duration::from_millis(timeout_ms);
            }
        }

        if let Ok(ttl_secs) = env_vars::CacheTtlSecs::get() {
            if std::env::var(env_vars::CacheTtlSecs::NAME).is_ok() {
                config.cache.ttl = Duration::from_secs(ttl_secs);
            }
        }

        if let Ok(capacity) = env_vars::CacheCapacity::get() {
            if std::env::var(env_vars::CacheCapacity::NAME).is_ok() {
                config.cache.capacity = capacity as usize;
            }
        }

        if let Ok(size) = env_vars::ChapterBatchSize::get() {
            if std::env::var(env_vars::ChapterBatchSize::NAME).is_ok() {
                config.batch.chapter_batch_size = size as usize;
            }
        }

        if let Ok(size) = env_vars::ContentBatchSize::get() {
            if std::env::var(env_vars::ContentBatchSize::NAME).is_ok() {
                config.batch.content_batch_size = size as usize;
            }
        }

        if std::env::var(env_vars::DocsDir::NAME).is_ok() {
            config.docs_dir = env_vars::DocsDir::get();
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [
            ".env.local",       // 本地环境，最高优先级
            ".env.development", // 开发环境
            ".env.production",  // 生产环境
            ".env",             // 默认 .env 文件
        ];

        for env_file in &env_files {
            if Path::new(env_file).exists() {
                match dotenv::from_filename(env_file) {
                    Ok(_) => {
                        tracing::info!("已加载环境变量文件: {}", env_file);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("无法加载环境变量文件 {}: {}", env_file, e);
                    }
                }
            }
        }

        if !env_files.iter().any(|f| Path::new(f).exists()) {
            if let Err(e) = dotenv::dotenv() {
                tracing::debug!("未找到 .env 文件或加载失败: {}", e);
            }
        }
    }

    /// 验证配置
    fn validate_config(config: &PersonalizationConfig) -> Result<(), PersonalizationError> {
        if config.timeout.is_zero() {
            return Err(PersonalizationError::ConfigError(
                "个性化时间预算不能为0".to_string(),
            ));
        }

        if config.cache.capacity == 0 {
            return Err(PersonalizationError::ConfigError(
                "缓存容量不能为0".to_string(),
            ));
        }

        if config.batch.chapter_batch_size == 0 || config.batch.content_batch_size == 0 {
            return Err(PersonalizationError::ConfigError(
                "批处理并发上限不能为0".to_string(),
            ));
        }

        Ok(())
    }

    /// 更新最后修改时间
    fn update_last_modified(&self) -> Result<(), PersonalizationError> {
        if let Some(ref path) = self.config_path {
            let metadata = std::fs::metadata(path).map_err(|e| {
                PersonalizationError::ConfigError(format!("无法读取配置文件元数据: {}", e))
            })?;

            let modified = metadata.modified().map_err(|e| {
                PersonalizationError::ConfigError(format!("无法获取文件修改时间: {}", e))
            })?;

            *self.last_modified.write().map_err(|e| {
                PersonalizationError::ConfigError(format!("写入锁失败: {}", e))
            })? = Some(modified);
        }

        Ok(())
    }
}

/// 加载配置，失败时退回默认值
pub fn load_or_default() -> PersonalizationConfig {
    match ConfigManager::new() {
        Ok(manager) => match manager.get_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("读取配置失败，使用默认配置: {}", e);
                PersonalizationConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("创建配置管理器失败，使用默认配置: {}", e);
            PersonalizationConfig::default()
        }
    }
}

/// 检查配置文件是否存在
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| Path::new(shellexpand::tilde(path).as_ref()).exists())
}
