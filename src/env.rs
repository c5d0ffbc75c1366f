//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。变量名沿用部署脚本中的
//! 既有约定（`GEMINI_API_KEY`、`PERSONALIZATION_TIMEOUT` 等）。

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Environment variable '{}': {}",
            self.variable, self.message
        )
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

fn parse_positive_u64(name: &str, value: &str) -> EnvResult<u64> {
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(EnvError {
            variable: name.to_string(),
            message: format!("Expected a positive integer, got '{}'", value),
        }),
    }
}

/// 个性化相关环境变量定义
pub mod personalization {
    use super::*;

    /// 外部生成式API凭证（缺失时退化为本地兜底转换器）
    pub struct ApiKey;
    impl ApiKey {
        pub const NAME: &'static str = "GEMINI_API_KEY";

        /// 返回非空凭证，未配置或为空白时返回 None
        pub fn get() -> Option<String> {
            env::var(Self::NAME)
                .ok()
                .filter(|value| !value.trim().is_empty())
        }
    }

    /// 单次个性化请求的时间预算（毫秒）
    pub struct TimeoutMs;
    impl EnvVar<u64> for TimeoutMs {
        const NAME: &'static str = "PERSONALIZATION_TIMEOUT";
        const DEFAULT: Option<u64> = Some(5000);
        const DESCRIPTION: &'static str = "Per-request personalization budget in milliseconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_u64(Self::NAME, value)
        }
    }

    /// 缓存条目的存活时间（秒）
    pub struct CacheTtlSecs;
    impl EnvVar<u64> for CacheTtlSecs {
        const NAME: &'static str = "PERSONALIZATION_CACHE_TTL";
        const DEFAULT: Option<u64> = Some(3600);
        const DESCRIPTION: &'static str = "Cache entry time-to-live in seconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_u64(Self::NAME, value)
        }
    }

    /// 缓存最大条目数
    pub struct CacheCapacity;
    impl EnvVar<u64> for CacheCapacity {
        const NAME: &'static str = "PERSONALIZATION_CACHE_SIZE";
        const DEFAULT: Option<u64> = Some(100);
        const DESCRIPTION: &'static str = "Maximum number of cached personalization results";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_u64(Self::NAME, value)
        }
    }

    /// 章节批处理的并发上限
    pub struct ChapterBatchSize;
    impl EnvVar<u64> for ChapterBatchSize {
        const NAME: &'static str = "MAX_CONCURRENT_AI_REQUESTS";
        const DEFAULT: Option<u64> = Some(10);
        const DESCRIPTION: &'static str = "Concurrency cap for chapter batch personalization";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_u64(Self::NAME, value)
        }
    }

    /// 直接内容批处理的并发上限
    pub struct ContentBatchSize;
    impl EnvVar<u64> for ContentBatchSize {
        const NAME: &'static str = "MAX_CONCURRENT_CONTENT_REQUESTS";
        const DEFAULT: Option<u64> = Some(5);
        const DESCRIPTION: &'static str =
            "Concurrency cap for direct-content batch personalization";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_u64(Self::NAME, value)
        }
    }

    /// 文档根目录
    pub struct DocsDir;
    impl DocsDir {
        pub const NAME: &'static str = "BOOKWISE_DOCS_DIR";

        pub fn get() -> String {
            env::var(Self::NAME).unwrap_or_else(|_| "docs".to_string())
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl LogLevel {
        pub const NAME: &'static str = "BOOKWISE_LOG_LEVEL";

        pub fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => match value.to_lowercase().as_str() {
                    "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                    _ => Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: format!(
                            "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                            value
                        ),
                    }),
                },
                Err(_) => Ok("info".to_string()),
            }
        }
    }
}
