//! 个性化模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。除 `Unauthenticated` 外，
//! 所有内容生产类错误都会在编排器内部被吸收并降级为兜底结果。

use thiserror::Error;

/// 个性化错误类型
#[derive(Error, Debug, Clone)]
pub enum PersonalizationError {
    /// 认证错误（唯一向调用方传播的错误）
    #[error("用户 {0} 未通过认证")]
    Unauthenticated(String),

    /// 章节内容未找到
    #[error("无法读取章节文件: {0}")]
    ContentNotFound(String),

    /// 外部转换服务错误
    #[error("转换服务错误: {0}")]
    TransformerFailure(String),

    /// 速率限制错误
    #[error("请求速率过快，已达到配额限制")]
    RateLimitExceeded,

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl PersonalizationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            PersonalizationError::NetworkError(_) => true,
            PersonalizationError::Timeout(_) => true,
            PersonalizationError::TransformerFailure(_) => true,
            PersonalizationError::CacheError(_) => true,
            PersonalizationError::RateLimitExceeded => false, // 需要等待
            PersonalizationError::Unauthenticated(_) => false,
            PersonalizationError::ContentNotFound(_) => false,
            PersonalizationError::ConfigError(_) => false,
            PersonalizationError::InvalidInput(_) => false,
            PersonalizationError::SerializationError(_) => false,
            PersonalizationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PersonalizationError::Unauthenticated(_) => ErrorSeverity::Error,
            PersonalizationError::ContentNotFound(_) => ErrorSeverity::Warning,
            PersonalizationError::TransformerFailure(_) => ErrorSeverity::Warning,
            PersonalizationError::RateLimitExceeded => ErrorSeverity::Warning,
            PersonalizationError::Timeout(_) => ErrorSeverity::Warning,
            PersonalizationError::NetworkError(_) => ErrorSeverity::Warning,
            PersonalizationError::ConfigError(_) => ErrorSeverity::Critical,
            PersonalizationError::CacheError(_) => ErrorSeverity::Warning,
            PersonalizationError::InvalidInput(_) => ErrorSeverity::Info,
            PersonalizationError::SerializationError(_) => ErrorSeverity::Error,
            PersonalizationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            PersonalizationError::Unauthenticated(_) => ErrorCategory::Auth,
            PersonalizationError::ContentNotFound(_) => ErrorCategory::Content,
            PersonalizationError::TransformerFailure(_) => ErrorCategory::Service,
            PersonalizationError::RateLimitExceeded => ErrorCategory::RateLimit,
            PersonalizationError::Timeout(_) => ErrorCategory::Timeout,
            PersonalizationError::NetworkError(_) => ErrorCategory::Network,
            PersonalizationError::ConfigError(_) => ErrorCategory::Configuration,
            PersonalizationError::CacheError(_) => ErrorCategory::Cache,
            PersonalizationError::InvalidInput(_) => ErrorCategory::Input,
            PersonalizationError::SerializationError(_) => ErrorCategory::Serialization,
            PersonalizationError::InternalError(_) => ErrorCategory::Internal,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Auth,
    Content,
    Service,
    RateLimit,
    Timeout,
    Network,
    Configuration,
    Cache,
    Input,
    Serialization,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for PersonalizationError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => {
                PersonalizationError::ContentNotFound(error.to_string())
            }
            _ => PersonalizationError::NetworkError(format!("IO错误: {}", error)),
        }
    }
}

impl From<serde_json::Error> for PersonalizationError {
    fn from(error: serde_json::Error) -> Self {
        PersonalizationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<config::ConfigError> for PersonalizationError {
    fn from(error: config::ConfigError) -> Self {
        PersonalizationError::ConfigError(format!("配置错误: {}", error))
    }
}

impl From<toml::de::Error> for PersonalizationError {
    fn from(error: toml::de::Error) -> Self {
        PersonalizationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<reqwest::Error> for PersonalizationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // 转换服务自身的HTTP超时按网络错误处理，从而触发兜底转换器；
            // "timeout" 标签只由编排器的竞速路径产生
            PersonalizationError::NetworkError(format!("转换服务请求超时: {}", error))
        } else if error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            PersonalizationError::RateLimitExceeded
        } else {
            PersonalizationError::NetworkError(error.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for PersonalizationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        PersonalizationError::Timeout(format!("异步操作超时: {}", error))
    }
}

/// 错误结果类型别名
pub type PersonalizationResult<T> = Result<T, PersonalizationError>;
