//! 个性化模块
//!
//! 提供完整的章节个性化功能，采用清晰的模块化架构：
//! - **orchestrator**: 个性化编排器，串联各子系统
//! - **profile**: 用户画像与复杂度解析
//! - **content**: 章节内容读取
//! - **transformer**: 外部生成式转换与本地兜底
//! - **cache**: 结果缓存
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bookwise::personalization::{
//!     FsContentProvider, PersonalizationConfig, PersonalizationOrchestrator,
//!     StaticProfileProvider,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PersonalizationConfig::default();
//! let profiles = Arc::new(StaticProfileProvider::new());
//! let contents = Arc::new(FsContentProvider::new(&config.docs_dir));
//!
//! let orchestrator = PersonalizationOrchestrator::new(&config, profiles, contents)?;
//! let result = orchestrator
//!     .personalize_chapter(Some("user-1"), "intro")
//!     .await?;
//! println!("{}", result.content);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 结果缓存模块 - 有界的滑动过期LRU缓存
pub mod cache;

/// 配置管理模块 - 处理个性化相关的所有配置
pub mod config;

/// 内容读取模块 - 将章节标识解析为原始文本
pub mod content;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 编排器模块 - 个性化流程的核心实现
pub mod orchestrator;

/// 用户画像模块 - 复杂度解析与称呼派生
pub mod profile;

/// 内容转换模块 - 外部生成式转换与本地兜底
pub mod transformer;

// ============================================================================
// 核心API导出
// ============================================================================

/// 编排器的主要组件
///
/// - `PersonalizationOrchestrator`: 主编排器，提供完整的个性化流程
/// - `Personalized`: 单次个性化的结果
/// - `OrchestratorStats`: 编排器统计信息
/// - `CacheReport`: 缓存状态报告
pub use orchestrator::{
    error_placeholder, CacheReport, OrchestratorStats, Personalized, PersonalizationOrchestrator,
    DYNAMIC_CONTENT_ID,
};

/// 配置管理相关组件
pub use config::{constants, ConfigManager, PersonalizationConfig};

/// 错误处理相关类型
pub use error::{ErrorCategory, ErrorSeverity, PersonalizationError, PersonalizationResult};

/// 用户画像与复杂度相关组件
pub use profile::{
    background_to_numeric_level, preferred_name, resolve_complexity, ComplexityLabel,
    ComplexityLevel, PersonalizationSettings, ProfileProvider, StaticProfileProvider, UserProfile,
};

/// 内容读取相关组件
pub use content::{chapter_stem, ContentProvider, FsContentProvider};

/// 内容转换相关组件
pub use transformer::{ContentTransformer, FallbackTransformer, GeminiTransformer};

/// 缓存相关组件
pub use cache::{cache_key, CacheSnapshot, CacheStats, PersonalizationCache};
