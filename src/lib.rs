//! # Bookwise Library
//!
//! 将书籍章节按读者的技能水平重写的个性化工具库。
//!
//! ## 模块组织
//!
//! - `personalization` - 个性化编排、画像解析、内容转换与缓存
//! - `env` - 环境变量管理

pub mod env;
pub mod personalization;

// Re-export commonly used items for convenience
pub use personalization::{
    ComplexityLabel, ComplexityLevel, Personalized, PersonalizationConfig, PersonalizationError,
    PersonalizationOrchestrator, PersonalizationResult,
};
