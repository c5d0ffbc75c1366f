//! 用户画像与复杂度解析模块
//!
//! 将用户的软件/硬件背景映射为三级内容复杂度，并派生用于
//! 提示词插值的显示名称。背景字符串的数值映射保留了上游的
//! 历史行为：无法识别的文本一律按高级处理。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::personalization::error::{PersonalizationError, PersonalizationResult};

/// 背景字段缺失时使用的占位值
pub const UNKNOWN_BACKGROUND: &str = "Unknown";

/// 匿名或无邮箱用户的默认称呼
pub const DEFAULT_READER_NAME: &str = "Reader";

/// 用户画像
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// 不透明的用户标识
    pub id: String,
    /// 显示名称（可为空）
    pub name: Option<String>,
    /// 邮箱，作为名称派生的兜底来源
    pub email: String,
    /// 软件背景描述（自由文本）
    pub software_background: String,
    /// 硬件背景描述（自由文本）
    pub hardware_background: String,
    /// 其他个性化偏好
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: email.into(),
            software_background: UNKNOWN_BACKGROUND.to_string(),
            hardware_background: UNKNOWN_BACKGROUND.to_string(),
            preferences: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_backgrounds(
        mut self,
        software: impl Into<String>,
        hardware: impl Into<String>,
    ) -> Self {
        self.software_background = software.into();
        self.hardware_background = hardware.into();
        self
    }

    /// 补齐缺失字段（背景为空时回填 "Unknown"）
    pub fn normalized(mut self) -> Self {
        if self.software_background.trim().is_empty() {
            self.software_background = UNKNOWN_BACKGROUND.to_string();
        }
        if self.hardware_background.trim().is_empty() {
            self.hardware_background = UNKNOWN_BACKGROUND.to_string();
        }
        self
    }
}

/// 用户的个性化设置
///
/// `content_complexity` 若能解析为合法的 [`ComplexityLevel`]，
/// 将优先于自动解析结果。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalizationSettings {
    pub content_complexity: Option<String>,
    pub learning_style: Option<String>,
    pub technical_depth_preference: Option<String>,
}

impl PersonalizationSettings {
    /// 解析设置中的复杂度覆盖值，非法值（如历史遗留的 "balanced"）被忽略
    pub fn complexity_override(&self) -> Option<ComplexityLevel> {
        self.content_complexity
            .as_deref()
            .and_then(|value| value.parse().ok())
    }
}

/// 内容复杂度级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComplexityLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Beginner => "beginner",
            ComplexityLevel::Intermediate => "intermediate",
            ComplexityLevel::Advanced => "advanced",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityLevel {
    type Err = PersonalizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(ComplexityLevel::Beginner),
            "intermediate" => Ok(ComplexityLevel::Intermediate),
            "advanced" => Ok(ComplexityLevel::Advanced),
            other => Err(PersonalizationError::InvalidInput(format!(
                "未知的复杂度级别: {}",
                other
            ))),
        }
    }
}

/// 结果标签：真实级别，或描述“为什么没有产出级别内容”的退化标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexityLabel {
    /// 成功的转换，附带使用的级别
    Level(ComplexityLevel),
    /// 个性化被跳过（匿名或无画像）
    Original,
    /// 内容读取或转换失败，返回了原文/占位内容
    Error,
    /// 超出时间预算，返回了原文
    Timeout,
}

impl ComplexityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLabel::Level(level) => level.as_str(),
            ComplexityLabel::Original => "original",
            ComplexityLabel::Error => "error",
            ComplexityLabel::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ComplexityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 将背景字符串映射为数值级别（1=入门，2=中级，3=高级）
///
/// 注意：不含任何关键词的文本会落入 3（高级）分支。这是上游
/// 关键词匹配的既有行为，按原样保留。
pub fn background_to_numeric_level(background: &str) -> u8 {
    let bg = background.to_lowercase();

    if bg.contains("beginner")
        || bg.contains("novice")
        || bg.contains("new")
        || bg == "unknown"
        || bg.trim().is_empty()
    {
        1
    } else if bg.contains("intermediate") || bg.contains("some experience") {
        2
    } else {
        3
    }
}

/// 根据画像中的两个背景字段解析复杂度级别
///
/// 两个级别取平均；阈值 1.5/2.5 使得分歧时偏向更简单的级别
/// （例如 入门+高级 = 平均 2.0 → 中级）。
pub fn resolve_complexity(profile: &UserProfile) -> ComplexityLevel {
    let software = background_to_numeric_level(&profile.software_background);
    let hardware = background_to_numeric_level(&profile.hardware_background);

    let average = f32::from(software + hardware) / 2.0;

    if average <= 1.5 {
        ComplexityLevel::Beginner
    } else if average <= 2.5 {
        ComplexityLevel::Intermediate
    } else {
        ComplexityLevel::Advanced
    }
}

/// 派生用于提示词的显示名称
///
/// 优先使用画像名称；否则取邮箱 `@` 前的部分并将首字母大写；
/// 都不可用时返回 "Reader"。该名称仅用于文案插值，无任何授权意义。
pub fn preferred_name(profile: &UserProfile) -> String {
    if let Some(name) = &profile.name {
        if !name.trim().is_empty() {
            return name.clone();
        }
    }

    if let Some(local) = profile.email.split('@').next() {
        if profile.email.contains('@') && !local.is_empty() {
            let mut chars = local.chars();
            if let Some(first) = chars.next() {
                return first.to_uppercase().collect::<String>() + chars.as_str();
            }
        }
    }

    DEFAULT_READER_NAME.to_string()
}

/// 用户画像提供方
///
/// 认证与画像存储属于外部协作方，这里只约定编排器需要的三个查询。
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// 校验用户是否通过认证
    async fn is_authenticated(&self, user_id: &str) -> PersonalizationResult<bool>;

    /// 获取用户画像，未找到时返回 None
    async fn profile(&self, user_id: &str) -> PersonalizationResult<Option<UserProfile>>;

    /// 获取用户的个性化设置，未配置时返回 None
    async fn settings(&self, user_id: &str)
        -> PersonalizationResult<Option<PersonalizationSettings>>;
}

/// 基于内存表的画像提供方
///
/// 用于演示二进制和测试环境；真实部署中由认证子系统替换。
#[derive(Default)]
pub struct StaticProfileProvider {
    profiles: RwLock<HashMap<String, UserProfile>>,
    settings: RwLock<HashMap<String, PersonalizationSettings>>,
}

impl StaticProfileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.profiles
            .write()
            .expect("profile表锁中毒")
            .insert(profile.id.clone(), profile.normalized());
    }

    pub fn insert_settings(&self, user_id: impl Into<String>, settings: PersonalizationSettings) {
        self.settings
            .write()
            .expect("settings表锁中毒")
            .insert(user_id.into(), settings);
    }
}

#[async_trait]
impl ProfileProvider for StaticProfileProvider {
    async fn is_authenticated(&self, user_id: &str) -> PersonalizationResult<bool> {
        Ok(self
            .profiles
            .read()
            .map_err(|e| PersonalizationError::InternalError(format!("读取画像表失败: {}", e)))?
            .contains_key(user_id))
    }

    async fn profile(&self, user_id: &str) -> PersonalizationResult<Option<UserProfile>> {
        Ok(self
            .profiles
            .read()
            .map_err(|e| PersonalizationError::InternalError(format!("读取画像表失败: {}", e)))?
            .get(user_id)
            .cloned())
    }

    async fn settings(
        &self,
        user_id: &str,
    ) -> PersonalizationResult<Option<PersonalizationSettings>> {
        Ok(self
            .settings
            .read()
            .map_err(|e| PersonalizationError::InternalError(format!("读取设置表失败: {}", e)))?
            .get(user_id)
            .cloned())
    }
}
