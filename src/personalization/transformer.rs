//! 内容转换器模块
//!
//! 定义外部生成式转换的统一接口，并提供两个实现：
//! - [`GeminiTransformer`]: 调用外部生成式API重写章节内容；
//! - [`FallbackTransformer`]: 确定性的本地替代实现，在凭证缺失
//!   或外部服务失败时使用，保证永不失败。

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::personalization::error::{PersonalizationError, PersonalizationResult};
use crate::personalization::profile::ComplexityLevel;

/// 默认的生成式模型
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// 默认的API根地址
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 内容转换器
///
/// 输入原始文本、目标复杂度和称呼，输出重写后的文本。
#[async_trait]
pub trait ContentTransformer: Send + Sync {
    async fn transform(
        &self,
        content: &str,
        level: ComplexityLevel,
        preferred_name: &str,
    ) -> PersonalizationResult<String>;
}

// ============================================================================
// 外部生成式转换器
// ============================================================================

/// 基于外部生成式API的转换器
pub struct GeminiTransformer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiTransformer {
    /// 创建新的转换器
    ///
    /// `request_timeout` 约束单次HTTP请求；编排器的延迟预算由
    /// 竞速路径单独保证，两者互不依赖。
    pub fn new(
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> PersonalizationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                PersonalizationError::ConfigError(format!("创建HTTP客户端失败: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ContentTransformer for GeminiTransformer {
    async fn transform(
        &self,
        content: &str,
        level: ComplexityLevel,
        preferred_name: &str,
    ) -> PersonalizationResult<String> {
        let prompt = build_prompt(content, level, preferred_name);
        let request = GenerateContentRequest::from_prompt(&prompt);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PersonalizationError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("quota") || body.contains("insufficient_quota") {
                return Err(PersonalizationError::RateLimitExceeded);
            }
            return Err(PersonalizationError::TransformerFailure(format!(
                "API返回状态 {}: {}",
                status, body
            )));
        }

        let payload: GenerateContentResponse = response.json().await?;
        match payload.first_text() {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            // 空响应按原文返回，与上游行为一致
            _ => Ok(content.to_string()),
        }
    }
}

/// 按复杂度级别构造重写提示词
fn build_prompt(content: &str, level: ComplexityLevel, preferred_name: &str) -> String {
    let instructions = match level {
        ComplexityLevel::Beginner => format!(
            "Adapt the following content for a beginner audience:\n\
             - Use simple language and basic analogies (e.g., compare code to recipes)\n\
             - Avoid jargon or define it immediately when used\n\
             - Provide short, clear examples\n\
             - Focus on fundamental concepts\n\
             - When appropriate, address the user by their preferred name: {preferred_name}"
        ),
        ComplexityLevel::Intermediate => format!(
            "Adapt the following content for an intermediate audience:\n\
             - Use balanced depth with practical tips\n\
             - Include moderate examples with code snippets\n\
             - Explain common pitfalls and best practices\n\
             - When appropriate, address the user by their preferred name: {preferred_name}"
        ),
        ComplexityLevel::Advanced => format!(
            "Adapt the following content for an advanced audience:\n\
             - Provide detailed explanations and advanced techniques\n\
             - Mention edge cases and performance considerations\n\
             - Use more concise language assuming prior knowledge\n\
             - When appropriate, address the user by their preferred name: {preferred_name}"
        ),
    };

    format!(
        "{instructions}\n\n\
         IMPORTANT: Preserve the exact original structure, including all headings, \
         lists, code blocks, links, emphasis markers and blockquotes. Only modify the \
         explanatory text, examples, and complexity level while keeping all structural \
         elements intact.\n\n\
         Original content:\n{content}"
    )
}

/// generateContent 请求体
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

impl GenerateContentRequest {
    fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

/// generateContent 响应体（只取第一个候选的文本）
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

// ============================================================================
// 本地兜底转换器
// ============================================================================

/// 确定性的本地转换器
///
/// 在内容顶部加入说明级别与称呼的注记；入门级别额外把每个
/// 加粗片段标记为关键概念。不访问网络，永不失败。
pub struct FallbackTransformer {
    bold_span: Regex,
}

impl FallbackTransformer {
    pub fn new() -> Self {
        Self {
            // 非贪婪匹配单个加粗片段
            bold_span: Regex::new(r"\*\*(.+?)\*\*").expect("固定的正则表达式必定合法"),
        }
    }

    /// 同步转换入口，供trait实现和测试复用
    pub fn apply(&self, content: &str, level: ComplexityLevel, preferred_name: &str) -> String {
        let note = format!(
            "> **Personalized for {} level** - This content has been adapted for your skill level as \"{}\".\n\n",
            level, preferred_name
        );

        let body = match level {
            ComplexityLevel::Beginner => self
                .bold_span
                .replace_all(content, "**$1** (*key concept*)")
                .into_owned(),
            ComplexityLevel::Intermediate | ComplexityLevel::Advanced => content.to_string(),
        };

        note + &body
    }
}

impl Default for FallbackTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentTransformer for FallbackTransformer {
    async fn transform(
        &self,
        content: &str,
        level: ComplexityLevel,
        preferred_name: &str,
    ) -> PersonalizationResult<String> {
        Ok(self.apply(content, level, preferred_name))
    }
}
