//! 个性化编排器
//!
//! 串联画像解析、内容读取、外部转换、缓存与多级兜底的核心模块。
//! 错误吸收策略：除认证失败外，任何内容生产环节的失败都在这里
//! 降级为可用的结果（原文、兜底转换或占位文案），绝不向调用方
//! 抛出。
//!
//! 延迟预算通过竞速实现：转换任务与定时器并发推进，定时器先
//! 完成时立即返回原文，已发起的转换任务不被取消，其结果被丢弃。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;

use crate::personalization::cache::{cache_key, CacheSnapshot, CacheStats, PersonalizationCache};
use crate::personalization::config::PersonalizationConfig;
use crate::personalization::content::{chapter_stem, ContentProvider};
use crate::personalization::error::{PersonalizationError, PersonalizationResult};
use crate::personalization::profile::{
    preferred_name, resolve_complexity, ComplexityLabel, ComplexityLevel, ProfileProvider,
    UserProfile,
};
use crate::personalization::transformer::{
    ContentTransformer, FallbackTransformer, GeminiTransformer,
};

/// 直接内容个性化缺省的结果标识
pub const DYNAMIC_CONTENT_ID: &str = "dynamic-content";

/// 外部转换服务的HTTP客户端超时（秒）
///
/// 与编排器的延迟预算无关：预算到期时竞速路径已经返回原文，
/// 这里只防止落败的转换任务无限期占用连接。
const TRANSFORMER_HTTP_TIMEOUT_SECS: u64 = 30;

/// 个性化结果
#[derive(Debug, Clone)]
pub struct Personalized {
    /// 结果对应的章节标识或文件名
    pub filename: String,
    /// 最终返回给读者的文本
    pub content: String,
    /// 结果标签（真实级别或退化原因）
    pub complexity: ComplexityLabel,
    /// 内容是否经过转换（外部服务或本地兜底）
    pub transformation_applied: bool,
}

/// 编排器统计信息
#[derive(Debug, Default, Clone)]
pub struct OrchestratorStats {
    pub total_requests: u64,
    pub transformed: u64,
    pub fallback_used: u64,
    pub timeouts: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl OrchestratorStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 缓存状态报告
#[derive(Debug, Clone)]
pub struct CacheReport {
    pub stats: CacheStats,
    pub snapshot: CacheSnapshot,
}

/// 单次转换尝试的结果
enum TransformOutcome {
    /// 在预算内产出了转换后的文本
    Transformed(String),
    /// 预算到期，转换任务被放弃
    TimedOut,
}

/// 个性化编排器
pub struct PersonalizationOrchestrator {
    profiles: Arc<dyn ProfileProvider>,
    contents: Arc<dyn ContentProvider>,
    primary: Option<Arc<dyn ContentTransformer>>,
    fallback: Arc<FallbackTransformer>,
    cache: Arc<PersonalizationCache>,
    timeout: Duration,
    chapter_batch_size: usize,
    content_batch_size: usize,
    stats: Mutex<OrchestratorStats>,
}

impl PersonalizationOrchestrator {
    /// 根据配置创建编排器
    ///
    /// 配置中有API凭证时使用外部转换服务，否则所有转换都走本地
    /// 兜底实现。
    pub fn new(
        config: &PersonalizationConfig,
        profiles: Arc<dyn ProfileProvider>,
        contents: Arc<dyn ContentProvider>,
    ) -> PersonalizationResult<Self> {
        let primary: Option<Arc<dyn ContentTransformer>> = match &config.api_key {
            Some(api_key) => {
                let transformer = GeminiTransformer::new(
                    api_key.clone(),
                    Duration::from_secs(TRANSFORMER_HTTP_TIMEOUT_SECS),
                )?;
                Some(Arc::new(transformer))
            }
            None => {
                tracing::info!("未配置API凭证，个性化将使用本地兜底转换器");
                None
            }
        };

        Ok(Self::with_transformer(config, profiles, contents, primary))
    }

    /// 使用指定的主转换器创建编排器（测试注入点）
    pub fn with_transformer(
        config: &PersonalizationConfig,
        profiles: Arc<dyn ProfileProvider>,
        contents: Arc<dyn ContentProvider>,
        primary: Option<Arc<dyn ContentTransformer>>,
    ) -> Self {
        Self {
            profiles,
            contents,
            primary,
            fallback: Arc::new(FallbackTransformer::new()),
            cache: Arc::new(PersonalizationCache::new(
                config.cache.capacity,
                config.cache.ttl,
            )),
            timeout: config.timeout,
            chapter_batch_size: config.batch.chapter_batch_size.max(1),
            content_batch_size: config.batch.content_batch_size.max(1),
            stats: Mutex::new(OrchestratorStats::default()),
        }
    }

    // ========================================================================
    // 公开操作
    // ========================================================================

    /// 个性化单个章节
    ///
    /// `user_id` 为 None 时视为匿名访问，直接返回原文。认证失败是
    /// 唯一向调用方传播的错误。
    pub async fn personalize_chapter(
        &self,
        user_id: Option<&str>,
        chapter_id: &str,
    ) -> PersonalizationResult<Personalized> {
        self.bump(|stats| stats.total_requests += 1);

        let Some(user_id) = user_id else {
            return Ok(self.read_as_original(chapter_id).await);
        };

        let (profile, level) = match self.resolve_user(user_id).await? {
            Some(resolved) => resolved,
            None => {
                // 已认证但画像缺失，按原文返回
                self.bump(|stats| stats.skipped += 1);
                return Ok(self.read_as_original(chapter_id).await);
            }
        };

        let key = cache_key(user_id, chapter_id, level);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(user_id, chapter_id, level = %level, "缓存命中");
            return Ok(cached);
        }

        let content = match self.contents.read(chapter_id).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(user_id, chapter_id, error = %e, "章节读取失败，返回占位内容");
                self.bump(|stats| stats.errors += 1);
                return Ok(Personalized {
                    filename: chapter_id.to_string(),
                    content: error_placeholder(chapter_id),
                    complexity: ComplexityLabel::Error,
                    transformation_applied: false,
                });
            }
        };

        let result = self
            .transform_within_budget(chapter_id, &content, level, &profile)
            .await;

        if result.transformation_applied {
            self.cache.insert(key, result.clone());
        }

        Ok(result)
    }

    /// 个性化一段给定的文本（不经过内容提供方）
    ///
    /// 动态内容不参与缓存：调用方传入的文本没有稳定身份，相同
    /// 文件名下的内容可能每次都不同。`filename` 仅用于结果标识，
    /// 为空时使用固定标识。
    pub async fn personalize_content(
        &self,
        user_id: Option<&str>,
        filename: &str,
        content: &str,
    ) -> PersonalizationResult<Personalized> {
        self.bump(|stats| stats.total_requests += 1);

        let filename = if filename.trim().is_empty() {
            DYNAMIC_CONTENT_ID
        } else {
            filename
        };

        let Some(user_id) = user_id else {
            self.bump(|stats| stats.skipped += 1);
            return Ok(Personalized {
                filename: filename.to_string(),
                content: content.to_string(),
                complexity: ComplexityLabel::Original,
                transformation_applied: false,
            });
        };

        let (profile, level) = match self.resolve_user(user_id).await? {
            Some(resolved) => resolved,
            None => {
                self.bump(|stats| stats.skipped += 1);
                return Ok(Personalized {
                    filename: filename.to_string(),
                    content: content.to_string(),
                    complexity: ComplexityLabel::Original,
                    transformation_applied: false,
                });
            }
        };

        Ok(self
            .transform_within_budget(filename, content, level, &profile)
            .await)
    }

    /// 批量个性化多个章节
    ///
    /// 认证用户按并发上限分块执行，块内并发、块间串行；匿名访问
    /// 没有外部调用，逐个顺序读取即可。结果顺序与输入一致。批量
    /// 路径中单项的任何错误（包括认证失败）都降级为该章节的原文
    /// 或占位内容，批次本身不会失败。
    pub async fn personalize_multiple_chapters(
        &self,
        user_id: Option<&str>,
        chapter_ids: &[&str],
    ) -> PersonalizationResult<Vec<Personalized>> {
        let mut results = Vec::with_capacity(chapter_ids.len());

        if user_id.is_none() {
            // 匿名路径不会出错，顺序读取即可
            for chapter_id in chapter_ids {
                match self.personalize_chapter(None, chapter_id).await {
                    Ok(result) => results.push(result),
                    Err(_) => results.push(self.read_as_original(chapter_id).await),
                }
            }
            return Ok(results);
        }

        for chunk in chapter_ids.chunks(self.chapter_batch_size) {
            let futures = chunk.iter().map(|chapter_id| async move {
                match self.personalize_chapter(user_id, chapter_id).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(chapter_id, error = %e, "批量单项失败，降级为原文");
                        self.read_as_original(chapter_id).await
                    }
                }
            });

            results.extend(join_all(futures).await);
        }

        tracing::debug!(
            total = chapter_ids.len(),
            batch_size = self.chapter_batch_size,
            "章节批量个性化完成"
        );

        Ok(results)
    }

    /// 批量个性化多段给定的文本
    ///
    /// 与章节批量一致，单项失败降级为该项的原文。
    pub async fn personalize_multiple_content(
        &self,
        user_id: Option<&str>,
        items: &[(&str, &str)],
    ) -> PersonalizationResult<Vec<Personalized>> {
        let mut results = Vec::with_capacity(items.len());

        if user_id.is_none() {
            for (filename, content) in items {
                match self.personalize_content(None, filename, content).await {
                    Ok(result) => results.push(result),
                    Err(_) => results.push(original_content_item(filename, content)),
                }
            }
            return Ok(results);
        }

        for chunk in items.chunks(self.content_batch_size) {
            let futures = chunk.iter().map(|(filename, content)| async move {
                match self.personalize_content(user_id, filename, content).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(filename, error = %e, "批量单项失败，降级为原文");
                        original_content_item(filename, content)
                    }
                }
            });

            results.extend(join_all(futures).await);
        }

        Ok(results)
    }

    /// 清空结果缓存
    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("个性化缓存已清空");
    }

    /// 缓存状态报告（统计与当前键集合）
    pub fn cache_stats(&self) -> CacheReport {
        CacheReport {
            stats: self.cache.stats(),
            snapshot: self.cache.snapshot(),
        }
    }

    /// 编排器统计信息
    pub fn stats(&self) -> OrchestratorStats {
        self.stats.lock().expect("统计锁中毒").clone()
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.stats.lock().expect("统计锁中毒").reset();
        self.cache.reset_stats();
    }

    // ========================================================================
    // 内部实现
    // ========================================================================

    fn bump(&self, update: impl FnOnce(&mut OrchestratorStats)) {
        update(&mut self.stats.lock().expect("统计锁中毒"));
    }

    /// 认证校验并解析画像与目标级别
    ///
    /// 返回 None 表示用户已认证但没有可用画像。
    async fn resolve_user(
        &self,
        user_id: &str,
    ) -> PersonalizationResult<Option<(UserProfile, ComplexityLevel)>> {
        let authenticated = self
            .profiles
            .is_authenticated(user_id)
            .await
            .unwrap_or(false);
        if !authenticated {
            tracing::warn!(user_id, "用户未通过认证");
            return Err(PersonalizationError::Unauthenticated(user_id.to_string()));
        }

        let Some(profile) = self.profiles.profile(user_id).await? else {
            tracing::debug!(user_id, "用户无画像，跳过个性化");
            return Ok(None);
        };
        let profile = profile.normalized();

        // 设置中的合法覆盖值优先于背景推导
        let settings_override = self
            .profiles
            .settings(user_id)
            .await
            .ok()
            .flatten()
            .and_then(|settings| settings.complexity_override());

        let level = settings_override.unwrap_or_else(|| resolve_complexity(&profile));

        Ok(Some((profile, level)))
    }

    /// 匿名或无画像路径：读取原文，读取失败时降级为占位内容
    async fn read_as_original(&self, chapter_id: &str) -> Personalized {
        match self.contents.read(chapter_id).await {
            Ok(content) => Personalized {
                filename: chapter_id.to_string(),
                content,
                complexity: ComplexityLabel::Original,
                transformation_applied: false,
            },
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "章节读取失败，返回占位内容");
                self.bump(|stats| stats.errors += 1);
                Personalized {
                    filename: chapter_id.to_string(),
                    content: error_placeholder(chapter_id),
                    complexity: ComplexityLabel::Error,
                    transformation_applied: false,
                }
            }
        }
    }

    /// 在延迟预算内执行转换并组装结果
    async fn transform_within_budget(
        &self,
        filename: &str,
        content: &str,
        level: ComplexityLevel,
        profile: &UserProfile,
    ) -> Personalized {
        let name = preferred_name(profile);

        match self.race_transform(content, level, &name).await {
            TransformOutcome::Transformed(transformed) => {
                self.bump(|stats| stats.transformed += 1);
                Personalized {
                    filename: filename.to_string(),
                    content: transformed,
                    complexity: ComplexityLabel::Level(level),
                    transformation_applied: true,
                }
            }
            TransformOutcome::TimedOut => {
                tracing::warn!(
                    filename,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "个性化超出时间预算，返回原文"
                );
                self.bump(|stats| stats.timeouts += 1);
                Personalized {
                    filename: filename.to_string(),
                    content: content.to_string(),
                    complexity: ComplexityLabel::Timeout,
                    transformation_applied: false,
                }
            }
        }
    }

    /// 转换任务与定时器竞速
    ///
    /// 主转换失败（而非超时）时立即改用兜底转换器；兜底实现是
    /// 纯本地计算，不会再消耗可感知的预算。定时器先完成时直接
    /// 返回，落败的转换任务继续在后台运行，其结果被丢弃，也不会
    /// 写入缓存。
    async fn race_transform(
        &self,
        content: &str,
        level: ComplexityLevel,
        name: &str,
    ) -> TransformOutcome {
        let Some(primary) = self.primary.clone() else {
            self.bump(|stats| stats.fallback_used += 1);
            return TransformOutcome::Transformed(self.fallback.apply(content, level, name));
        };

        let task_content = content.to_string();
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            primary.transform(&task_content, level, &task_name).await
        });

        tokio::select! {
            joined = handle => {
                match joined {
                    Ok(Ok(transformed)) => TransformOutcome::Transformed(transformed),
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "外部转换失败，改用兜底转换器");
                        self.bump(|stats| stats.fallback_used += 1);
                        TransformOutcome::Transformed(self.fallback.apply(content, level, name))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "转换任务异常退出，改用兜底转换器");
                        self.bump(|stats| stats.fallback_used += 1);
                        TransformOutcome::Transformed(self.fallback.apply(content, level, name))
                    }
                }
            }
            _ = tokio::time::sleep(self.timeout) => TransformOutcome::TimedOut,
        }
    }
}

/// 批量降级时使用的原文结果
fn original_content_item(filename: &str, content: &str) -> Personalized {
    let filename = if filename.trim().is_empty() {
        DYNAMIC_CONTENT_ID
    } else {
        filename
    };

    Personalized {
        filename: filename.to_string(),
        content: content.to_string(),
        complexity: ComplexityLabel::Original,
        transformation_applied: false,
    }
}

/// 章节读取失败时的占位文案
pub fn error_placeholder(chapter_id: &str) -> String {
    format!(
        "# Error\n\nCould not load content for {}",
        chapter_stem(chapter_id)
    )
}
