// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bookwise::personalization::{
    ComplexityLevel, ContentTransformer, FsContentProvider, PersonalizationConfig,
    PersonalizationError, PersonalizationOrchestrator, PersonalizationResult,
    PersonalizationSettings, StaticProfileProvider, UserProfile,
};

/// 模拟转换器的行为模式
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// 立即成功，输出带级别前缀的回显
    Echo,
    /// 延迟指定时间后成功
    Delay(Duration),
    /// 总是失败
    Fail,
}

/// 可配置的模拟转换器
///
/// 记录调用次数，便于断言缓存命中与批处理行为。
pub struct MockTransformer {
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockTransformer {
    pub fn new(behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentTransformer for MockTransformer {
    async fn transform(
        &self,
        content: &str,
        level: ComplexityLevel,
        preferred_name: &str,
    ) -> PersonalizationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Echo => Ok(format!("[{}|{}] {}", level, preferred_name, content)),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(format!("[{}|{}] {}", level, preferred_name, content))
            }
            MockBehavior::Fail => Err(PersonalizationError::TransformerFailure(
                "模拟的服务故障".to_string(),
            )),
        }
    }
}

/// 构建包含指定章节文件的临时文档目录
pub fn docs_with_chapters(
    chapters: &[(&str, &str)],
) -> (tempfile::TempDir, Arc<FsContentProvider>) {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    for (name, content) in chapters {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    let provider = Arc::new(FsContentProvider::new(dir.path()));
    (dir, provider)
}

/// 注册了标准测试用户的画像提供方
///
/// - `beginner-user`: 双入门背景
/// - `advanced-user`: 双高级背景
/// - `mixed-user`: 入门+高级（平均后为中级）
/// - `override-user`: 入门背景但设置覆盖为高级
pub fn standard_profiles() -> Arc<StaticProfileProvider> {
    let provider = Arc::new(StaticProfileProvider::new());

    provider.insert_profile(
        UserProfile::new("beginner-user", "bea@example.com")
            .with_name("Bea")
            .with_backgrounds("beginner in Python", "new to electronics"),
    );
    provider.insert_profile(
        UserProfile::new("advanced-user", "adv@example.com")
            .with_backgrounds("10 years of systems programming", "embedded veteran"),
    );
    provider.insert_profile(
        UserProfile::new("mixed-user", "mix@example.com")
            .with_backgrounds("beginner", "expert in FPGA design"),
    );
    provider.insert_profile(
        UserProfile::new("override-user", "ovr@example.com").with_backgrounds("beginner", "novice"),
    );
    provider.insert_settings(
        "override-user",
        PersonalizationSettings {
            content_complexity: Some("advanced".to_string()),
            ..Default::default()
        },
    );

    provider
}

/// 面向测试的配置（短超时、小缓存）
pub fn test_config() -> PersonalizationConfig {
    let mut config = PersonalizationConfig::default();
    config.timeout = Duration::from_millis(500);
    config.cache.capacity = 16;
    config.cache.ttl = Duration::from_secs(60);
    config
}

/// 组装一个使用模拟转换器的编排器
pub fn orchestrator_with(
    config: &PersonalizationConfig,
    profiles: Arc<StaticProfileProvider>,
    contents: Arc<FsContentProvider>,
    transformer: Option<Arc<MockTransformer>>,
) -> PersonalizationOrchestrator {
    PersonalizationOrchestrator::with_transformer(
        config,
        profiles,
        contents,
        transformer.map(|t| t as Arc<dyn ContentTransformer>),
    )
}
