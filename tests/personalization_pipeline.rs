//! 个性化流程集成测试
//!
//! 覆盖编排器的完整路径：匿名访问、认证、级别解析、缓存、
//! 延迟预算竞速与批量处理。

use std::time::Duration;

use bookwise::personalization::{ComplexityLabel, ComplexityLevel, PersonalizationError};

mod common {
    include!("common/mod.rs");
}

use common::{
    docs_with_chapters, orchestrator_with, standard_profiles, test_config, MockBehavior,
    MockTransformer,
};

/// 匿名访问应原样返回章节内容
#[tokio::test]
async fn test_anonymous_request_returns_original() {
    let (_dir, contents) = docs_with_chapters(&[("intro.md", "# Intro\n\nHello.")]);
    let transformer = MockTransformer::new(MockBehavior::Echo);
    let orchestrator = orchestrator_with(
        &test_config(),
        standard_profiles(),
        contents,
        Some(transformer.clone()),
    );

    let result = orchestrator
        .personalize_chapter(None, "intro")
        .await
        .expect("匿名访问不应失败");

    assert_eq!(result.content, "# Intro\n\nHello.");
    assert_eq!(result.complexity, ComplexityLabel::Original);
    assert!(!result.transformation_applied);
    assert_eq!(transformer.calls(), 0, "匿名路径不应触发转换");

    println!("✅ 匿名访问测试通过");
}

/// 未注册用户应返回认证错误（唯一向调用方传播的错误）
#[tokio::test]
async fn test_unknown_user_is_unauthenticated() {
    let (_dir, contents) = docs_with_chapters(&[("intro.md", "# Intro")]);
    let orchestrator = orchestrator_with(
        &test_config(),
        standard_profiles(),
        contents,
        Some(MockTransformer::new(MockBehavior::Echo)),
    );

    let err = orchestrator
        .personalize_chapter(Some("ghost-user"), "intro")
        .await
        .unwrap_err();

    assert!(matches!(err, PersonalizationError::Unauthenticated(_)));

    println!("✅ 认证失败传播测试通过");
}

/// 背景解析应决定转换使用的级别，设置覆盖优先
#[tokio::test]
async fn test_level_resolution_and_override() {
    let (_dir, contents) = docs_with_chapters(&[("intro.md", "content")]);
    let transformer = MockTransformer::new(MockBehavior::Echo);
    let orchestrator = orchestrator_with(
        &test_config(),
        standard_profiles(),
        contents,
        Some(transformer),
    );

    let beginner = orchestrator
        .personalize_chapter(Some("beginner-user"), "intro")
        .await
        .unwrap();
    assert_eq!(
        beginner.complexity,
        ComplexityLabel::Level(ComplexityLevel::Beginner)
    );
    assert!(beginner.content.starts_with("[beginner|Bea]"));

    // 入门+高级背景取平均后落在中级
    let mixed = orchestrator
        .personalize_chapter(Some("mixed-user"), "intro")
        .await
        .unwrap();
    assert_eq!(
        mixed.complexity,
        ComplexityLabel::Level(ComplexityLevel::Intermediate)
    );

    // 设置中的合法覆盖值优先于背景推导
    let overridden = orchestrator
        .personalize_chapter(Some("override-user"), "intro")
        .await
        .unwrap();
    assert_eq!(
        overridden.complexity,
        ComplexityLabel::Level(ComplexityLevel::Advanced)
    );

    println!("✅ 级别解析与覆盖测试通过");
}

/// 重复请求应命中缓存，转换器至多被调用一次
#[tokio::test]
async fn test_repeat_request_hits_cache() {
    let (_dir, contents) = docs_with_chapters(&[("intro.md", "content")]);
    let transformer = MockTransformer::new(MockBehavior::Echo);
    let orchestrator = orchestrator_with(
        &test_config(),
        standard_profiles(),
        contents,
        Some(transformer.clone()),
    );

    let first = orchestrator
        .personalize_chapter(Some("advanced-user"), "intro")
        .await
        .unwrap();
    let second = orchestrator
        .personalize_chapter(Some("advanced-user"), "intro")
        .await
        .unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(transformer.calls(), 1, "第二次请求应命中缓存");

    let report = orchestrator.cache_stats();
    assert_eq!(report.stats.hits, 1);
    assert_eq!(report.snapshot.size, 1);
    assert!(report
        .snapshot
        .keys
        .iter()
        .any(|key| key == "advanced-user:intro:advanced"));

    println!("✅ 缓存命中测试通过");
}

/// 超出时间预算时应返回原文并打上 timeout 标签
#[tokio::test]
async fn test_slow_transformer_times_out() {
    let (_dir, contents) = docs_with_chapters(&[("intro.md", "original text")]);
    let mut config = test_config();
    config.timeout = Duration::from_millis(50);

    let transformer = MockTransformer::new(MockBehavior::Delay(Duration::from_secs(5)));
    let orchestrator = orchestrator_with(
        &config,
        standard_profiles(),
        contents,
        Some(transformer.clone()),
    );

    let start = std::time::Instant::now();
    let result = orchestrator
        .personalize_chapter(Some("beginner-user"), "intro")
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(1), "应在预算附近返回");
    assert_eq!(result.content, "original text");
    assert_eq!(result.complexity, ComplexityLabel::Timeout);
    assert!(!result.transformation_applied);

    // 超时结果不入缓存，重试会再次调用转换器
    let _ = orchestrator
        .personalize_chapter(Some("beginner-user"), "intro")
        .await
        .unwrap();
    assert_eq!(transformer.calls(), 2);

    println!("✅ 超时竞速测试通过");
}

/// 批量个性化应保持输入顺序并逐章产出结果
#[tokio::test]
async fn test_batch_chapters_preserve_order() {
    let chapters: Vec<(String, String)> = (0..15)
        .map(|i| (format!("ch{:02}.md", i), format!("chapter {}", i)))
        .collect();
    let chapter_refs: Vec<(&str, &str)> = chapters
        .iter()
        .map(|(name, content)| (name.as_str(), content.as_str()))
        .collect();
    let (_dir, contents) = docs_with_chapters(&chapter_refs);

    let mut config = test_config();
    config.batch.chapter_batch_size = 10;

    let transformer = MockTransformer::new(MockBehavior::Echo);
    let orchestrator = orchestrator_with(
        &config,
        standard_profiles(),
        contents,
        Some(transformer.clone()),
    );

    let ids: Vec<String> = (0..15).map(|i| format!("ch{:02}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let results = orchestrator
        .personalize_multiple_chapters(Some("advanced-user"), &id_refs)
        .await
        .unwrap();

    assert_eq!(results.len(), 15);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.filename, format!("ch{:02}", i));
        assert!(result.content.ends_with(&format!("chapter {}", i)));
        assert!(result.transformation_applied);
    }
    assert_eq!(transformer.calls(), 15);

    println!("✅ 批量章节测试通过");
}

/// 批量中的单项失败（包括认证失败）应降级为该章节的原文，批次不报错
#[tokio::test]
async fn test_batch_substitutes_original_on_item_failure() {
    let (_dir, contents) = docs_with_chapters(&[("a.md", "a"), ("b.md", "b")]);
    let transformer = MockTransformer::new(MockBehavior::Echo);
    let orchestrator = orchestrator_with(
        &test_config(),
        standard_profiles(),
        contents,
        Some(transformer.clone()),
    );

    // 未注册用户：单项都认证失败，但批次整体成功并逐项返回原文
    let results = orchestrator
        .personalize_multiple_chapters(Some("ghost-user"), &["a", "b", "missing"])
        .await
        .expect("批量路径不应向调用方抛错");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].content, "a");
    assert_eq!(results[0].complexity, ComplexityLabel::Original);
    assert_eq!(results[1].content, "b");
    // 原文也读不到时退化为占位内容
    assert_eq!(results[2].complexity, ComplexityLabel::Error);
    assert!(results[2].content.starts_with("# Error"));
    assert_eq!(transformer.calls(), 0);

    // 直接内容批量同样逐项降级为传入的原文
    let content_results = orchestrator
        .personalize_multiple_content(Some("ghost-user"), &[("frag", "text")])
        .await
        .unwrap();
    assert_eq!(content_results[0].content, "text");
    assert_eq!(content_results[0].complexity, ComplexityLabel::Original);

    // 单章节入口的认证错误传播行为保持不变
    let err = orchestrator
        .personalize_chapter(Some("ghost-user"), "a")
        .await
        .unwrap_err();
    assert!(matches!(err, PersonalizationError::Unauthenticated(_)));

    println!("✅ 批量单项降级测试通过");
}

/// 直接内容个性化：空文件名使用固定标识，批量按内容并发上限分块
#[tokio::test]
async fn test_direct_content_personalization() {
    let (_dir, contents) = docs_with_chapters(&[]);
    let transformer = MockTransformer::new(MockBehavior::Echo);
    let orchestrator = orchestrator_with(
        &test_config(),
        standard_profiles(),
        contents,
        Some(transformer.clone()),
    );

    let single = orchestrator
        .personalize_content(Some("beginner-user"), "", "inline snippet")
        .await
        .unwrap();
    assert_eq!(single.filename, "dynamic-content");
    assert!(single.transformation_applied);

    let items: Vec<(String, String)> = (0..7)
        .map(|i| (format!("frag-{}", i), format!("fragment {}", i)))
        .collect();
    let item_refs: Vec<(&str, &str)> = items
        .iter()
        .map(|(name, content)| (name.as_str(), content.as_str()))
        .collect();

    let results = orchestrator
        .personalize_multiple_content(Some("beginner-user"), &item_refs)
        .await
        .unwrap();
    assert_eq!(results.len(), 7);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.filename, format!("frag-{}", i));
    }

    println!("✅ 直接内容个性化测试通过");
}
