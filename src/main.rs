//! Bookwise 命令行入口
//!
//! 用于本地验证个性化流程：读取一个章节，按命令行给出的读者
//! 背景完成个性化，并把结果与统计信息输出到终端。

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bookwise::env;
use bookwise::personalization::{
    config, FsContentProvider, PersonalizationOrchestrator, PersonalizationSettings,
    StaticProfileProvider, UserProfile,
};

#[derive(Parser, Debug)]
#[command(name = "bookwise", version, about = "按读者技能水平重写书籍章节")]
struct Cli {
    /// 要个性化的章节标识（相对文档根目录，如 "intro" 或 "docs/intro.md"）
    chapter: String,

    /// 用户标识；缺省时按匿名访问处理，返回原文
    #[arg(long)]
    user: Option<String>,

    /// 读者显示名称
    #[arg(long)]
    name: Option<String>,

    /// 读者邮箱（未提供名称时用于派生称呼）
    #[arg(long, default_value = "reader@example.com")]
    email: String,

    /// 软件背景描述
    #[arg(long, default_value = "Unknown")]
    software_background: String,

    /// 硬件背景描述
    #[arg(long, default_value = "Unknown")]
    hardware_background: String,

    /// 复杂度覆盖值（beginner/intermediate/advanced）
    #[arg(long)]
    complexity: Option<String>,

    /// 时间预算（毫秒），覆盖配置文件与环境变量
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// 文档根目录，覆盖配置文件与环境变量
    #[arg(long)]
    docs_dir: Option<String>,

    /// 输出缓存与编排器统计信息
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = config::load_or_default();
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout = std::time::Duration::from_millis(timeout_ms);
    }
    if let Some(docs_dir) = &cli.docs_dir {
        config.docs_dir = docs_dir.clone();
    }

    let profiles = Arc::new(StaticProfileProvider::new());
    if let Some(user_id) = &cli.user {
        let mut profile = UserProfile::new(user_id.clone(), cli.email.clone())
            .with_backgrounds(cli.software_background.clone(), cli.hardware_background.clone());
        if let Some(name) = &cli.name {
            profile = profile.with_name(name.clone());
        }
        profiles.insert_profile(profile);

        if let Some(complexity) = &cli.complexity {
            profiles.insert_settings(
                user_id.clone(),
                PersonalizationSettings {
                    content_complexity: Some(complexity.clone()),
                    ..Default::default()
                },
            );
        }
    }

    let contents = Arc::new(FsContentProvider::new(&config.docs_dir));
    let orchestrator = PersonalizationOrchestrator::new(&config, profiles, contents)?;

    let result = orchestrator
        .personalize_chapter(cli.user.as_deref(), &cli.chapter)
        .await?;

    println!("{}", result.content);

    if cli.stats {
        let report = orchestrator.cache_stats();
        let stats = orchestrator.stats();
        eprintln!();
        eprintln!(
            "结果标签: {} (转换: {})",
            result.complexity, result.transformation_applied
        );
        eprintln!(
            "编排器: 请求 {} / 转换 {} / 兜底 {} / 超时 {} / 错误 {}",
            stats.total_requests, stats.transformed, stats.fallback_used, stats.timeouts,
            stats.errors
        );
        eprintln!(
            "缓存: 大小 {} / 命中率 {:.2}",
            report.snapshot.size,
            report.stats.hit_rate()
        );
    }

    Ok(())
}

/// 初始化日志订阅器
///
/// RUST_LOG 优先；未设置时使用 BOOKWISE_LOG_LEVEL，再退回 info。
fn init_tracing() {
    let default_level = env::core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("警告: {}，使用默认日志级别 info", e);
        "info".to_string()
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bookwise={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
