//! 章节内容提供方
//!
//! 将逻辑章节标识解析为原始文本。站点路由给出的标识和磁盘上的
//! 文件名经常不一致（连字符/下划线、缺失扩展名、目录首页），
//! 因此文件实现带有一组备选路径启发式。

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::personalization::error::{PersonalizationError, PersonalizationResult};

/// 内容提供方
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// 读取章节原始文本，穷尽启发式后仍无法解析时返回 `ContentNotFound`
    async fn read(&self, chapter_id: &str) -> PersonalizationResult<String>;
}

/// 基于文件系统的内容提供方
///
/// 以文档根目录为基准解析章节路径。
pub struct FsContentProvider {
    docs_root: PathBuf,
}

impl FsContentProvider {
    pub fn new(docs_root: impl Into<PathBuf>) -> Self {
        Self {
            docs_root: docs_root.into(),
        }
    }

    pub fn docs_root(&self) -> &Path {
        &self.docs_root
    }

    /// 列出文档根目录下所有章节文件（按字典序）
    pub async fn list_chapters(&self) -> PersonalizationResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.docs_root).await?;
        let mut chapters = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_markdown_file(&path) {
                chapters.push(path);
            }
        }

        chapters.sort();
        Ok(chapters)
    }

    /// 将URL风格的章节标识规范化为文件路径
    fn normalize(&self, chapter_id: &str) -> String {
        let mut normalized = chapter_id.trim_start_matches('/').to_string();

        // 去掉路由前缀，站点将 docs/ 下的文件映射到 /docs/ 路由
        if let Some(stripped) = normalized.strip_prefix("docs/") {
            normalized = stripped.to_string();
        }

        if !normalized.to_lowercase().ends_with(".md") {
            normalized.push_str(".md");
        }

        normalized
    }

    /// 生成备选路径（相对文档根目录）
    fn alternate_paths(&self, chapter_id: &str) -> Vec<PathBuf> {
        let normalized = self.normalize(chapter_id);
        let underscored = normalized.replace('-', "_").replace(' ', "_");
        let stem = normalized.trim_end_matches(".md");
        let basename = stem.rsplit('/').next().unwrap_or(stem);

        let candidates = [
            normalized.clone(),
            underscored.clone(),
            format!("{}/index.md", stem),
            format!("{}/README.md", stem),
            format!("{}.md", basename),
            format!("{}.md", basename.replace('-', "_")),
        ];

        let mut paths: Vec<PathBuf> = Vec::new();
        for candidate in candidates {
            let path = self.docs_root.join(candidate);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// 兜底：扫描文档根目录，按文件名模糊匹配
    async fn scan_for_match(&self, chapter_id: &str) -> Option<String> {
        let wanted = sanitize_for_match(chapter_id.rsplit('/').next().unwrap_or(chapter_id));
        if wanted.is_empty() {
            return None;
        }

        let mut entries = tokio::fs::read_dir(&self.docs_root).await.ok()?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                // 目录章节以 README.md 或 index.md 作为正文
                for index_name in ["README.md", "index.md"] {
                    if let Ok(content) = tokio::fs::read_to_string(path.join(index_name)).await {
                        tracing::debug!(path = %path.display(), "通过目录扫描命中章节");
                        return Some(content);
                    }
                }
            } else {
                let file_name = entry.file_name().to_string_lossy().to_lowercase();
                if sanitize_for_match(&file_name).contains(&wanted) {
                    if let Ok(content) = tokio::fs::read_to_string(&path).await {
                        tracing::debug!(path = %path.display(), "通过文件名匹配命中章节");
                        return Some(content);
                    }
                }
            }
        }

        None
    }
}

#[async_trait]
impl ContentProvider for FsContentProvider {
    async fn read(&self, chapter_id: &str) -> PersonalizationResult<String> {
        for path in self.alternate_paths(chapter_id) {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    tracing::debug!(chapter_id, path = %path.display(), "读取章节内容");
                    return Ok(content);
                }
                Err(_) => continue,
            }
        }

        if let Some(content) = self.scan_for_match(chapter_id).await {
            return Ok(content);
        }

        tracing::warn!(chapter_id, "穷尽备选路径后仍未找到章节文件");
        Err(PersonalizationError::ContentNotFound(
            chapter_id.to_string(),
        ))
    }
}

/// 判断文件是否为Markdown章节
pub fn is_markdown_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("mdx")
    )
}

/// 取章节标识的文件名主干（用于占位文案）
pub fn chapter_stem(chapter_id: &str) -> &str {
    let basename = chapter_id.rsplit('/').next().unwrap_or(chapter_id);
    basename
        .strip_suffix(".md")
        .or_else(|| basename.strip_suffix(".MD"))
        .unwrap_or(basename)
}

fn sanitize_for_match(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
