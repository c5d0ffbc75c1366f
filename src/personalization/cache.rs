//! 个性化结果缓存
//!
//! 有界的滑动过期LRU缓存，键为 `用户:章节:级别` 的组合。只有
//! 成功的转换结果才会写入；"original"/"error"/"timeout" 结果
//! 一律不缓存，因为后续调用仍可能成功。

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::personalization::orchestrator::Personalized;
use crate::personalization::profile::ComplexityLevel;

/// 生成缓存键（组合键使用解析后的级别，而非原始画像）
pub fn cache_key(user_id: &str, chapter_id: &str, level: ComplexityLevel) -> String {
    format!("{}:{}:{}", user_id, chapter_id, level)
}

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Personalized,
    created_at: Instant,
}

impl CacheEntry {
    fn new(value: Personalized) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }

    /// 读取时刷新年龄（滑动过期）
    fn touch(&mut self) {
        self.created_at = Instant::now();
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 缓存内容快照（大小与全部键）
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub size: usize,
    pub keys: Vec<String>,
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStats,
}

/// 个性化结果缓存
pub struct PersonalizationCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
}

impl PersonalizationCache {
    /// 创建指定容量与TTL的缓存
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(1).expect("1非零"));

        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            ttl,
        }
    }

    /// 获取缓存结果
    ///
    /// 命中时刷新条目年龄和LRU位置；过期条目被移除并计为miss。
    pub fn get(&self, key: &str) -> Option<Personalized> {
        let mut guard = self.inner.lock().expect("缓存锁中毒");
        let inner = &mut *guard;
        inner.stats.total_requests += 1;

        let mut hit = None;
        let mut expired = false;
        if let Some(entry) = inner.entries.get_mut(key) {
            if entry.is_expired(self.ttl) {
                expired = true;
            } else {
                entry.touch();
                hit = Some(entry.value.clone());
            }
        }

        if let Some(value) = hit {
            inner.stats.hits += 1;
            return Some(value);
        }
        if expired {
            inner.entries.pop(key);
            inner.stats.expired += 1;
        }
        inner.stats.misses += 1;
        None
    }

    /// 写入缓存结果（仅编排器在转换成功后调用）
    pub fn insert(&self, key: String, value: Personalized) {
        let mut inner = self.inner.lock().expect("缓存锁中毒");

        if inner.entries.len() == inner.entries.cap().get() && !inner.entries.contains(&key) {
            inner.stats.evictions += 1;
        }
        inner.entries.put(key, CacheEntry::new(value));
    }

    /// 清空缓存
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("缓存锁中毒");
        inner.entries.clear();
    }

    /// 当前大小与全部键（最近使用的在前）
    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.inner.lock().expect("缓存锁中毒");
        CacheSnapshot {
            size: inner.entries.len(),
            keys: inner.entries.iter().map(|(key, _)| key.clone()).collect(),
        }
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().expect("缓存锁中毒").stats.clone()
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.inner.lock().expect("缓存锁中毒").stats.reset();
    }

    /// 清理过期条目，返回移除数量
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock().expect("缓存锁中毒");

        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            inner.entries.pop(key);
        }
        inner.stats.expired += expired_keys.len() as u64;

        expired_keys.len()
    }
}
