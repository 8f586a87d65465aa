//! 响应缓存：指令指纹 → 计划
//!
//! - 内存索引为 DashMap，读操作不取写锁
//! - 可选 JSON 文件持久化：put 追加一行单条目文档，invalidate 重写为单个聚合文档，clear 写入 `{}`
//! - 加载时把文件当作 JSON 文档流读取，因此追加日志与旧式聚合文档都能读；后出现的条目覆盖先出现的
//! - 所有文件写入在同一把写锁内完成；文件 I/O 失败只记录 warn，不向调用方传播
//! - 不支持多进程共享同一文件

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use anyhow::Context;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::action::Plan;
use crate::cache::{CacheMode, KeyScheme};

pub struct ResponseCache {
    entries: DashMap<String, Plan>,
    mode: AtomicU8,
    path: Option<PathBuf>,
    scheme: KeyScheme,
    /// 串行化所有文件写入（追加与重写）
    write_lock: Mutex<()>,
}

impl ResponseCache {
    /// 按模式创建；有文件时无论模式都立即加载，模式只控制读写。
    /// Disabled 的缓存之后被 set_mode 打开时，失效重写不会丢掉文件里已有的条目
    pub fn new(mode: CacheMode, path: Option<PathBuf>) -> Self {
        let cache = Self {
            entries: DashMap::new(),
            mode: AtomicU8::new(mode.to_u8()),
            path,
            scheme: KeyScheme::default(),
            write_lock: Mutex::new(()),
        };
        cache.load();
        cache
    }

    /// 纯内存缓存（ReadWrite）
    pub fn memory_only() -> Self {
        Self::new(CacheMode::ReadWrite, None)
    }

    pub fn disabled() -> Self {
        Self::new(CacheMode::Disabled, None)
    }

    /// 文件持久化缓存（ReadWrite）
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(CacheMode::ReadWrite, Some(path.into()))
    }

    pub fn with_file_and_mode(path: impl Into<PathBuf>, mode: CacheMode) -> Self {
        Self::new(mode, Some(path.into()))
    }

    /// 切换键方案；应在使用前设置，已存在的条目键不会重算
    pub fn with_key_scheme(mut self, scheme: KeyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn key(&self, instruction: &str) -> String {
        self.scheme.fingerprint(instruction)
    }

    pub fn mode(&self) -> CacheMode {
        CacheMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: CacheMode) {
        let previous = CacheMode::from_u8(self.mode.swap(mode.to_u8(), Ordering::AcqRel));
        if previous != mode {
            info!(from = %previous, to = %mode, "cache mode changed");
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 查找计划；模式不允许读时总是 None
    pub fn get(&self, instruction: &str) -> Option<Plan> {
        if !self.mode().can_read() {
            return None;
        }
        let key = self.key(instruction);
        let hit = self.entries.get(&key).map(|e| e.value().clone());
        debug!(key = %short(&key), hit = hit.is_some(), "cache lookup");
        hit
    }

    pub fn contains(&self, instruction: &str) -> bool {
        self.mode().can_read() && self.entries.contains_key(&self.key(instruction))
    }

    /// 记录计划；有文件时在返回前追加到文件
    pub fn put(&self, instruction: &str, plan: &Plan) {
        if !self.mode().can_write() {
            return;
        }
        let key = self.key(instruction);
        let _guard = self.lock_writes();
        self.entries.insert(key.clone(), plan.clone());
        debug!(key = %short(&key), actions = plan.len(), "cache store");
        if let Some(path) = &self.path {
            if let Err(e) = append_entry(path, &key, plan) {
                warn!(error = %e, path = %path.display(), "failed to append cache entry");
            }
        }
    }

    /// 删除条目；返回是否真的删除了（Disabled 时总是 false）。删除后重写文件
    pub fn invalidate(&self, instruction: &str) -> bool {
        if self.mode().is_disabled() {
            return false;
        }
        let key = self.key(instruction);
        let _guard = self.lock_writes();
        if self.entries.remove(&key).is_none() {
            return false;
        }
        info!(key = %short(&key), "cache entry invalidated");
        self.rewrite_locked();
        true
    }

    /// 清空全部条目；文件重写为 `{}`
    pub fn clear(&self) {
        let _guard = self.lock_writes();
        self.entries.clear();
        if let Some(path) = &self.path {
            if let Err(e) = write_atomic(path, b"{}\n") {
                warn!(error = %e, path = %path.display(), "failed to clear cache file");
            }
        }
        info!("cache cleared");
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 调用方须持有写锁
    fn rewrite_locked(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let snapshot: BTreeMap<String, Plan> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let result = serde_json::to_vec_pretty(&snapshot)
            .context("serialize cache")
            .and_then(|mut bytes| {
                bytes.push(b'\n');
                write_atomic(path, &bytes)
            });
        if let Err(e) = result {
            warn!(error = %e, path = %path.display(), "failed to rewrite cache file");
        }
    }

    fn load(&self) {
        let Some(path) = &self.path else {
            return;
        };
        match load_entries(path) {
            Ok(entries) => {
                let count = entries.len();
                for (key, plan) in entries {
                    self.entries.insert(key, plan);
                }
                if count > 0 {
                    info!(path = %path.display(), entries = self.entries.len(), "cache loaded");
                }
            }
            Err(e) => warn!(error = %e, path = %path.display(), "failed to load cache file"),
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("mode", &self.mode())
            .field("entries", &self.entries.len())
            .field("path", &self.path)
            .finish()
    }
}

fn short(key: &str) -> &str {
    &key[..key.len().min(12)]
}

/// 读取文档流：每个文档都是「键 → 计划」映射；遇到损坏的文档时跳到下一行继续
fn load_entries(path: &Path) -> anyhow::Result<Vec<(String, Plan)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    let mut skipped = 0usize;
    let mut rest = data.as_str();
    loop {
        let mut stream =
            serde_json::Deserializer::from_str(rest).into_iter::<HashMap<String, Plan>>();
        let failed = loop {
            match stream.next() {
                None => break false,
                Some(Ok(doc)) => entries.extend(doc),
                Some(Err(e)) => {
                    debug!(error = %e, "skipping corrupt cache document");
                    break true;
                }
            }
        };
        if !failed {
            break;
        }
        skipped += 1;
        let tail = rest.get(stream.byte_offset()..).unwrap_or_default().trim_start();
        match tail.find('\n') {
            Some(i) => rest = &tail[i + 1..],
            None => break,
        }
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped, kept = entries.len(), "cache file partially corrupt");
    }
    Ok(entries)
}

fn append_entry(path: &Path, key: &str, plan: &Plan) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut doc = serde_json::Map::new();
    doc.insert(key.to_string(), serde_json::to_value(plan)?);
    let line = serde_json::to_string(&doc)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.flush()?;
    Ok(())
}

fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionItem, Locator, Point};
    use tempfile::TempDir;

    fn plan(x: i32) -> Plan {
        Plan::new(vec![ActionItem::click(Locator::Coordinate(Point::new(x, x)))])
    }

    #[test]
    fn test_get_after_put() {
        let cache = ResponseCache::memory_only();
        cache.put("open settings", &plan(1));
        assert_eq!(cache.get("open settings"), Some(plan(1)));
        assert!(cache.contains("open settings"));
        assert_eq!(cache.get("open Settings"), None);
    }

    #[test]
    fn test_write_only_never_hits() {
        let cache = ResponseCache::new(CacheMode::WriteOnly, None);
        cache.put("a", &plan(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), None);
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_read_only_ignores_put() {
        let cache = ResponseCache::new(CacheMode::ReadOnly, None);
        cache.put("a", &plan(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_ignores_everything() {
        let cache = ResponseCache::disabled();
        cache.put("a", &plan(1));
        assert_eq!(cache.get("a"), None);
        assert!(!cache.invalidate("a"));
    }

    #[test]
    fn test_set_mode_at_runtime() {
        let cache = ResponseCache::memory_only();
        cache.put("a", &plan(1));
        cache.set_mode(CacheMode::WriteOnly);
        assert_eq!(cache.get("a"), None);
        cache.set_mode(CacheMode::ReadWrite);
        assert_eq!(cache.get("a"), Some(plan(1)));
    }

    #[test]
    fn test_invalidate_reports_removal() {
        let cache = ResponseCache::memory_only();
        cache.put("a", &plan(1));
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_put_appends_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResponseCache::with_file(&path);
        cache.put("a", &plan(1));
        cache.put("b", &plan(2));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);

        let reloaded = ResponseCache::with_file(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("b"), Some(plan(2)));
    }

    #[test]
    fn test_later_entries_override_earlier() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResponseCache::with_file(&path);
        cache.put("a", &plan(1));
        cache.put("a", &plan(9));
        let reloaded = ResponseCache::with_file(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("a"), Some(plan(9)));
    }

    #[test]
    fn test_loads_legacy_aggregate_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.json");
        let key = fingerprint_of("search rust");
        let doc = format!(
            r#"{{
  "{key}": {{
    "actions": [ {{ "type": "TAP", "locate": {{ "left": 100, "top": 100, "width": 50, "height": 50 }} }} ],
    "log": "legacy"
  }}
}}"#
        );
        std::fs::write(&path, doc).unwrap();
        let cache = ResponseCache::with_file(&path);
        assert_eq!(cache.len(), 1);
        let hit = cache.get("search rust").unwrap();
        assert_eq!(hit.log, "legacy");
        assert_eq!(
            hit.actions,
            vec![ActionItem::click(Locator::Coordinate(Point::new(125, 125)))]
        );
    }

    #[test]
    fn test_invalidate_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResponseCache::with_file(&path);
        cache.put("a", &plan(1));
        cache.put("b", &plan(2));
        assert!(cache.invalidate("a"));
        let reloaded = ResponseCache::with_file(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("a"), None);
        assert_eq!(reloaded.get("b"), Some(plan(2)));
    }

    #[test]
    fn test_clear_writes_empty_object_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResponseCache::with_file(&path);
        cache.put("a", &plan(1));
        cache.clear();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
        assert_eq!(ResponseCache::with_file(&path).len(), 0);
    }

    #[test]
    fn test_append_after_clear_still_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResponseCache::with_file(&path);
        cache.clear();
        cache.put("a", &plan(1));
        assert_eq!(ResponseCache::with_file(&path).get("a"), Some(plan(1)));
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let good = format!(r#"{{"{}": {{"actions": []}}}}"#, fingerprint_of("x"));
        std::fs::write(&path, format!("{{\"broken\": \n{good}\n")).unwrap();
        let cache = ResponseCache::with_file(&path);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("x"));
    }

    #[test]
    fn test_disabled_serves_nothing_from_loaded_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        ResponseCache::with_file(&path).put("a", &plan(1));
        let cache = ResponseCache::with_file_and_mode(&path, CacheMode::Disabled);
        assert_eq!(cache.get("a"), None);
        assert!(!cache.contains("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(ResponseCache::with_file(&path).get("a"), Some(plan(1)));
    }

    #[test]
    fn test_enabling_disabled_cache_keeps_persisted_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        {
            let writer = ResponseCache::with_file(&path);
            for i in 0..5 {
                writer.put(&format!("step {i}"), &plan(i));
            }
        }

        let cache = ResponseCache::with_file_and_mode(&path, CacheMode::Disabled);
        cache.set_mode(CacheMode::ReadWrite);
        cache.put("new", &plan(42));
        assert!(cache.invalidate("new"));

        let reloaded = ResponseCache::with_file(&path);
        assert_eq!(reloaded.len(), 5);
        assert_eq!(reloaded.get("step 3"), Some(plan(3)));
        assert_eq!(reloaded.get("new"), None);
    }

    #[test]
    fn test_concurrent_writers_persist_every_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = std::sync::Arc::new(ResponseCache::with_file(&path));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let instruction = format!("thread {t} step {i}");
                        cache.put(&instruction, &plan(i));
                        if i % 7 == 0 {
                            cache.invalidate(&instruction);
                        }
                        let _ = cache.get(&format!("thread {} step {}", (t + 1) % 8, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 每个线程 50 条，其中 i = 0, 7, ..., 49 共 8 条被失效
        assert_eq!(cache.len(), 8 * 42);
        let reloaded = ResponseCache::with_file(&path);
        assert_eq!(reloaded.len(), cache.len());
        assert!(reloaded.contains("thread 5 step 48"));
        assert!(!reloaded.contains("thread 5 step 49"));
    }

    #[test]
    fn test_missing_parent_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/cache.json");
        let cache = ResponseCache::with_file(&path);
        cache.put("a", &plan(1));
        assert!(path.exists());
    }

    fn fingerprint_of(s: &str) -> String {
        crate::cache::fingerprint(s)
    }
}
