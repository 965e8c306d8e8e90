use ga_error::{GaError, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// 底层持久化键值存储（浏览器 localStorage 的抽象）
///
/// 只处理原始字符串，序列化由 [`KeyValueStore`] 负责。
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: String) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

fn lock_poisoned(operation: &str) -> GaError {
    GaError::Storage {
        operation: operation.to_string(),
        message: "存储锁已损坏".to_string(),
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().map_err(|_| lock_poisoned("get_item"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        let mut items = self.items.write().map_err(|_| lock_poisoned("set_item"))?;
        items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| lock_poisoned("remove_item"))?;
        items.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut items = self.items.write().map_err(|_| lock_poisoned("clear"))?;
        items.clear();
        Ok(())
    }
}

/// 文件存储：整个文件是一个 JSON 对象，键到原始字符串
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    guard: RwLock<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入前读取：文件损坏时按空处理，随后被覆盖
    fn read_for_write(&self) -> HashMap<String, String> {
        self.read_all().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "存储文件损坏，按空处理");
            HashMap::new()
        })
    }

    fn write_all(&self, items: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard.read().map_err(|_| lock_poisoned("get_item"))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.guard.write().map_err(|_| lock_poisoned("set_item"))?;
        let mut items = self.read_for_write();
        items.insert(key.to_string(), value);
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.guard.write().map_err(|_| lock_poisoned("remove_item"))?;
        let mut items = self.read_for_write();
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.guard.write().map_err(|_| lock_poisoned("clear"))?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 命名空间键值存储
///
/// 所有值序列化后存放在同一个命名空间容器里，`get`/`set`/`remove`
/// 都会对整个容器做读-改-写。容器损坏或无法解析时按空容器处理，
/// 错误只记录日志，不向调用方抛出。
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KeyValueStore {
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// 基于内存存储创建
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), namespace)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    fn load(&self) -> Map<String, Value> {
        let raw = match self.backend.get_item(&self.namespace) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Map::new(),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "读取存储失败，按空处理");
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(container)) => container,
            Ok(other) => {
                warn!(namespace = %self.namespace, kind = %json_kind(&other), "存储容器不是对象，按空处理");
                Map::new()
            }
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "存储容器解析失败，按空处理");
                Map::new()
            }
        }
    }

    fn persist(&self, container: &Map<String, Value>, operation: &str) {
        let result = serde_json::to_string(container)
            .map_err(GaError::from)
            .and_then(|data| self.backend.set_item(&self.namespace, data));

        if let Err(e) = result {
            warn!(namespace = %self.namespace, operation, error = %e, "写入存储失败");
        }
    }

    /// 读取原始 JSON 值，`null` 视为不存在
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.load().remove(key).filter(|v| !v.is_null())
    }

    /// 读取并反序列化；不存在或类型不符都返回 `None`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(namespace = %self.namespace, key, error = %e, "存储值类型不符，视为不存在");
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(namespace = %self.namespace, key, error = %e, "存储值序列化失败");
                return;
            }
        };

        let mut container = self.load();
        container.insert(key.to_string(), value);
        self.persist(&container, "set");
    }

    pub fn remove(&self, key: &str) {
        let mut container = self.load();
        container.remove(key);
        self.persist(&container, "remove");
    }

    /// 清空整个底层存储（不仅是当前命名空间）
    pub fn clear(&self) {
        if let Err(e) = self.backend.clear() {
            warn!(namespace = %self.namespace, error = %e, "清空存储失败");
        }
    }

    /// 当前容器的完整内容
    pub fn snapshot(&self) -> Map<String, Value> {
        self.load()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("ga-store-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_set_get_remove() {
        let store = KeyValueStore::in_memory("test");
        assert!(store.get_value("token").is_none());

        store.set("token", "abc.def.ghi");
        store.set("permissionList", &vec!["system:role:list"]);

        assert_eq!(store.get::<String>("token").as_deref(), Some("abc.def.ghi"));
        assert_eq!(
            store.get::<Vec<String>>("permissionList"),
            Some(vec!["system:role:list".to_string()])
        );

        store.remove("token");
        assert!(store.get_value("token").is_none());
        assert!(store.get_value("permissionList").is_some());
    }

    #[test]
    fn test_values_share_one_namespaced_container() {
        let backend = Arc::new(MemoryBackend::new());
        let store = KeyValueStore::new(backend.clone(), "admin");
        store.set("token", "t");
        store.set("activePath", "/auth/role");

        let raw = backend.get_item("admin").unwrap().unwrap();
        let container: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(container, json!({"token": "t", "activePath": "/auth/role"}));
        assert!(backend.get_item("token").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_container_reads_as_empty_and_recovers() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_item("admin", "{not json".to_string()).unwrap();
        let store = KeyValueStore::new(backend.clone(), "admin");

        assert!(store.get_value("token").is_none());
        assert!(store.snapshot().is_empty());

        store.set("token", "fresh");
        assert_eq!(store.get::<String>("token").as_deref(), Some("fresh"));
    }

    #[test]
    fn test_non_object_container_reads_as_empty() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_item("admin", "[1,2,3]".to_string()).unwrap();
        let store = KeyValueStore::new(backend, "admin");
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_type_mismatch_is_absent() {
        let store = KeyValueStore::in_memory("test");
        store.set("lastActivity", "not a number");
        assert!(store.get::<i64>("lastActivity").is_none());
        assert!(store.get_value("lastActivity").is_some());
    }

    #[test]
    fn test_null_is_absent() {
        let store = KeyValueStore::in_memory("test");
        store.set("token", &Value::Null);
        assert!(store.get_value("token").is_none());
    }

    #[test]
    fn test_clear_wipes_every_namespace() {
        let backend = Arc::new(MemoryBackend::new());
        let a = KeyValueStore::new(backend.clone(), "a");
        let b = KeyValueStore::new(backend, "b");
        a.set("token", "1");
        b.set("token", "2");

        a.clear();
        assert!(a.get_value("token").is_none());
        assert!(b.get_value("token").is_none());
    }

    #[test]
    fn test_file_backend_persists_across_instances() {
        let path = temp_path();
        {
            let store = KeyValueStore::new(Arc::new(FileBackend::new(&path)), "admin");
            store.set("token", "persisted");
        }
        let store = KeyValueStore::new(Arc::new(FileBackend::new(&path)), "admin");
        assert_eq!(store.get::<String>("token").as_deref(), Some("persisted"));

        store.clear();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_backend_corrupt_file_is_overwritten() {
        let path = temp_path();
        std::fs::write(&path, "garbage").unwrap();
        let backend = FileBackend::new(&path);
        assert!(backend.get_item("admin").is_err());

        let store = KeyValueStore::new(Arc::new(backend), "admin");
        assert!(store.get_value("token").is_none());
        store.set("token", "ok");
        assert_eq!(store.get::<String>("token").as_deref(), Some("ok"));

        let _ = std::fs::remove_file(&path);
    }
}
