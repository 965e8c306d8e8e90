pub mod clock;
pub mod config;
pub mod models;
pub mod storage;
pub mod tree;

// 重新导出核心类型
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use models::{ApiEnvelope, LoginData, MenuEntry, Principal, Session, StoreKey};
pub use storage::{FileBackend, KeyValueStore, MemoryBackend, StorageBackend};
pub use tree::{build_tree, build_tree_typed, flatten_tree, TreeConfig, TreeRecord};

pub use ga_error::{GaError as Error, Result};
