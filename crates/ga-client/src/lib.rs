pub mod notify;
pub mod request;

// 重新导出核心类型
pub use notify::{Notifier, RecordingNotifier, Toast, ToastQueue, ToastVariant, TracingNotifier};
pub use request::{ApiClient, Navigator, RecordingNavigator, RequestOptions};

pub use ga_error::{GaError, Result};
