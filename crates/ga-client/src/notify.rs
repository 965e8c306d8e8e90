use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// 提示类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Success,
    Error,
    Warning,
    Info,
}

/// 一条提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub variant: ToastVariant,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 合并展示的多条错误
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Toast {
    pub fn new(variant: ToastVariant, title: &str, message: &str) -> Self {
        Self {
            variant,
            title: title.to_string(),
            message: (!message.is_empty()).then(|| message.to_string()),
            errors: Vec::new(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self::new(ToastVariant::Error, "错误", message)
    }

    /// 合并后的错误提示：单条时直接显示内容，多条时列出全部
    pub fn collected(errors: Vec<String>) -> Self {
        if errors.len() == 1 {
            return Self::error(&errors[0]);
        }
        Self {
            variant: ToastVariant::Error,
            title: format!("发现 {} 个错误", errors.len()),
            message: None,
            errors,
        }
    }
}

/// 用户提示的输出端
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// 将提示写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        let message = toast.message.as_deref().unwrap_or("");
        match toast.variant {
            ToastVariant::Error => {
                error!(title = %toast.title, errors = ?toast.errors, "{}", message)
            }
            ToastVariant::Warning => warn!(title = %toast.title, "{}", message),
            ToastVariant::Success | ToastVariant::Info => {
                info!(title = %toast.title, "{}", message)
            }
        }
    }
}

/// 记录收到的提示，供测试断言
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(toast);
    }
}

#[derive(Debug, Default)]
struct QueueState {
    showing: bool,
    pending: Vec<String>,
}

/// 同一时间只显示一条提示
///
/// 显示期间到达的错误消息去重后暂存，当前提示关闭时合并成一条展示；
/// 其它类型的提示直接丢弃。
pub struct ToastQueue {
    inner: Arc<dyn Notifier>,
    state: Mutex<QueueState>,
}

impl ToastQueue {
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self {
            inner,
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 显示提示，返回是否真正展示
    pub fn show(&self, toast: Toast) -> bool {
        {
            let mut state = self.lock();
            if state.showing {
                if toast.variant == ToastVariant::Error {
                    if let Some(message) = toast.message {
                        if !state.pending.contains(&message) {
                            state.pending.push(message);
                        }
                    }
                }
                return false;
            }
            state.showing = true;
        }
        self.inner.notify(toast);
        true
    }

    pub fn is_showing(&self) -> bool {
        self.lock().showing
    }

    pub fn pending(&self) -> Vec<String> {
        self.lock().pending.clone()
    }

    /// 关闭当前提示，有暂存错误时合并展示
    pub fn close(&self) {
        let pending = {
            let mut state = self.lock();
            state.showing = false;
            std::mem::take(&mut state.pending)
        };
        if !pending.is_empty() {
            self.show(Toast::collected(pending));
        }
    }

    /// 当前没有提示在显示时，立即展示暂存的错误
    pub fn flush(&self) -> bool {
        let pending = {
            let mut state = self.lock();
            if state.showing || state.pending.is_empty() {
                return false;
            }
            std::mem::take(&mut state.pending)
        };
        self.show(Toast::collected(pending))
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, toast: Toast) {
        self.show(toast);
    }
}
