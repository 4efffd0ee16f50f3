//! Toast notifications for user-facing action results.

use parking_lot::Mutex;

/// Toast severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    /// Action succeeded.
    Success,
    /// Action failed.
    Error,
    /// Neutral information.
    Info,
}

/// One toast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    /// Id for dismissal.
    pub id: u64,
    /// Severity.
    pub kind: ToastKind,
    /// Display text.
    pub message: String,
}

#[derive(Debug, Default)]
struct Queue {
    next_id: u64,
    toasts: Vec<Toast>,
}

/// Visible toasts, oldest first.
#[derive(Debug, Default)]
pub struct Notifications {
    queue: Mutex<Queue>,
}

impl Notifications {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a toast. Returns its id.
    pub fn push(&self, kind: ToastKind, message: impl Into<String>) -> u64 {
        let mut queue = self.queue.lock();
        queue.next_id += 1;
        let id = queue.next_id;
        queue.toasts.push(Toast {
            id,
            kind,
            message: message.into(),
        });
        id
    }

    /// Show an error toast.
    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Error, message)
    }

    /// Show a success toast.
    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Success, message)
    }

    /// Dismiss a toast. Returns whether it was visible.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut queue = self.queue.lock();
        let before = queue.toasts.len();
        queue.toasts.retain(|t| t.id != id);
        queue.toasts.len() != before
    }

    /// Visible toasts.
    pub fn list(&self) -> Vec<Toast> {
        self.queue.lock().toasts.clone()
    }

    /// Take every visible toast.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut self.queue.lock().toasts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_dismiss_drain() {
        let n = Notifications::new();
        let a = n.error("Failed to create task");
        let b = n.success("Task created");
        assert_ne!(a, b);
        assert_eq!(n.list().len(), 2);

        assert!(n.dismiss(a));
        assert!(!n.dismiss(a));

        let drained = n.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind, ToastKind::Success);
        assert!(n.list().is_empty());
    }
}
