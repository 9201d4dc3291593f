//! 核心原语：错误、任务事件、事件总线、取消信号组合

pub mod bus;
pub mod error;
pub mod events;
pub mod signal;

pub use bus::{BusItem, TaskEventBus, TaskStream};
pub use error::AgentError;
pub use events::{accumulate, CancelReason, TaskEvent, TokenUsage};
pub use signal::{SignalGuard, TaskSignal};

use std::sync::{Mutex, MutexGuard};

/// 取锁；持锁区内不会 panic，中毒时直接取回内部状态
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_recovers_poisoned_mutex() {
        let m = std::sync::Arc::new(Mutex::new(1));
        let poisoner = m.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());
        *lock(&m) += 1;
        assert_eq!(*lock(&m), 2);
    }
}
