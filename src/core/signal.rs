//! 信号组合：调用方取消信号 OR 内部超时
//!
//! 任一来源先触发即取消组合令牌，并记录先到者的原因（User / Timeout）；之后的触发不再生效。
//! SignalGuard 持有超时计时器与调用方监听任务，drop 时中止两者，任务结束后计时器不会再触发。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::CancelReason;

/// 单个任务的有效取消信号
#[derive(Clone, Debug)]
pub struct TaskSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl TaskSignal {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// 组合调用方信号与超时（None 或零时长表示不设超时）。须在 tokio 运行时内调用
    pub fn compose(
        caller: Option<CancellationToken>,
        timeout: Option<Duration>,
    ) -> (Self, SignalGuard) {
        let signal = Self::new();
        let mut guard = SignalGuard { tasks: Vec::new() };

        if let Some(caller) = caller {
            if caller.is_cancelled() {
                signal.trip(CancelReason::User);
            } else {
                let sig = signal.clone();
                guard.tasks.push(tokio::spawn(async move {
                    tokio::select! {
                        _ = caller.cancelled() => sig.trip(CancelReason::User),
                        _ = sig.token.cancelled() => {}
                    }
                }));
            }
        }

        if let Some(limit) = timeout.filter(|d| !d.is_zero()) {
            let sig = signal.clone();
            guard.tasks.push(tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        tracing::warn!(timeout_ms = limit.as_millis() as u64, "task timed out");
                        sig.trip(CancelReason::Timeout);
                    }
                    _ = sig.token.cancelled() => {}
                }
            }));
        }

        (signal, guard)
    }

    /// 触发取消；仅第一次生效
    pub fn trip(&self, reason: CancelReason) {
        if self.reason.set(reason).is_ok() {
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 先触发的来源；未触发时为 None
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// 交给模型流、工具等协作方的令牌
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// 计时器与监听任务的作用域守卫
pub struct SignalGuard {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_caller_signal_trips_with_user_reason() {
        let caller = CancellationToken::new();
        let (signal, _guard) = TaskSignal::compose(Some(caller.clone()), Some(Duration::from_secs(60)));
        assert!(!signal.is_cancelled());
        caller.cancel();
        signal.cancelled().await;
        assert_eq!(signal.reason(), Some(CancelReason::User));
    }

    #[tokio::test]
    async fn test_timeout_trips_with_timeout_reason() {
        let caller = CancellationToken::new();
        let (signal, _guard) = TaskSignal::compose(Some(caller.clone()), Some(Duration::from_millis(20)));
        signal.cancelled().await;
        assert_eq!(signal.reason(), Some(CancelReason::Timeout));
        // 之后调用方再触发不改变原因
        caller.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(signal.reason(), Some(CancelReason::Timeout));
    }

    #[tokio::test]
    async fn test_already_cancelled_caller_trips_immediately() {
        let caller = CancellationToken::new();
        caller.cancel();
        let (signal, _guard) = TaskSignal::compose(Some(caller), None);
        assert!(signal.is_cancelled());
        assert_eq!(signal.reason(), Some(CancelReason::User));
    }

    #[tokio::test]
    async fn test_dropping_guard_stops_timer() {
        let (signal, guard) = TaskSignal::compose(None, Some(Duration::from_millis(20)));
        drop(guard);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!signal.is_cancelled());
        assert_eq!(signal.reason(), None);
    }

    #[tokio::test]
    async fn test_zero_timeout_disables_timer() {
        let (signal, _guard) = TaskSignal::compose(None, Some(Duration::ZERO));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!signal.is_cancelled());
        assert_eq!(signal.reason(), None);
    }

    #[tokio::test]
    async fn test_trip_is_idempotent() {
        let (signal, _guard) = TaskSignal::compose(None, None);
        signal.trip(CancelReason::User);
        signal.trip(CancelReason::Timeout);
        assert_eq!(signal.reason(), Some(CancelReason::User));
    }
}
