//! 任务事件总线
//!
//! 每个任务一条总线、一个生产者（任务循环）。订阅者各持有一个无界 mpsc 接收端，
//! 事件按 emit 顺序逐个推送，不做批量与重排。总线恰好终止一次：
//! 终止事件（Completed / Cancelled）、错误（fail）或无事件的 complete；终止后的事件被丢弃。

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::core::{AgentError, TaskEvent};

/// 订阅者收到的条目：事件或终止错误
pub type BusItem = Result<TaskEvent, Arc<AgentError>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BusStatus {
    Open,
    Completed,
    Errored,
}

struct BusState {
    status: BusStatus,
    subscribers: Vec<mpsc::UnboundedSender<BusItem>>,
}

/// 单生产者事件总线；Clone 共享同一状态
#[derive(Clone)]
pub struct TaskEventBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for TaskEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskEventBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                status: BusStatus::Open,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // 持锁期间只做 Vec 操作与 unbounded send
        crate::core::lock(&self.state)
    }

    /// 订阅；总线已终止时返回立即结束的流
    pub fn subscribe(&self) -> TaskStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if state.status == BusStatus::Open {
            state.subscribers.push(tx);
        }
        TaskStream { rx }
    }

    /// 发布事件；终止事件会同时关闭总线
    pub fn emit(&self, event: TaskEvent) {
        let mut state = self.lock();
        if state.status != BusStatus::Open {
            tracing::debug!(?event, "event dropped: bus already terminated");
            return;
        }
        let terminal = event.is_terminal();
        Self::broadcast(&mut state, Ok(event));
        if terminal {
            Self::close(&mut state, BusStatus::Completed);
        }
    }

    /// 以错误终止总线
    pub fn fail(&self, error: AgentError) {
        let mut state = self.lock();
        if state.status != BusStatus::Open {
            tracing::debug!(%error, "error dropped: bus already terminated");
            return;
        }
        tracing::warn!(%error, "task failed");
        Self::broadcast(&mut state, Err(Arc::new(error)));
        Self::close(&mut state, BusStatus::Errored);
    }

    /// 正常关闭（幂等；已错误终止时不改变状态）
    pub fn complete(&self) {
        let mut state = self.lock();
        if state.status == BusStatus::Open {
            Self::close(&mut state, BusStatus::Completed);
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.lock().status != BusStatus::Open
    }

    pub fn is_errored(&self) -> bool {
        self.lock().status == BusStatus::Errored
    }

    fn broadcast(state: &mut BusState, item: BusItem) {
        // 接收端已丢弃的订阅者顺手移除
        state.subscribers.retain(|tx| tx.send(item.clone()).is_ok());
    }

    fn close(state: &mut BusState, status: BusStatus) {
        state.status = status;
        state.subscribers.clear();
    }
}

/// 调用方持有的事件流；在终止条目之后结束
#[derive(Debug)]
pub struct TaskStream {
    rx: mpsc::UnboundedReceiver<BusItem>,
}

impl TaskStream {
    pub async fn recv(&mut self) -> Option<BusItem> {
        self.rx.recv().await
    }

    /// 读完整个流；返回所有事件与可能的终止错误
    pub async fn collect_all(mut self) -> (Vec<TaskEvent>, Option<Arc<AgentError>>) {
        let mut events = Vec::new();
        while let Some(item) = self.rx.recv().await {
            match item {
                Ok(ev) => events.push(ev),
                Err(e) => return (events, Some(e)),
            }
        }
        (events, None)
    }
}

impl Stream for TaskStream {
    type Item = BusItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
