//! 对话历史的唯一写入口
//!
//! 历史由 Agent 独占（Arc<RwLock<Vec<Message>>>），任务期间循环与拦截器都通过 HistoryWriter::push 追加：
//! 在写锁内完成追加与 MessageAppended 事件发布，保证事件顺序与历史变更顺序一致。

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::{TaskEvent, TaskEventBus};
use crate::memory::Message;

/// Agent 持有的共享历史
pub type SharedHistory = Arc<RwLock<Vec<Message>>>;

/// 绑定到某个任务事件总线的历史写入器
#[derive(Clone)]
pub struct HistoryWriter {
    messages: SharedHistory,
    bus: TaskEventBus,
}

impl HistoryWriter {
    pub fn new(messages: SharedHistory, bus: TaskEventBus) -> Self {
        Self { messages, bus }
    }

    /// 追加消息并发布 MessageAppended；返回其在历史中的位置
    pub async fn push(&self, message: Message) -> usize {
        let mut messages = self.messages.write().await;
        let index = messages.len();
        messages.push(message.clone());
        self.bus.emit(TaskEvent::MessageAppended { index, message });
        index
    }

    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_emits_matching_event() {
        let bus = TaskEventBus::new();
        let stream = bus.subscribe();
        let history: SharedHistory = Arc::new(RwLock::new(vec![Message::user_text("earlier")]));
        let writer = HistoryWriter::new(history.clone(), bus.clone());

        let index = writer.push(Message::user_text("now")).await;
        assert_eq!(index, 1);
        assert_eq!(writer.snapshot().await.len(), 2);
        bus.complete();

        let (events, _) = stream.collect_all().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            TaskEvent::MessageAppended { index, message } => {
                assert_eq!(*index, 1);
                assert_eq!(message.text(), "now");
                assert_eq!(&history.read().await[1], message);
            }
            other => panic!("Expected MessageAppended, got {other:?}"),
        }
    }
}
