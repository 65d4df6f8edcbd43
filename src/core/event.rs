//! 事件系统定义
//!
//! 用于抓取流程与 UI 之间的完全解耦通信

use flume::{Receiver, Sender};

/// Spider 事件类型
#[derive(Debug, Clone)]
pub enum SpiderEvent {
    /// 任务开始
    TaskStarted { title: String, url: String },

    /// 发现章节总数
    ChaptersDiscovered { total: usize },

    /// 章节下载进度（总数已由 ChaptersDiscovered 建立）
    ChapterProgress { current: usize, title: String },

    /// 章节下载失败（已用占位文本代替，流程继续）
    ChapterFailed {
        index: usize,
        title: String,
        error: String,
    },

    /// 任务完成
    TaskCompleted { path: String },

    /// 任务失败
    TaskFailed { error: String },
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<SpiderEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<SpiderEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件
    pub fn emit(&self, event: SpiderEvent) {
        let _ = self.tx.send(event);
    }

    /// 发送任务开始事件
    pub fn task_started(&self, title: &str, url: &str) {
        self.emit(SpiderEvent::TaskStarted {
            title: title.to_string(),
            url: url.to_string(),
        });
    }

    /// 发送章节进度事件
    pub fn chapter_progress(&self, current: usize, title: &str) {
        self.emit(SpiderEvent::ChapterProgress {
            current,
            title: title.to_string(),
        });
    }

    /// 发送章节失败事件
    pub fn chapter_failed(&self, index: usize, title: &str, error: impl Into<String>) {
        self.emit(SpiderEvent::ChapterFailed {
            index,
            title: title.to_string(),
            error: error.into(),
        });
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<SpiderEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<SpiderEvent>) -> Self {
        Self { rx }
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<SpiderEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
