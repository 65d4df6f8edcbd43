//! 书籍抓取编排器 (Book Orchestrator)
//!
//! 串联渲染器与提取器：目录页 → 书名 + 章节列表（轮询）→ 逐章抓取 → TXT 落盘。
//! 渲染器在 [`NovelSpider::run_with`] 作用域内独占持有，所有退出路径都恰好释放一次。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{BrowserRenderer, Renderer};
use crate::core::config::AppConfig;
use crate::core::error::{Result, SpiderError};
use crate::core::event::{EventSender, SpiderEvent};
use crate::core::model::{Book, Chapter, chapter_block};
use crate::extract;

/// 小说抓取任务
pub struct NovelSpider {
    config: Arc<AppConfig>,
    events: EventSender,
    book: Book,
}

impl NovelSpider {
    pub fn new(config: Arc<AppConfig>, book_url: Url, events: EventSender) -> Self {
        Self {
            config,
            events,
            book: Book::new(book_url),
        }
    }

    /// 执行完整抓取流程，返回输出文件路径
    pub async fn run(self, output_dir: &Path) -> Result<PathBuf> {
        let renderer = BrowserRenderer::launch(&self.config).await?;
        self.run_with(renderer, output_dir).await
    }

    /// 在给定渲染器上执行抓取流程
    ///
    /// 渲染器在本方法内独占持有，无论成败都显式关闭且只关闭一次。
    pub async fn run_with<R: Renderer>(
        mut self,
        mut renderer: R,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let result = self.scrape(&mut renderer, output_dir).await;

        if let Err(e) = renderer.close().await {
            debug!("关闭浏览器时发生非致命错误: {}", e);
        }

        if let Err(ref e) = result {
            self.events.emit(SpiderEvent::TaskFailed {
                error: e.to_string(),
            });
        }
        result
    }

    async fn scrape<R: Renderer>(
        &mut self,
        renderer: &mut R,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        self.get_novel_info(renderer).await?;
        let path = self.save_novel(renderer, output_dir).await?;
        self.events.emit(SpiderEvent::TaskCompleted {
            path: path.display().to_string(),
        });
        Ok(path)
    }

    /// 获取书名与章节列表
    ///
    /// 成功条件：书名来源可达且至少找到一个章节；
    /// 轮询耗尽仍为空列表属于书籍级提取失败，此时尚未写出任何文件。
    pub async fn get_novel_info<R: Renderer>(&mut self, renderer: &mut R) -> Result<()> {
        info!("正在获取小说信息: {}", self.book.source_url);
        let html = renderer.render(self.book.source_url.as_str()).await?;
        self.book.name = extract::extract_title(&html, &self.book.source_url);
        info!("小说名称: {}", self.book.name);
        self.events
            .task_started(&self.book.name, self.book.source_url.as_str());

        // 章节列表可能由客户端脚本延迟填充，轮询重取快照
        let base = self.book.source_url.clone();
        let chapters = await_chapters_ready(
            renderer,
            &base,
            self.config.poll_interval(),
            self.config.spider.max_poll_attempts,
        )
        .await?;

        if chapters.is_empty() {
            return Err(SpiderError::ExtractionEmpty(format!(
                "目录页未找到章节列表: {}",
                self.book.source_url
            )));
        }

        info!("找到 {} 个章节", chapters.len());
        self.events.emit(SpiderEvent::ChaptersDiscovered {
            total: chapters.len(),
        });
        self.book.chapters = chapters;
        Ok(())
    }

    /// 获取单章正文
    ///
    /// 只有渲染器级失败（导航超时、页面崩溃）才返回错误；
    /// 页面结构不符时返回 `None`，由保存流程写入占位文本。
    pub async fn get_chapter_content<R: Renderer>(
        &self,
        renderer: &mut R,
        url: &str,
    ) -> Result<Option<String>> {
        let html = renderer.render(url).await?;
        Ok(extract::extract_chapter_body(&html))
    }

    /// 逐章下载并写入 TXT 文件
    ///
    /// 单章失败以占位文本记录后继续，不中断后续章节；
    /// 文件头写出即视为整体成功的基础。
    pub async fn save_novel<R: Renderer>(
        &self,
        renderer: &mut R,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        fs::create_dir_all(output_dir).await?;
        let path = self.book.output_path(output_dir);
        info!("开始下载章节内容，保存路径: {}", path.display());

        let mut file = fs::File::create(&path).await?;
        file.write_all(self.book.header().as_bytes()).await?;

        let total = self.book.chapters.len();
        let delay = self.config.chapter_delay();

        for (idx, chapter) in self.book.chapters.iter().enumerate() {
            let current = idx + 1;
            self.events.chapter_progress(current, &chapter.title);
            info!("[{}/{}] {}", current, total, chapter.title);

            // 礼貌性限流，下限见 MIN_CHAPTER_DELAY_MS
            sleep(delay).await;

            let content = match self.get_chapter_content(renderer, &chapter.url).await {
                Ok(Some(text)) => Some(text),
                Ok(None) => {
                    warn!("未提取到正文: {}", chapter.title);
                    self.events
                        .chapter_failed(current, &chapter.title, "未提取到正文");
                    None
                }
                Err(e) => {
                    warn!("章节获取失败: {} ({})", chapter.title, e);
                    self.events
                        .chapter_failed(current, &chapter.title, e.to_string());
                    None
                }
            };

            file.write_all(chapter_block(&chapter.title, content.as_deref()).as_bytes())
                .await?;
        }

        file.flush().await?;
        info!("下载完成，文件已保存到: {}", path.display());
        Ok(path)
    }
}

/// 轮询等待章节列表就绪
///
/// 单线程协作式等待：每轮重取渲染快照并尝试提取，拿到非空结果立即返回；
/// 轮询次数耗尽后返回空列表，失败语义由调用方决定。
pub async fn await_chapters_ready<R: Renderer>(
    renderer: &mut R,
    base: &Url,
    poll_interval: Duration,
    max_attempts: u32,
) -> Result<Vec<Chapter>> {
    for attempt in 1..=max_attempts {
        let html = renderer.snapshot().await?;
        let chapters = extract::extract_chapters(&html, base);
        if !chapters.is_empty() {
            return Ok(chapters);
        }

        debug!("章节列表为空，等待重试 ({}/{})", attempt, max_attempts);
        if attempt < max_attempts {
            sleep(poll_interval).await;
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::core::config::SpiderConfig;
    use crate::core::event::create_event_channel;
    use crate::core::model::FAILED_CONTENT_SENTINEL;

    const LIST_HTML: &str = r#"<div class="chapter-list"><a href="/c/1">第一章 开端</a></div>"#;

    const INDEX_HTML: &str = r#"<html><body>
        <h1>测试书名</h1>
        <div class="chapter-list">
            <a href="/c/1">第一章 开端</a>
            <a href="/c/2">第二章 发展</a>
        </div>
    </body></html>"#;

    /// 渲染器替身：固定的 URL → 页面映射，外加可排队的快照序列
    struct FakeRenderer {
        pages: HashMap<String, String>,
        snapshots: Vec<String>,
        last: String,
        fail_snapshot: bool,
        snapshot_calls: Arc<AtomicU32>,
        close_calls: Arc<AtomicU32>,
    }

    impl FakeRenderer {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.to_string()))
                    .collect(),
                snapshots: Vec::new(),
                last: String::new(),
                fail_snapshot: false,
                snapshot_calls: Arc::new(AtomicU32::new(0)),
                close_calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl Renderer for FakeRenderer {
        async fn render(&mut self, url: &str) -> Result<String> {
            match self.pages.get(url) {
                Some(html) => {
                    self.last = html.clone();
                    Ok(html.clone())
                }
                None => Err(SpiderError::Navigation(format!("unreachable: {url}"))),
            }
        }

        async fn snapshot(&mut self) -> Result<String> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_snapshot {
                return Err(SpiderError::Navigation("page crashed".into()));
            }
            if self.snapshots.is_empty() {
                Ok(self.last.clone())
            } else {
                Ok(self.snapshots.remove(0))
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    fn test_config() -> Arc<AppConfig> {
        Arc::new(
            AppConfig::builder()
                .spider(
                    SpiderConfig::builder()
                        .poll_interval_ms(0)
                        .max_poll_attempts(2)
                        .chapter_delay_ms(0)
                        .build(),
                )
                .build(),
        )
    }

    #[tokio::test]
    async fn poll_returns_on_first_non_empty_attempt() {
        let mut renderer = FakeRenderer::new(&[]);
        renderer.snapshots = vec![
            "<html></html>".to_string(),
            "<html></html>".to_string(),
            LIST_HTML.to_string(),
        ];
        let calls = renderer.snapshot_calls.clone();

        let chapters = await_chapters_ready(&mut renderer, &base(), Duration::ZERO, 5)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "第一章 开端");
        assert_eq!(chapters[0].url, "https://example.com/c/1");
    }

    #[tokio::test]
    async fn poll_exhausts_cleanly_when_always_empty() {
        let mut renderer = FakeRenderer::new(&[]);
        renderer.last = "<html></html>".to_string();
        let calls = renderer.snapshot_calls.clone();

        let chapters = await_chapters_ready(&mut renderer, &base(), Duration::ZERO, 4)
            .await
            .unwrap();

        assert!(chapters.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn poll_propagates_renderer_errors() {
        let mut renderer = FakeRenderer::new(&[]);
        renderer.fail_snapshot = true;

        let result = await_chapters_ready(&mut renderer, &base(), Duration::ZERO, 3).await;

        assert!(matches!(result, Err(SpiderError::Navigation(_))));
    }

    #[tokio::test]
    async fn renderer_released_exactly_once_when_no_chapters_found() {
        let dir = std::env::temp_dir().join(format!("novel-spider-empty-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let index_url = "https://example.com/book/9_9001/";
        let renderer = FakeRenderer::new(&[(index_url, "<html><body><h1>测试书名</h1></body></html>")]);
        let close_calls = renderer.close_calls.clone();

        let (events, _rx) = create_event_channel();
        let spider = NovelSpider::new(test_config(), Url::parse(index_url).unwrap(), events);
        let result = spider.run_with(renderer, &dir).await;

        assert!(matches!(result, Err(SpiderError::ExtractionEmpty(_))));
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
        // 章节列表为空时不得创建任何输出
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn failed_chapter_gets_placeholder_and_later_chapters_survive() {
        let dir = std::env::temp_dir().join(format!("novel-spider-save-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let index_url = "https://example.com/book/8_8426/";
        let body = "正文内容。".repeat(60);
        let chapter_two = format!(r#"<html><body><div id="content">{body}</div></body></html>"#);
        // /c/1 缺席：导航失败降级为占位文本，后续章节照常写出
        let renderer = FakeRenderer::new(&[
            (index_url, INDEX_HTML),
            ("https://example.com/c/2", &chapter_two),
        ]);
        let close_calls = renderer.close_calls.clone();

        let (events, _rx) = create_event_channel();
        let spider = NovelSpider::new(test_config(), Url::parse(index_url).unwrap(), events);
        let path = spider.run_with(renderer, &dir).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("测试书名\n\n"));
        assert!(text.contains(&"=".repeat(50)));

        let first = text.find("第一章 开端").unwrap();
        let sentinel = text.find(FAILED_CONTENT_SENTINEL).unwrap();
        let second = text.find("第二章 发展").unwrap();
        let content = text.find("正文内容。").unwrap();
        assert!(first < sentinel);
        assert!(sentinel < second);
        assert!(second < content);

        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
