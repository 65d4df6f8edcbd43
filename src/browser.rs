//! 浏览器服务 (Renderer)
//!
//! 封装 Chromium 会话的启动、导航渲染与快照获取，
//! 采用显式的所有权管理，确保关闭逻辑的确定性。

use std::path::Path;
use std::time::Duration;

use chromiumoxide::{
    Page,
    browser::{Browser, BrowserConfig},
};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::core::config::AppConfig;
use crate::core::error::{Result, SpiderError};

/// 浏览器会话
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl BrowserSession {
    /// 启动浏览器会话
    ///
    /// 启动失败归类为环境错误 ([`SpiderError::BrowserUnavailable`])，
    /// 与导航失败区分，入口层据此打印修复指引。
    pub async fn launch(config: &AppConfig) -> Result<Self> {
        let browser_config = build_browser_config(config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SpiderError::BrowserUnavailable(e.to_string()))?;

        // 启动 CDP 事件循环
        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler: Some(handle),
        })
    }

    /// 创建新页面
    pub async fn new_page(&self) -> Result<Page> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| SpiderError::BrowserUnavailable("Browser already closed".into()))?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| SpiderError::BrowserUnavailable(e.to_string()))
    }

    /// 导航到目标地址并等待渲染完成
    ///
    /// 渲染等待覆盖客户端脚本填充动态内容的窗口期，超时归类为导航失败。
    pub async fn goto_rendered(
        &self,
        page: &Page,
        url: &str,
        nav_timeout: Duration,
        render_wait: Duration,
    ) -> Result<()> {
        timeout(nav_timeout, async {
            page.goto(url)
                .await
                .map_err(|e| SpiderError::Navigation(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| SpiderError::Navigation(e.to_string()))?;
            Ok::<(), SpiderError>(())
        })
        .await
        .map_err(|_| SpiderError::Navigation(format!("navigation timeout: {}", url)))??;

        sleep(render_wait).await;
        Ok(())
    }

    /// 获取当前 DOM 快照
    pub async fn snapshot(page: &Page) -> Result<String> {
        page.content()
            .await
            .map_err(|e| SpiderError::Navigation(e.to_string()))
    }

    /// 优雅关闭浏览器，并等待事件循环结束
    pub async fn close(&mut self) -> Result<()> {
        let browser = self.browser.take();
        let handler = self.handler.take();

        if let Some(mut b) = browser {
            let _ = b.close().await;
            if let Some(h) = handler {
                let _ = h.await;
            }
        }
        Ok(())
    }
}

/// 渲染器接口 (Renderer Seam)
///
/// 编排层只依赖导航渲染、快照重取与关闭三个动作，测试中可注入替身实现。
pub trait Renderer {
    /// 导航到目标地址，等待渲染完成后返回 DOM 快照
    async fn render(&mut self, url: &str) -> Result<String>;

    /// 重取当前页面快照，不触发导航
    async fn snapshot(&mut self) -> Result<String>;

    /// 释放渲染器资源
    async fn close(&mut self) -> Result<()>;
}

/// 默认渲染器：Chromium 会话加单个工作页面
pub struct BrowserRenderer {
    session: BrowserSession,
    page: Page,
    nav_timeout: Duration,
    render_wait: Duration,
}

impl BrowserRenderer {
    /// 启动浏览器并打开工作页面
    pub async fn launch(config: &AppConfig) -> Result<Self> {
        let session = BrowserSession::launch(config).await?;
        let page = session.new_page().await?;
        Ok(Self {
            session,
            page,
            nav_timeout: config.nav_timeout(),
            render_wait: config.render_wait(),
        })
    }
}

impl Renderer for BrowserRenderer {
    async fn render(&mut self, url: &str) -> Result<String> {
        self.session
            .goto_rendered(&self.page, url, self.nav_timeout, self.render_wait)
            .await?;
        BrowserSession::snapshot(&self.page).await
    }

    async fn snapshot(&mut self) -> Result<String> {
        BrowserSession::snapshot(&self.page).await
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }
}

/// 构建浏览器配置
fn build_browser_config(config: &AppConfig) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--no-sandbox")
        .arg("--window-size=1920,1080")
        .arg("--disable-extensions");

    if config.browser.headless {
        builder = builder.arg("--headless=new");
    } else {
        builder = builder.with_head();
    }

    let chrome_path = if let Some(path) = &config.browser.chrome_path {
        Some(path.clone())
    } else {
        [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
    };

    if let Some(path) = chrome_path {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(SpiderError::BrowserUnavailable)
}

// 在 Drop 时尝试最后一次保护性关闭
impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            let mut browser = self.browser.take().unwrap();
            let handler = self.handler.take();
            debug!("浏览器会话未显式关闭，转入后台清理");
            tokio::spawn(async move {
                let _ = browser.close().await;
                if let Some(h) = handler {
                    let _ = h.await;
                }
            });
        }
    }
}
