//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及任务生命周期管理。

mod browser;
mod core;
mod extract;
mod spider;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

use crate::core::config::AppConfig;
use crate::core::event::create_event_channel;
use crate::spider::NovelSpider;
use crate::ui::{Ui, get_multi};

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about = "小说爬虫：渲染动态目录页，逐章抓取并保存为 TXT")]
struct Cli {
    /// 小说目录页 URL（例如 http://www.xbiqushu.com/8_8426/）
    url: Url,

    /// 输出目录，缺省时取配置中的 output.dir
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    // 依赖项初始化与注入 (Dependency Injection)
    let config = Arc::new(AppConfig::load()?);
    let cli = Cli::parse();

    let output_dir = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));

    // 建立 UI 事件反馈链路 (Event feedback loop)
    let (event_sender, event_receiver) = create_event_channel();
    let ui_handle = Ui::run(event_receiver);

    let result = NovelSpider::new(config, cli.url, event_sender)
        .run(&output_dir)
        .await;

    // 任务结束后发送端随 NovelSpider 一并释放，UI 循环自行退出
    let _ = ui_handle.await;

    match result {
        Ok(path) => {
            tracing::info!("任务完成: {}", path.display());
            Ok(())
        }
        Err(e) => {
            if e.is_environment() {
                eprintln!("浏览器启动失败: {}", e);
                eprintln!("请确认已安装 Chrome/Chromium，");
                eprintln!("或在 config.toml 的 [browser] 中通过 chrome_path 指定可执行文件路径。");
            }
            Err(e.into())
        }
    }
}
