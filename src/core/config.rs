//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化及其层级结构映射，所有字段均有默认值回退。

use std::path::Path;
use std::time::Duration;

use bon::Builder;
use config::{Config, File};
use serde::Deserialize;

use crate::core::error::{Result, SpiderError};

/// 章节间礼貌性延迟的下限（毫秒）
///
/// 配置值低于该下限时按下限执行，限流策略必须可见且不可静默调低。
pub const MIN_CHAPTER_DELAY_MS: u64 = 200;

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AppConfig {
    /// 自动化浏览器 (Chromium) 相关配置
    #[serde(default)]
    #[builder(default)]
    pub browser: BrowserConfig,

    /// 抓取流程通用参数
    #[serde(default)]
    #[builder(default)]
    pub spider: SpiderConfig,

    /// 输出相关配置
    #[serde(default)]
    #[builder(default)]
    pub output: OutputConfig,
}

/// 浏览器引擎配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct BrowserConfig {
    /// 是否以无头模式 (Headless) 运行
    #[serde(default = "default_headless")]
    #[builder(default = default_headless())]
    pub headless: bool,

    /// 自定义可执行文件路径
    pub chrome_path: Option<String>,

    /// 单次导航超时（秒）
    #[serde(default = "default_nav_timeout_secs")]
    #[builder(default = default_nav_timeout_secs())]
    pub nav_timeout_secs: u64,

    /// 导航完成后等待动态内容渲染的时间（毫秒）
    #[serde(default = "default_render_wait_ms")]
    #[builder(default = default_render_wait_ms())]
    pub render_wait_ms: u64,
}

/// 抓取流程参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct SpiderConfig {
    /// 章节列表轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    #[builder(default = default_poll_interval_ms())]
    pub poll_interval_ms: u64,

    /// 章节列表轮询次数上限
    #[serde(default = "default_max_poll_attempts")]
    #[builder(default = default_max_poll_attempts())]
    pub max_poll_attempts: u32,

    /// 章节间延迟（毫秒），低于 [`MIN_CHAPTER_DELAY_MS`] 时按下限执行
    #[serde(default = "default_chapter_delay_ms")]
    #[builder(default = default_chapter_delay_ms())]
    pub chapter_delay_ms: u64,
}

/// 输出配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct OutputConfig {
    /// TXT 文件输出目录
    #[serde(default = "default_output_dir")]
    #[builder(default = default_output_dir())]
    pub dir: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            nav_timeout_secs: default_nav_timeout_secs(),
            render_wait_ms: default_render_wait_ms(),
        }
    }
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            chapter_delay_ms: default_chapter_delay_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_headless() -> bool {
    true
}
fn default_nav_timeout_secs() -> u64 {
    30
}
fn default_render_wait_ms() -> u64 {
    3000
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_max_poll_attempts() -> u32 {
    10
}
fn default_chapter_delay_ms() -> u64 {
    500
}
fn default_output_dir() -> String {
    "novels".to_string()
}

impl AppConfig {
    /// 从文件系统中加载并解析配置
    ///
    /// `config.toml` 不存在时回退到全量默认值。
    pub fn load() -> Result<Self> {
        let config_path = Path::new("config.toml");
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder.build().map_err(SpiderError::Config)?;
        settings.try_deserialize().map_err(SpiderError::Config)
    }

    /// 导航超时
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.nav_timeout_secs)
    }

    /// 渲染等待
    pub fn render_wait(&self) -> Duration {
        Duration::from_millis(self.browser.render_wait_ms)
    }

    /// 轮询间隔
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.spider.poll_interval_ms)
    }

    /// 章节间延迟，带下限钳制
    pub fn chapter_delay(&self) -> Duration {
        Duration::from_millis(self.spider.chapter_delay_ms.max(MIN_CHAPTER_DELAY_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_from_empty_source() {
        let cfg: AppConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(cfg.browser.headless);
        assert_eq!(cfg.spider.max_poll_attempts, 10);
        assert_eq!(cfg.output.dir, "novels");
    }

    #[test]
    fn chapter_delay_clamps_to_floor() {
        let cfg = AppConfig::builder()
            .spider(SpiderConfig::builder().chapter_delay_ms(0).build())
            .build();
        assert_eq!(
            cfg.chapter_delay(),
            Duration::from_millis(MIN_CHAPTER_DELAY_MS)
        );
    }
}
