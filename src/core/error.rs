//! 错误处理体系 (Error Handling System)
//!
//! 定义领域相关的错误类型以及全局 Result 别名。

use thiserror::Error;

/// 全局错误定义 (Spider Domain Errors)
#[derive(Error, Debug)]
pub enum SpiderError {
    /// 浏览器引擎缺失或启动失败，整个任务无法继续
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    /// 页面导航失败（超时、连接中断、页面崩溃）
    ///
    /// 对单章抓取而言会降级为占位文本，对目录页而言是致命的。
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// 所有启发式层级均未提取到结果
    #[error("Extraction empty: {0}")]
    ExtractionEmpty(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, SpiderError>;

impl SpiderError {
    /// 判定是否为浏览器环境级别的错误
    ///
    /// 入口层据此打印修复指引（安装 Chrome / 指定 chrome_path）。
    pub fn is_environment(&self) -> bool {
        matches!(self, SpiderError::BrowserUnavailable(_))
    }
}
