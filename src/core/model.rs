//! 领域数据模型与输出格式
//!
//! Book/Chapter 仅在单次运行内存活，唯一持久化产物是 TXT 输出文件。

use std::path::{Path, PathBuf};

use url::Url;

use crate::utils::sanitize_filename;

/// 正文获取失败时写入的占位文本
pub const FAILED_CONTENT_SENTINEL: &str = "[内容获取失败]";

/// 书名所有启发式均未命中时的兜底名称
pub const UNKNOWN_NOVEL_NAME: &str = "未知小说书名";

/// 书名与章节之间的分隔线宽度
const SEPARATOR_WIDTH: usize = 50;

/// 章节信息
///
/// `url` 为已解析的绝对地址，顺序即目录页中的文档顺序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub url: String,
}

/// 一本书的抓取单元
#[derive(Debug, Clone)]
pub struct Book {
    pub name: String,
    pub source_url: Url,
    pub chapters: Vec<Chapter>,
}

impl Book {
    pub fn new(source_url: Url) -> Self {
        Self {
            name: String::new(),
            source_url,
            chapters: Vec::new(),
        }
    }

    /// 输出文件路径（书名净化后加 .txt 后缀）
    pub fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.txt", sanitize_filename(&self.name)))
    }

    /// 文件头：书名、空行、50 字符分隔线、空行
    pub fn header(&self) -> String {
        format!("{}\n\n{}\n\n", self.name, "=".repeat(SEPARATOR_WIDTH))
    }
}

/// 单章的输出块
///
/// 正文缺失时以占位文本代替，保证章节顺序在文件中完整保留。
pub fn chapter_block(title: &str, content: Option<&str>) -> String {
    match content {
        Some(text) => format!("\n\n{}\n\n{}\n", title, text),
        None => format!("\n\n{}\n\n{}\n", title, FAILED_CONTENT_SENTINEL),
    }
}
