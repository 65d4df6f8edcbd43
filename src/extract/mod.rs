//! 结构化提取器 (Structural Extractor)
//!
//! 将任意 HTML 快照转换为书名、章节列表或章节正文，
//! 采用"定向选择器级联 + 通用模式回退"的分层启发式，单层失败不致命。
//!
//! 所有函数接收 `&str` 快照并在同步作用域内完成解析，
//! `scraper::Html` 不跨 await 持有。

mod selectors;

use indexmap::IndexMap;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

use crate::core::model::{Chapter, UNKNOWN_NOVEL_NAME};
use crate::utils::{sanitize_filename, to_absolute_url};

pub use selectors::{BRAND_EXCLUDES, NAV_EXCLUDES, Selectors};

/// 定向正文选择器的最小可信文本长度（字符）
const MIN_CONTENT_CHARS: usize = 200;
/// 最大文本块回退的最小可信文本长度（字符）
const MIN_FALLBACK_CHARS: usize = 500;
/// 正文块内允许的最大链接数，超出视为导航区域
const MAX_FALLBACK_LINKS: usize = 10;

/// 父容器类名/ID 中的章节列表特征词
const PARENT_HINTS: &[&str] = &["list", "chapter", "book", "content"];
/// 块级元素类名/ID 中的正文特征词
const CONTENT_HINTS: &[&str] = &["content", "text", "chapter", "novel", "read", "book"];

/// 提取书名
///
/// 依次尝试：结构化标题候选选择器、`<title>` 去站名后缀、
/// URL 中的书籍 ID、兜底常量。结果已做文件名净化。
pub fn extract_title(html: &str, source_url: &Url) -> String {
    let doc = Html::parse_document(html);
    let s = Selectors::get();

    for (pattern, sel) in &s.title_candidates {
        let Some(el) = doc.select(sel).next() else {
            continue;
        };
        let raw = el.text().collect::<String>();
        if let Some(name) = clean_title_candidate(&raw) {
            debug!(selector = *pattern, name = %name, "书名选择器命中");
            return sanitize_filename(&name);
        }
    }

    if let Some(name) = title_from_document_title(&doc) {
        debug!(name = %name, "从 title 标签提取书名");
        return sanitize_filename(&name);
    }

    name_from_url(source_url).unwrap_or_else(|| UNKNOWN_NOVEL_NAME.to_string())
}

/// 提取章节列表
///
/// 两层策略，每页只生效一层：定向选择器一旦命中任意锚点即为权威结果，
/// 不再进入通用回退。两层都落空时返回空列表（合法结果，由调用方轮询）。
pub fn extract_chapters(html: &str, base: &Url) -> Vec<Chapter> {
    let doc = Html::parse_document(html);
    let s = Selectors::get();

    for (pattern, sel) in &s.chapter_candidates {
        let anchors = doc.select(sel).collect::<Vec<_>>();
        if anchors.is_empty() {
            continue;
        }
        debug!(selector = *pattern, anchors = anchors.len(), "章节列表选择器命中");
        return collect_chapters(anchors.into_iter(), base);
    }

    let picked = doc
        .select(&s.any_anchor)
        .filter(is_generic_chapter_link)
        .collect::<Vec<_>>();
    if !picked.is_empty() {
        debug!(anchors = picked.len(), "通用回退找到可能的章节链接");
    }
    collect_chapters(picked.into_iter(), base)
}

/// 提取章节正文
///
/// 定向容器级联优先；落空后退到"最大文本块"启发式
/// （内容特征块级元素中文本量最大、链接稀少者）。
/// 无可信正文块时返回 `None`，由调用方写入占位文本。
pub fn extract_chapter_body(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let s = Selectors::get();

    for (pattern, sel) in &s.content_candidates {
        if let Some(el) = doc.select(sel).next() {
            let text = el.text().collect::<String>();
            let text = text.trim();
            if text.chars().count() > MIN_CONTENT_CHARS {
                debug!(selector = *pattern, "正文容器选择器命中");
                return Some(normalize_whitespace(text));
            }
        }
    }

    let flavored = doc
        .select(&s.block)
        .filter(is_content_flavored)
        .collect::<Vec<_>>();
    let candidates = if flavored.is_empty() {
        doc.select(&s.any_div).collect()
    } else {
        flavored
    };

    candidates
        .into_iter()
        .filter_map(|el| {
            let text = el.text().collect::<String>().trim().to_string();
            let len = text.chars().count();
            let links = el.select(&s.any_anchor).count();
            (len > MIN_FALLBACK_CHARS && links < MAX_FALLBACK_LINKS).then_some((len, text))
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, text)| normalize_whitespace(&text))
}

/// 收集锚点为章节条目：解析绝对地址、按 URL 去重并保留首见顺序
fn collect_chapters<'a>(
    anchors: impl Iterator<Item = ElementRef<'a>>,
    base: &Url,
) -> Vec<Chapter> {
    let mut seen: IndexMap<String, String> = IndexMap::new();
    for a in anchors {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let title = a.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let url = to_absolute_url(base, href);
        if url.is_empty() {
            continue;
        }
        seen.entry(url).or_insert(title);
    }
    seen.into_iter()
        .map(|(url, title)| Chapter { title, url })
        .collect()
}

/// 净化书名候选：剔除品牌词、过短文本，含品牌词时切分保留书名部分
fn clean_title_candidate(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.chars().count() <= 1 || BRAND_EXCLUDES.contains(&text) {
        return None;
    }

    for brand in BRAND_EXCLUDES {
        if let Some((head, tail)) = text.split_once(brand) {
            let head = trim_separators(head);
            let kept = if head.is_empty() {
                trim_separators(tail)
            } else {
                head
            };
            if kept.chars().count() <= 1 || BRAND_EXCLUDES.contains(&kept) {
                return None;
            }
            return Some(kept.to_string());
        }
    }

    Some(text.to_string())
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '|'))
}

/// 从 `<title>` 标签提取书名：按常见分隔符切分，取首个有效段
fn title_from_document_title(doc: &Html) -> Option<String> {
    let s = Selectors::get();
    let raw = doc.select(&s.title_tag).next()?.text().collect::<String>();
    raw.split(['-', '_', '|']).find_map(clean_title_candidate)
}

/// 从 URL 的路径（含 SPA 的 fragment 路径）中提取数字书籍 ID
fn name_from_url(url: &Url) -> Option<String> {
    url.path()
        .split('/')
        .chain(url.fragment().unwrap_or("").split('/'))
        .filter(|seg| looks_like_book_id(seg))
        .last()
        .map(|id| format!("小说_{}", id))
}

/// 纯数字或下划线分隔的数字段，如 "1233"、"8_8426"
fn looks_like_book_id(seg: &str) -> bool {
    !seg.is_empty()
        && seg.chars().all(|c| c.is_ascii_digit() || c == '_')
        && seg.chars().any(|c| c.is_ascii_digit())
}

/// 通用回退的链接判定：URL 模式、文本模式或所在容器特征任一命中
fn is_generic_chapter_link(link: &ElementRef) -> bool {
    let text = link.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() || NAV_EXCLUDES.contains(&text) {
        return false;
    }
    let Some(href) = link.value().attr("href") else {
        return false;
    };

    if looks_like_chapter_href(href) || looks_like_chapter_title(text) {
        return true;
    }

    // 长度适中且落在列表类容器内的链接也纳入候选
    let len = text.chars().count();
    len > 2 && len < 50 && in_chapter_container(link)
}

/// URL 模式：含 "chapter"、"/book/"，或数字页面叶节点（123.html、8_8426.htm）
fn looks_like_chapter_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    if lower.contains("chapter") || lower.contains("/book/") {
        return true;
    }

    let path = lower.split(['?', '#']).next().unwrap_or("");
    let leaf = path.rsplit('/').next().unwrap_or("");
    let stem = leaf
        .strip_suffix(".html")
        .or_else(|| leaf.strip_suffix(".htm"));
    matches!(stem, Some(stem) if looks_like_book_id(stem))
}

/// 文本模式：第…章/第…节，或数字编号开头（"12、"、"12. "、"12 "）
fn looks_like_chapter_title(text: &str) -> bool {
    if text.contains('第') && (text.contains('章') || text.contains('节')) {
        return true;
    }

    let digits_end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if digits_end == 0 {
        return false;
    }
    let rest = &text[digits_end..];
    rest.starts_with('、') || rest.starts_with('.') || rest.starts_with(char::is_whitespace)
}

/// 父容器的 class/id 是否带有列表特征词
fn in_chapter_container(link: &ElementRef) -> bool {
    let Some(parent) = link.parent().and_then(ElementRef::wrap) else {
        return false;
    };
    attrs_contain_any(&parent, PARENT_HINTS)
}

/// 块级元素的 class/id 是否带有正文特征词
fn is_content_flavored(el: &ElementRef) -> bool {
    attrs_contain_any(el, CONTENT_HINTS)
}

fn attrs_contain_any(el: &ElementRef, hints: &[&str]) -> bool {
    let v = el.value();
    let mut hay = String::new();
    if let Some(class) = v.attr("class") {
        hay.push_str(&class.to_ascii_lowercase());
    }
    if let Some(id) = v.attr("id") {
        hay.push(' ');
        hay.push_str(&id.to_ascii_lowercase());
    }
    hints.iter().any(|h| hay.contains(h))
}

/// 空白归一化：空白串折叠为换行，空行随之消失
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("\n")
}
