//! 预编译的 CSS 选择器
//!
//! 候选列表按优先级排列，结构化提取时逐个尝试，首个命中者生效。

use std::sync::OnceLock;

use scraper::Selector;

/// 站点品牌词，出现在标题候选中时需要剔除
pub const BRAND_EXCLUDES: &[&str] = &["笔趣阁", "小说网", "小说", "首页", "目录", "章节列表"];

/// 导航类链接文本，通用回退搜索时排除
pub const NAV_EXCLUDES: &[&str] = &[
    "首页",
    "上一章",
    "下一章",
    "目录",
    "返回",
    "上一页",
    "下一页",
    "加入书架",
    "推荐",
    "收藏",
];

/// 书名候选选择器
const TITLE_CANDIDATES: &[&str] = &[
    "h1",
    ".book-title",
    "#book-title",
    ".bookname h1",
    ".bookname",
    ".book_info h1",
    ".book_info h2",
    ".book_con h1",
    r#"[class*="book-title"]"#,
    r#"[class*="book-name"]"#,
    r#"[class*="bookname"]"#,
    r#"[id*="bookname"]"#,
    r#"[id*="book-title"]"#,
];

/// 章节列表容器候选选择器
const CHAPTER_CANDIDATES: &[&str] = &[
    r#"a[href*="/chapter/"]"#,
    r#"a[href*="chapter"]"#,
    ".chapter-list a",
    "#chapter-list a",
    ".listmain dd a",
    ".listmain dt a",
    "#list dd a",
    "#list dt a",
    "dd a",
    "dt a",
    ".list-group-item a",
    "ul.list a",
    "div.list a",
    ".chapter a",
    "#list a",
    ".book_list a",
    ".chapter_list a",
    "table a",
    "tbody a",
];

/// 正文容器候选选择器
const CONTENT_CANDIDATES: &[&str] = &[
    "#content",
    ".content",
    "#chaptercontent",
    ".chaptercontent",
    ".chapter-content",
    "#novelcontent",
    ".novelcontent",
    ".text-content",
    "#text",
    ".bookcontent",
    "#bookcontent",
    ".readcontent",
    "#readcontent",
    r#"[id*="content"]"#,
    r#"[class*="content"]"#,
    r#"[id*="text"]"#,
    r#"[class*="text"]"#,
    r#"[id*="chapter"]"#,
    r#"[class*="chapter"]"#,
];

/// 提取用选择器集合
pub struct Selectors {
    pub title_candidates: Vec<(&'static str, Selector)>,
    pub chapter_candidates: Vec<(&'static str, Selector)>,
    pub content_candidates: Vec<(&'static str, Selector)>,
    pub title_tag: Selector,
    pub any_anchor: Selector,
    pub block: Selector,
    pub any_div: Selector,
}

static SELECTORS: OnceLock<Selectors> = OnceLock::new();

fn compile(patterns: &[&'static str]) -> Vec<(&'static str, Selector)> {
    patterns
        .iter()
        .map(|p| (*p, Selector::parse(p).unwrap()))
        .collect()
}

impl Selectors {
    /// 获取全局选择器实例
    pub fn get() -> &'static Selectors {
        SELECTORS.get_or_init(|| Selectors {
            title_candidates: compile(TITLE_CANDIDATES),
            chapter_candidates: compile(CHAPTER_CANDIDATES),
            content_candidates: compile(CONTENT_CANDIDATES),
            title_tag: Selector::parse("title").unwrap(),
            any_anchor: Selector::parse("a[href]").unwrap(),
            block: Selector::parse("div, article, section").unwrap(),
            any_div: Selector::parse("div").unwrap(),
        })
    }
}
