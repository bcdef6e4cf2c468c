use ammonia::Builder;
use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::models::post::ReadingTime;

const EXCERPT_LENGTH: usize = 297;
const WORDS_PER_MINUTE: u32 = 200;

static PLAIN_TEXT: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::empty();
    builder.clean_content_tags(HashSet::from(["script", "style"]));
    builder
});

/// 清理用户提交的 HTML 正文（移除脚本等危险内容）
pub fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

/// Removes every tag and returns the text content, whitespace collapsed.
pub fn to_plain_text(html: &str) -> String {
    let stripped = PLAIN_TEXT.clean(html).to_string();
    let unescaped = stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    unescaped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 从正文生成摘要: 纯文本的前 297 个字符加 "..."
pub fn derive_excerpt(html: &str) -> String {
    let text = to_plain_text(html);
    if text.chars().count() <= EXCERPT_LENGTH {
        return text;
    }
    let head: String = text.chars().take(EXCERPT_LENGTH).collect();
    format!("{}...", head.trim_end())
}

pub fn reading_time(html: &str) -> ReadingTime {
    let words = to_plain_text(html).split_whitespace().count() as u32;
    let minutes = ((words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE).max(1);
    ReadingTime { minutes, words }
}

/// Lowercases, trims and de-duplicates tags, preserving first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
