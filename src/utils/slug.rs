use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\-]").unwrap());
static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
static VALID_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

/// 从标题生成 URL 友好的 slug
pub fn generate_slug(title: &str) -> String {
    // 转换为小写, 空白与下划线替换为连字符
    let mut slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
        .collect();

    // 移除所有非字母数字和连字符的字符
    slug = SLUG_REGEX.replace_all(&slug, "").to_string();

    // 移除连续的连字符
    slug = HYPHEN_RUNS.replace_all(&slug, "-").to_string();

    slug = slug.trim_matches('-').to_string();

    // 限制长度
    if slug.len() > 100 {
        slug.truncate(100);
        // 确保不会在单词中间截断
        if let Some(last_hyphen) = slug.rfind('-') {
            if last_hyphen > 50 {
                slug.truncate(last_hyphen);
            }
        }
        slug = slug.trim_matches('-').to_string();
    }

    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    slug
}

/// Candidate slug for the `attempt`-th collision: `base`, `base-1`, `base-2`, ...
pub fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

/// 验证 slug 格式是否正确
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= 120 && VALID_SLUG.is_match(slug)
}
