use crate::error::{AppError, Result};
use crate::models::pagination::PageRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

pub const MIN_TRENDING_DAYS: i64 = 1;
pub const MAX_TRENDING_DAYS: i64 = 365;

/// 验证用户名格式
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("Username cannot be empty"));
    }

    let length = username.chars().count();
    if length < 3 {
        return Err(AppError::validation("Username must be at least 3 characters"));
    }

    if length > 30 {
        return Err(AppError::validation("Username must be at most 30 characters"));
    }

    // 用户名只能包含字母、数字、下划线和连字符
    if !USERNAME_REGEX.is_match(username) {
        return Err(AppError::validation(
            "Username may only contain letters, numbers, underscores and hyphens",
        ));
    }

    Ok(())
}

/// 验证显示名称格式
pub fn validate_display_name(display_name: &str) -> Result<()> {
    if display_name.trim().is_empty() {
        return Err(AppError::validation("Display name cannot be empty"));
    }

    if display_name.chars().count() > 50 {
        return Err(AppError::validation("Display name must be at most 50 characters"));
    }

    Ok(())
}

/// Resolves optional `page`/`limit` query values into a checked page request.
pub fn page_request(
    page: Option<usize>,
    limit: Option<usize>,
    default_limit: usize,
    max_limit: usize,
) -> Result<PageRequest> {
    PageRequest::new(page.unwrap_or(1), limit.unwrap_or(default_limit), max_limit)
}

/// Parses a sort key, falling back to the type's default when absent.
pub fn parse_sort<S>(sort: Option<&str>) -> Result<S>
where
    S: FromStr<Err = AppError> + Default,
{
    match sort.map(str::trim) {
        None | Some("") => Ok(S::default()),
        Some(key) => key.parse(),
    }
}

pub fn trending_days(days: Option<i64>, default_days: i64) -> Result<i64> {
    let days = days.unwrap_or(default_days);
    if !(MIN_TRENDING_DAYS..=MAX_TRENDING_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "Days must be between {} and {}",
            MIN_TRENDING_DAYS, MAX_TRENDING_DAYS
        )));
    }
    Ok(days)
}

pub fn trending_limit(limit: Option<usize>, max_results: usize) -> Result<usize> {
    let limit = limit.unwrap_or(max_results);
    if limit < 1 || limit > max_results {
        return Err(AppError::Validation(format!(
            "Limit must be between 1 and {}",
            max_results
        )));
    }
    Ok(limit)
}

/// Comma separated tag list from a query string, normalised like stored tags.
pub fn parse_tag_list(tags: Option<&str>) -> Vec<String> {
    let raw: Vec<String> = tags
        .map(|t| t.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    crate::utils::text::normalize_tags(&raw)
}

/// Lowercased whitespace-separated search terms.
pub fn search_terms(search: Option<&str>) -> Vec<String> {
    search
        .map(|s| s.split_whitespace().map(str::to_lowercase).collect())
        .unwrap_or_default()
}
