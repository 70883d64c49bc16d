use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use super::catalog_helpers::{CatalogError, CatalogResult};
use crate::models::{BlogPostFilters, CourseFilters, CourseLanguage, CourseLevel, Locale};

/// Raw `/api/courses` parameters. Everything arrives as text so a bad value
/// can be reported against its own field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    pub language: Option<String>,
    pub search: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub lang: Option<String>,
}

/// Raw `/api/blog` parameters. `tags` is a comma separated list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogQuery {
    pub category: Option<String>,
    pub author: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

/// Empty parameters count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_decimal(field: &str, value: &Option<String>) -> CatalogResult<Option<Decimal>> {
    match present(value) {
        Some(raw) => Decimal::from_str(raw)
            .map(Some)
            .map_err(|_| CatalogError::validation(field, format!("'{}' is not a number", raw))),
        None => Ok(None),
    }
}

fn parse_count(field: &str, value: &Option<String>) -> CatalogResult<Option<usize>> {
    match present(value) {
        Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
            CatalogError::validation(field, format!("'{}' is not a non-negative integer", raw))
        }),
        None => Ok(None),
    }
}

fn parse_enum<T: FromStr<Err = String>>(field: &str, value: &Option<String>) -> CatalogResult<Option<T>> {
    match present(value) {
        Some(raw) => raw
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|message| CatalogError::validation(field, message)),
        None => Ok(None),
    }
}

fn text(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_string)
}

pub fn display_locale(lang: &Option<String>) -> CatalogResult<Option<Locale>> {
    parse_enum::<Locale>("lang", lang)
}

pub fn course_filters(query: &CourseQuery) -> CatalogResult<CourseFilters> {
    Ok(CourseFilters {
        category: text(&query.category),
        level: parse_enum::<CourseLevel>("level", &query.level)?,
        price_min: parse_decimal("priceMin", &query.price_min)?,
        price_max: parse_decimal("priceMax", &query.price_max)?,
        search: text(&query.search),
        language: parse_enum::<CourseLanguage>("language", &query.language)?,
        limit: parse_count("limit", &query.limit)?,
        offset: parse_count("offset", &query.offset)?,
    })
}

/// The `published` flag is left unset; the public audience decides it.
pub fn blog_filters(query: &BlogQuery) -> CatalogResult<BlogPostFilters> {
    let tags = present(&query.tags)
        .map(|raw| {
            raw.split(',')
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(BlogPostFilters {
        category: text(&query.category),
        author: text(&query.author),
        tags,
        published: None,
        search: text(&query.search),
        limit: parse_count("limit", &query.limit)?,
        offset: parse_count("offset", &query.offset)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn field_of(err: CatalogError) -> String {
        match err {
            CatalogError::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn course_query_parses_into_typed_filters() {
        let query = CourseQuery {
            category: some("cat1"),
            level: some("Beginner"),
            language: some("so"),
            price_max: some("30"),
            limit: some("10"),
            ..Default::default()
        };
        let filters = course_filters(&query).unwrap();

        assert_eq!(filters.category.as_deref(), Some("cat1"));
        assert_eq!(filters.level, Some(CourseLevel::Beginner));
        assert_eq!(filters.language, Some(CourseLanguage::So));
        assert_eq!(filters.price_max, Some(Decimal::from(30)));
        assert_eq!(filters.price_min, None);
        assert_eq!(filters.limit, Some(10));
        assert_eq!(filters.offset, None);
    }

    #[test]
    fn empty_parameters_are_absent() {
        let query = CourseQuery {
            search: some("  "),
            price_min: some(""),
            level: some(""),
            ..Default::default()
        };
        assert_eq!(course_filters(&query).unwrap(), CourseFilters::default());
    }

    #[test]
    fn malformed_values_name_their_field() {
        let bad_price = CourseQuery {
            price_min: some("cheap"),
            ..Default::default()
        };
        assert_eq!(field_of(course_filters(&bad_price).unwrap_err()), "priceMin");

        let negative_offset = CourseQuery {
            offset: some("-1"),
            ..Default::default()
        };
        assert_eq!(field_of(course_filters(&negative_offset).unwrap_err()), "offset");

        let unknown_level = CourseQuery {
            level: some("expert"),
            ..Default::default()
        };
        assert_eq!(field_of(course_filters(&unknown_level).unwrap_err()), "level");

        assert_eq!(field_of(display_locale(&some("fr")).unwrap_err()), "lang");
    }

    #[test]
    fn blog_tags_split_on_commas() {
        let query = BlogQuery {
            tags: some("rust, ,Actix,"),
            ..Default::default()
        };
        let filters = blog_filters(&query).unwrap();
        assert_eq!(filters.tags, vec!["rust".to_string(), "Actix".to_string()]);
        assert_eq!(filters.published, None);
    }
}
