use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::helper::catalog_helpers::CatalogResult;
use crate::helper::public_helpers::{self, BlogQuery, CourseQuery, LangQuery};
use crate::models::{BlogAudience, BlogPost, BlogPostWithRelations, Category, Course, Locale};
use crate::routes::response::{self, ApiError};
use crate::AppState;

/// Text picked for one locale, added next to the untouched entity.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplayText {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl DisplayText {
    fn category(category: &Category, locale: Locale) -> Self {
        DisplayText {
            name: Some(category.name.pick(locale).to_string()),
            ..Default::default()
        }
    }

    fn course(course: &Course, locale: Locale) -> Self {
        DisplayText {
            title: Some(course.title.pick(locale).to_string()),
            description: Some(course.description.pick(locale).to_string()),
            ..Default::default()
        }
    }

    fn post_summary(post: &BlogPost, locale: Locale) -> Self {
        DisplayText {
            title: Some(post.title.pick(locale).to_string()),
            excerpt: Some(post.excerpt.pick(locale).to_string()),
            ..Default::default()
        }
    }

    fn post(post: &BlogPost, locale: Locale) -> Self {
        DisplayText {
            content: Some(post.content.pick(locale).to_string()),
            ..Self::post_summary(post, locale)
        }
    }
}

#[derive(Debug, Serialize)]
struct Localized<T: Serialize> {
    #[serde(flatten)]
    row: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    display: Option<DisplayText>,
}

fn localized<T: Serialize>(row: T, locale: Option<Locale>, pick: impl Fn(&T, Locale) -> DisplayText) -> Localized<T> {
    let display = locale.map(|locale| pick(&row, locale));
    Localized { row, display }
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::QueryConfig::default().error_handler(response::query_error_handler))
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/categories", web::get().to(get_categories))
            .route("/courses", web::get().to(get_courses))
            .route("/courses/{id}", web::get().to(get_course_by_id))
            .route("/courses/{id}/lessons", web::get().to(get_course_lessons))
            .route("/courses/{id}/reviews", web::get().to(get_course_reviews))
            .route("/blog", web::get().to(get_blog_posts))
            .route("/blog/{id}", web::get().to(get_blog_post_by_id))
            .route("/blog/{id}/comments", web::get().to(get_blog_comments))
            .service(web::scope("/cart").default_service(web::to(requires_authentication)))
            .service(web::scope("/orders").default_service(web::to(requires_authentication)))
            .service(web::scope("/enrollments").default_service(web::to(requires_authentication)))
            .default_service(web::to(unknown_endpoint)),
    );
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

async fn get_categories(
    state: web::Data<AppState>,
    query: web::Query<LangQuery>,
) -> Result<HttpResponse, ApiError> {
    let locale = public_helpers::display_locale(&query.lang)?;
    let categories: Vec<_> = web::block(move || state.catalog.list_categories())
        .await??
        .into_iter()
        .map(|category| localized(category, locale, DisplayText::category))
        .collect();
    Ok(response::ok(categories))
}

async fn get_courses(
    state: web::Data<AppState>,
    query: web::Query<CourseQuery>,
) -> Result<HttpResponse, ApiError> {
    let filters = public_helpers::course_filters(&query)?;
    let locale = public_helpers::display_locale(&query.lang)?;

    let courses: Vec<_> = web::block(move || state.catalog.list_courses(&filters))
        .await??
        .into_iter()
        .map(|row| localized(row, locale, |row, locale| DisplayText::course(&row.course, locale)))
        .collect();
    Ok(response::ok(courses))
}

async fn get_course_by_id(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<LangQuery>,
) -> Result<HttpResponse, ApiError> {
    let locale = public_helpers::display_locale(&query.lang)?;
    let id = id.into_inner();
    let course = web::block(move || state.catalog.get_course_with_instructor(&id)).await??;
    Ok(response::ok(localized(course, locale, |row, locale| {
        DisplayText::course(&row.course, locale)
    })))
}

async fn get_course_lessons(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let lessons = web::block(move || state.catalog.course_lessons(&id)).await??;
    Ok(response::ok(lessons))
}

async fn get_course_reviews(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let reviews = web::block(move || state.catalog.course_reviews(&id)).await??;
    Ok(response::ok(reviews))
}

/// Public listing: drafts are never included.
async fn get_blog_posts(
    state: web::Data<AppState>,
    query: web::Query<BlogQuery>,
) -> Result<HttpResponse, ApiError> {
    let filters = public_helpers::blog_filters(&query)?;
    let locale = public_helpers::display_locale(&query.lang)?;

    let posts: Vec<_> = web::block(move || state.catalog.list_blog_posts(&filters, BlogAudience::Public))
        .await??
        .into_iter()
        .map(|row| localized(row, locale, |row, locale| DisplayText::post_summary(&row.post, locale)))
        .collect();
    Ok(response::ok(posts))
}

/// Counts one view per successful fetch.
async fn get_blog_post_by_id(
    state: web::Data<AppState>,
    id: web::Path<String>,
    query: web::Query<LangQuery>,
) -> Result<HttpResponse, ApiError> {
    let locale = public_helpers::display_locale(&query.lang)?;
    let id = id.into_inner();
    let post = web::block(move || -> CatalogResult<BlogPostWithRelations> {
        let mut post = state.catalog.get_blog_post(&id)?;
        post.post.view_count = state.catalog.increment_blog_post_views(&id)?;
        Ok(post)
    })
    .await??;
    Ok(response::ok(localized(post, locale, |row, locale| {
        DisplayText::post(&row.post, locale)
    })))
}

async fn get_blog_comments(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let comments = web::block(move || state.catalog.post_comments(&id)).await??;
    Ok(response::ok(comments))
}

/// Cart, order and enrollment writes need a signed-in user, which this
/// service has no way to establish.
async fn requires_authentication() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotImplemented(
        "This endpoint requires authentication, which is not available".to_string(),
    ))
}

async fn unknown_endpoint() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Endpoint".to_string()))
}
