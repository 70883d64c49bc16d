use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::db_operations::{Record, RecordStore, Storage, StoreError};
use crate::models::{
    BlogAudience, BlogPost, BlogPostChanges, BlogPostFilters, BlogPostWithRelations, Category,
    Course, CourseChanges, CourseFilters, CourseWithInstructor, CourseWithRelations, NewBlogPost,
    NewCategory, NewCourse, NewUser, User, UserChanges,
};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid '{field}': {message}")]
    Validation { field: String, message: String },
    #[error("Duplicate value for '{field}'")]
    ConstraintViolation { field: String },
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl CatalogError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation { field } => CatalogError::ConstraintViolation { field },
            StoreError::MissingReference(what) => CatalogError::NotFound(what),
            other => CatalogError::Store(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Query engine over a [`Storage`] backend. Every filter, join, sort and page
/// is computed here from full scans, so both backends answer identically.
pub struct CatalogRepository {
    store: Storage,
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Newest first, ties broken by ascending id so pages stay stable.
pub(crate) fn newest_first(
    a_time: &DateTime<Utc>,
    a_id: &str,
    b_time: &DateTime<Utc>,
    b_id: &str,
) -> Ordering {
    b_time.cmp(a_time).then_with(|| a_id.cmp(b_id))
}

/// Skips `offset` rows, then keeps at most `limit`.
pub(crate) fn paginate<T>(rows: Vec<T>, limit: Option<usize>, offset: Option<usize>) -> Vec<T> {
    let remaining = rows.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(limit) => remaining.take(limit).collect(),
        None => remaining.collect(),
    }
}

pub(crate) fn index_by_id<R: Record>(records: Vec<R>) -> HashMap<String, R> {
    records
        .into_iter()
        .map(|record| (record.id().to_string(), record))
        .collect()
}

fn normalized_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn require_non_negative(field: &str, value: Decimal) -> CatalogResult<()> {
    if value < Decimal::ZERO {
        return Err(CatalogError::validation(field, "must not be negative"));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> CatalogResult<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn course_matches(course: &Course, filters: &CourseFilters, search: Option<&str>) -> bool {
    if let Some(category) = &filters.category {
        if &course.category_id != category {
            return false;
        }
    }
    if let Some(level) = filters.level {
        if course.level != level {
            return false;
        }
    }
    if let Some(min) = filters.price_min {
        if course.price < min {
            return false;
        }
    }
    if let Some(max) = filters.price_max {
        if course.price > max {
            return false;
        }
    }
    if let Some(language) = filters.language {
        if !course.language.satisfies(language) {
            return false;
        }
    }
    match search {
        Some(needle) => {
            course.title.contains_lowercase(needle) || course.description.contains_lowercase(needle)
        }
        None => true,
    }
}

fn post_matches(
    post: &BlogPost,
    filters: &BlogPostFilters,
    published: Option<bool>,
    tags: &[String],
    search: Option<&str>,
) -> bool {
    if let Some(published) = published {
        if post.is_published != published {
            return false;
        }
    }
    if let Some(category) = &filters.category {
        if post.category_id.as_ref() != Some(category) {
            return false;
        }
    }
    if let Some(author) = &filters.author {
        if &post.author_id != author {
            return false;
        }
    }
    if !tags.is_empty() && !post.tags.iter().any(|tag| tags.contains(&tag.to_lowercase())) {
        return false;
    }
    match search {
        Some(needle) => post.title.contains_lowercase(needle) || post.excerpt.contains_lowercase(needle),
        None => true,
    }
}

fn validate_rating(rating: Decimal) -> CatalogResult<()> {
    if rating < Decimal::ZERO || rating > Decimal::from(5) {
        return Err(CatalogError::validation("rating", "must be between 0 and 5"));
    }
    Ok(())
}

impl CatalogRepository {
    pub fn new(store: Storage) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Storage {
        &self.store
    }

    // --- Courses ---

    /// Published courses with their instructor and category, newest first.
    /// Rows whose instructor or category no longer exists are dropped before
    /// paging.
    pub fn list_courses(&self, filters: &CourseFilters) -> CatalogResult<Vec<CourseWithRelations>> {
        let search = normalized_search(filters.search.as_deref());

        let mut courses: Vec<Course> = self
            .store
            .scan::<Course>()?
            .into_iter()
            .filter(|course| course.is_published && course_matches(course, filters, search.as_deref()))
            .collect();
        courses.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));

        let users = index_by_id(self.store.scan::<User>()?);
        let categories = index_by_id(self.store.scan::<Category>()?);

        let joined = courses
            .into_iter()
            .filter_map(|course| {
                let instructor = users.get(&course.instructor_id).cloned();
                let category = categories.get(&course.category_id).cloned();
                match (instructor, category) {
                    (Some(instructor), Some(category)) => Some(CourseWithRelations {
                        course,
                        instructor,
                        category,
                    }),
                    _ => {
                        log::warn!("Skipping course {} with a dangling instructor or category", course.id);
                        None
                    }
                }
            })
            .collect();

        Ok(paginate(joined, filters.limit, filters.offset))
    }

    pub fn get_course(&self, id: &str) -> CatalogResult<Course> {
        self.store
            .get::<Course>(id)?
            .ok_or_else(|| CatalogError::NotFound("Course".to_string()))
    }

    /// Not found when either the course or its instructor is missing.
    pub fn get_course_with_instructor(&self, id: &str) -> CatalogResult<CourseWithInstructor> {
        let course = self.get_course(id)?;
        let instructor = self
            .store
            .get::<User>(&course.instructor_id)?
            .ok_or_else(|| CatalogError::NotFound("Course".to_string()))?;
        Ok(CourseWithInstructor { course, instructor })
    }

    pub fn create_course(&self, input: NewCourse) -> CatalogResult<Course> {
        require_text("title", &input.title.default)?;
        require_non_negative("price", input.price)?;
        if let Some(original) = input.original_price {
            require_non_negative("originalPrice", original)?;
        }
        self.require_author(&input.instructor_id, "instructorId")?;
        if self.store.get::<Category>(&input.category_id)?.is_none() {
            return Err(CatalogError::validation("categoryId", "category does not exist"));
        }

        let now = Utc::now();
        let course = Course {
            id: new_id(),
            title: input.title,
            description: input.description,
            instructor_id: input.instructor_id,
            category_id: input.category_id,
            thumbnail: input.thumbnail,
            price: input.price,
            original_price: input.original_price,
            level: input.level,
            duration: input.duration,
            language: input.language,
            is_published: input.is_published,
            features: input.features,
            requirements: input.requirements,
            learning_outcomes: input.learning_outcomes,
            student_count: 0,
            rating: Decimal::ZERO,
            review_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&course)?;
        log::info!("Created course {}", course.id);
        Ok(course)
    }

    pub fn update_course(&self, id: &str, changes: CourseChanges) -> CatalogResult<Course> {
        if let Some(price) = changes.price {
            require_non_negative("price", price)?;
        }
        if let Some(Some(original)) = changes.original_price {
            require_non_negative("originalPrice", original)?;
        }
        if let Some(category_id) = &changes.category_id {
            if self.store.get::<Category>(category_id)?.is_none() {
                return Err(CatalogError::validation("categoryId", "category does not exist"));
            }
        }

        self.store
            .update::<Course, _>(id, |course| {
                changes.apply(course);
                course.updated_at = Utc::now();
            })?
            .ok_or_else(|| CatalogError::NotFound("Course".to_string()))
    }

    /// Overwrites the derived aggregates as given. Use
    /// `refresh_course_stats` to recompute them from reviews and enrollments.
    pub fn update_course_stats(
        &self,
        id: &str,
        rating: Decimal,
        review_count: u32,
        student_count: u32,
    ) -> CatalogResult<Course> {
        validate_rating(rating)?;
        self.store
            .update::<Course, _>(id, |course| {
                course.rating = rating;
                course.review_count = review_count;
                course.student_count = student_count;
                course.updated_at = Utc::now();
            })?
            .ok_or_else(|| CatalogError::NotFound("Course".to_string()))
    }

    // --- Blog posts ---

    /// Blog listing, newest first. A `Public` audience only ever sees
    /// published posts; `Staff` gets whatever `filters.published` asks for.
    pub fn list_blog_posts(
        &self,
        filters: &BlogPostFilters,
        audience: BlogAudience,
    ) -> CatalogResult<Vec<BlogPostWithRelations>> {
        let published = match audience {
            BlogAudience::Public => Some(true),
            BlogAudience::Staff => filters.published,
        };
        let tags: Vec<String> = clean_tags(&filters.tags)
            .into_iter()
            .map(|tag| tag.to_lowercase())
            .collect();
        let search = normalized_search(filters.search.as_deref());

        let mut posts: Vec<BlogPost> = self
            .store
            .scan::<BlogPost>()?
            .into_iter()
            .filter(|post| post_matches(post, filters, published, &tags, search.as_deref()))
            .collect();
        posts.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));

        let users = index_by_id(self.store.scan::<User>()?);
        let categories = index_by_id(self.store.scan::<Category>()?);

        let joined = posts
            .into_iter()
            .filter_map(|post| {
                let author = match users.get(&post.author_id) {
                    Some(author) => author.clone(),
                    None => {
                        log::warn!("Skipping blog post {} with a missing author", post.id);
                        return None;
                    }
                };
                let category = post
                    .category_id
                    .as_ref()
                    .and_then(|id| categories.get(id))
                    .cloned();
                Some(BlogPostWithRelations { post, author, category })
            })
            .collect();

        Ok(paginate(joined, filters.limit, filters.offset))
    }

    /// Detail lookup. Not gated on publication; the view counter is left
    /// untouched.
    pub fn get_blog_post(&self, id: &str) -> CatalogResult<BlogPostWithRelations> {
        let post = self
            .store
            .get::<BlogPost>(id)?
            .ok_or_else(|| CatalogError::NotFound("Blog post".to_string()))?;
        let author = self
            .store
            .get::<User>(&post.author_id)?
            .ok_or_else(|| CatalogError::NotFound("Blog post".to_string()))?;
        let category = match &post.category_id {
            Some(category_id) => self.store.get::<Category>(category_id)?,
            None => None,
        };
        Ok(BlogPostWithRelations { post, author, category })
    }

    /// Adds one view and returns the new count.
    pub fn increment_blog_post_views(&self, id: &str) -> CatalogResult<u64> {
        let post = self
            .store
            .update::<BlogPost, _>(id, |post| post.view_count += 1)?
            .ok_or_else(|| CatalogError::NotFound("Blog post".to_string()))?;
        Ok(post.view_count)
    }

    pub fn create_blog_post(&self, input: NewBlogPost) -> CatalogResult<BlogPost> {
        require_text("title", &input.title.default)?;
        if self.store.get::<User>(&input.author_id)?.is_none() {
            return Err(CatalogError::validation("authorId", "author does not exist"));
        }
        if let Some(category_id) = &input.category_id {
            if self.store.get::<Category>(category_id)?.is_none() {
                return Err(CatalogError::validation("categoryId", "category does not exist"));
            }
        }

        let now = Utc::now();
        let post = BlogPost {
            id: new_id(),
            title: input.title,
            excerpt: input.excerpt,
            content: input.content,
            author_id: input.author_id,
            category_id: input.category_id,
            featured_image: input.featured_image,
            tags: clean_tags(&input.tags),
            is_published: input.is_published,
            published_at: if input.is_published { Some(now) } else { None },
            read_time: input.read_time,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&post)?;
        log::info!("Created blog post {}", post.id);
        Ok(post)
    }

    /// Stamps `published_at` the first time a post becomes published.
    pub fn update_blog_post(&self, id: &str, changes: BlogPostChanges) -> CatalogResult<BlogPost> {
        if let Some(Some(category_id)) = &changes.category_id {
            if self.store.get::<Category>(category_id)?.is_none() {
                return Err(CatalogError::validation("categoryId", "category does not exist"));
            }
        }

        self.store
            .update::<BlogPost, _>(id, |post| {
                changes.apply(post);
                post.tags = clean_tags(&post.tags);
                let now = Utc::now();
                if post.is_published && post.published_at.is_none() {
                    post.published_at = Some(now);
                }
                post.updated_at = now;
            })?
            .ok_or_else(|| CatalogError::NotFound("Blog post".to_string()))
    }

    // --- Users ---

    pub fn create_user(&self, input: NewUser) -> CatalogResult<User> {
        let email = input.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(CatalogError::validation("email", "must be an email address"));
        }
        require_text("name", &input.name)?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            email,
            name: input.name.trim().to_string(),
            role: input.role,
            avatar: input.avatar,
            bio: input.bio,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&user)?;
        log::info!("Created {} account {}", user.role.as_str(), user.id);
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> CatalogResult<Option<User>> {
        Ok(self.store.get::<User>(id)?)
    }

    pub fn get_user_by_email(&self, email: &str) -> CatalogResult<Option<User>> {
        Ok(self
            .store
            .find_unique::<User>("email", &email.trim().to_lowercase())?)
    }

    /// All accounts, oldest first.
    pub fn list_users(&self) -> CatalogResult<Vec<User>> {
        let mut users = self.store.scan::<User>()?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    pub fn update_user(&self, id: &str, mut changes: UserChanges) -> CatalogResult<User> {
        if let Some(email) = changes.email.take() {
            let email = email.trim().to_lowercase();
            if !email.contains('@') {
                return Err(CatalogError::validation("email", "must be an email address"));
            }
            changes.email = Some(email);
        }
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }

        self.store
            .update::<User, _>(id, |user| {
                changes.apply(user);
                user.updated_at = Utc::now();
            })?
            .ok_or_else(|| CatalogError::NotFound("User".to_string()))
    }

    /// Fails validation unless `user_id` names an instructor or admin.
    pub(crate) fn require_author(&self, user_id: &str, field: &str) -> CatalogResult<User> {
        match self.store.get::<User>(user_id)? {
            Some(user) if user.role.can_author() => Ok(user),
            Some(_) => Err(CatalogError::validation(field, "user is not an instructor or admin")),
            None => Err(CatalogError::validation(field, "user does not exist")),
        }
    }

    // --- Categories ---

    pub fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        let mut categories = self.store.scan::<Category>()?;
        categories.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(categories)
    }

    pub fn get_category(&self, id: &str) -> CatalogResult<Option<Category>> {
        Ok(self.store.get::<Category>(id)?)
    }

    pub fn create_category(&self, input: NewCategory) -> CatalogResult<Category> {
        require_text("name", &input.name.default)?;
        let slug = input.slug.trim().to_lowercase();
        if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(CatalogError::validation(
                "slug",
                "only letters, numbers and hyphens are allowed",
            ));
        }

        let category = Category {
            id: new_id(),
            name: input.name,
            description: input.description,
            slug,
        };
        self.store.insert(&category)?;
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseLanguage, CourseLevel, LocalizedText, UserRole};
    use chrono::Duration;
    use std::str::FromStr;

    fn repo() -> CatalogRepository {
        CatalogRepository::new(Storage::memory().unwrap())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn seed_people(repo: &CatalogRepository) -> (User, Category) {
        let instructor = repo
            .create_user(NewUser {
                email: "ahmed@example.com".to_string(),
                name: "Ahmed Mohamed".to_string(),
                role: UserRole::Instructor,
                avatar: None,
                bio: None,
            })
            .unwrap();
        let category = repo
            .create_category(NewCategory {
                name: LocalizedText::new("Programming", "Programming", "Barnaamij"),
                description: None,
                slug: "programming".to_string(),
            })
            .unwrap();
        (instructor, category)
    }

    /// Inserts a course straight into the store so the timestamp is exact.
    fn put_course(
        repo: &CatalogRepository,
        id: &str,
        title: &str,
        price: &str,
        age_minutes: i64,
        instructor: &User,
        category: &Category,
    ) -> Course {
        let created = Utc::now() - Duration::minutes(age_minutes);
        let course = Course {
            id: id.to_string(),
            title: LocalizedText::new(title, title, format!("{} (so)", title)),
            description: LocalizedText::uniform(format!("About {}", title)),
            instructor_id: instructor.id.clone(),
            category_id: category.id.clone(),
            thumbnail: "/thumb.png".to_string(),
            price: dec(price),
            original_price: None,
            level: CourseLevel::Beginner,
            duration: "4h".to_string(),
            language: CourseLanguage::Both,
            is_published: true,
            features: vec![],
            requirements: vec![],
            learning_outcomes: vec![],
            student_count: 0,
            rating: Decimal::ZERO,
            review_count: 0,
            created_at: created,
            updated_at: created,
        };
        repo.store().insert(&course).unwrap();
        course
    }

    fn ids(rows: &[CourseWithRelations]) -> Vec<&str> {
        rows.iter().map(|row| row.course.id.as_str()).collect()
    }

    #[test]
    fn list_courses_is_newest_first_with_id_tiebreak() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        put_course(&repo, "c-old", "Old", "10", 30, &instructor, &category);
        let tied = put_course(&repo, "c-b", "Tied B", "10", 5, &instructor, &category);
        let mut twin = tied.clone();
        twin.id = "c-a".to_string();
        repo.store().insert(&twin).unwrap();

        let rows = repo.list_courses(&CourseFilters::default()).unwrap();
        assert_eq!(ids(&rows), vec!["c-a", "c-b", "c-old"]);
    }

    #[test]
    fn price_bounds_are_inclusive_decimals() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        put_course(&repo, "cheap", "Cheap", "29.99", 3, &instructor, &category);
        put_course(&repo, "mid", "Mid", "30.00", 2, &instructor, &category);
        put_course(&repo, "dear", "Dear", "39.99", 1, &instructor, &category);

        let filters = CourseFilters {
            price_max: Some(dec("30")),
            ..Default::default()
        };
        assert_eq!(ids(&repo.list_courses(&filters).unwrap()), vec!["mid", "cheap"]);

        let filters = CourseFilters {
            price_min: Some(dec("30")),
            ..Default::default()
        };
        assert_eq!(ids(&repo.list_courses(&filters).unwrap()), vec!["dear", "mid"]);
    }

    #[test]
    fn unpublished_courses_never_listed() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        let draft = put_course(&repo, "draft", "Draft", "5", 1, &instructor, &category);
        repo.store()
            .update::<Course, _>(&draft.id, |c| c.is_published = false)
            .unwrap();

        assert!(repo.list_courses(&CourseFilters::default()).unwrap().is_empty());
        assert!(repo.get_course("draft").is_ok());
    }

    #[test]
    fn search_covers_somali_variant_and_ignores_blank() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        put_course(&repo, "py", "Python", "5", 2, &instructor, &category);
        put_course(&repo, "js", "JavaScript", "5", 1, &instructor, &category);

        let filters = CourseFilters {
            search: Some("PYTHON (SO)".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&repo.list_courses(&filters).unwrap()), vec!["py"]);

        let filters = CourseFilters {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list_courses(&filters).unwrap().len(), 2);
    }

    #[test]
    fn language_filter_treats_both_as_wildcard() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        put_course(&repo, "both", "Both", "5", 3, &instructor, &category);
        put_course(&repo, "so", "Somali", "5", 2, &instructor, &category);
        put_course(&repo, "en", "English", "5", 1, &instructor, &category);
        repo.store()
            .update::<Course, _>("so", |c| c.language = CourseLanguage::So)
            .unwrap();
        repo.store()
            .update::<Course, _>("en", |c| c.language = CourseLanguage::En)
            .unwrap();

        let only = |language| CourseFilters {
            language: Some(language),
            ..Default::default()
        };
        assert_eq!(ids(&repo.list_courses(&only(CourseLanguage::So)).unwrap()), vec!["so", "both"]);
        assert_eq!(ids(&repo.list_courses(&only(CourseLanguage::En)).unwrap()), vec!["en", "both"]);
        assert_eq!(repo.list_courses(&only(CourseLanguage::Both)).unwrap().len(), 3);
    }

    #[test]
    fn pages_are_contiguous_and_offset_past_end_is_empty() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        for i in 0..5 {
            put_course(&repo, &format!("c{}", i), "Course", "5", i, &instructor, &category);
        }

        let all = repo.list_courses(&CourseFilters::default()).unwrap();
        let page = |offset| CourseFilters {
            limit: Some(2),
            offset: Some(offset),
            ..Default::default()
        };
        let first = repo.list_courses(&page(0)).unwrap();
        let second = repo.list_courses(&page(2)).unwrap();
        let concatenated: Vec<&str> = ids(&first).into_iter().chain(ids(&second)).collect();
        assert_eq!(concatenated, ids(&all)[..4].to_vec());

        assert!(repo.list_courses(&page(50)).unwrap().is_empty());
    }

    #[test]
    fn course_with_missing_instructor_is_hidden() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        let ghost = User {
            id: "ghost".to_string(),
            ..instructor.clone()
        };
        put_course(&repo, "orphan", "Orphan", "5", 1, &ghost, &category);

        assert!(repo.list_courses(&CourseFilters::default()).unwrap().is_empty());
        assert!(matches!(
            repo.get_course_with_instructor("orphan"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn create_course_checks_author_role_and_prices() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        let student = repo
            .create_user(NewUser {
                email: "fatima@example.com".to_string(),
                name: "Fatima Ali".to_string(),
                role: UserRole::Student,
                avatar: None,
                bio: None,
            })
            .unwrap();

        let input = |instructor_id: &str, price: &str| NewCourse {
            title: LocalizedText::uniform("Rust"),
            description: LocalizedText::uniform("Systems"),
            instructor_id: instructor_id.to_string(),
            category_id: category.id.clone(),
            thumbnail: "/rust.png".to_string(),
            price: dec(price),
            original_price: None,
            level: CourseLevel::Advanced,
            duration: "10h".to_string(),
            language: CourseLanguage::En,
            is_published: true,
            features: vec![],
            requirements: vec![],
            learning_outcomes: vec![],
        };

        assert!(matches!(
            repo.create_course(input(&student.id, "10")),
            Err(CatalogError::Validation { field, .. }) if field == "instructorId"
        ));
        assert!(matches!(
            repo.create_course(input(&instructor.id, "-1")),
            Err(CatalogError::Validation { field, .. }) if field == "price"
        ));
        let course = repo.create_course(input(&instructor.id, "10")).unwrap();
        assert_eq!(course.rating, Decimal::ZERO);
    }

    #[test]
    fn update_course_stats_overwrites_and_checks_range() {
        let repo = repo();
        let (instructor, category) = seed_people(&repo);
        put_course(&repo, "c1", "Course", "5", 1, &instructor, &category);

        let course = repo.update_course_stats("c1", dec("4.5"), 2, 7).unwrap();
        assert_eq!((course.rating, course.review_count, course.student_count), (dec("4.5"), 2, 7));
        assert!(matches!(
            repo.update_course_stats("c1", dec("5.01"), 2, 7),
            Err(CatalogError::Validation { .. })
        ));
        assert!(matches!(
            repo.update_course_stats("missing", dec("1"), 0, 0),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_email_and_slug_are_constraint_violations() {
        let repo = repo();
        seed_people(&repo);

        let again = repo.create_user(NewUser {
            email: "AHMED@example.com".to_string(),
            name: "Someone".to_string(),
            role: UserRole::Student,
            avatar: None,
            bio: None,
        });
        assert!(matches!(again, Err(CatalogError::ConstraintViolation { field }) if field == "email"));

        let again = repo.create_category(NewCategory {
            name: LocalizedText::uniform("Programming 2"),
            description: None,
            slug: "programming".to_string(),
        });
        assert!(matches!(again, Err(CatalogError::ConstraintViolation { field }) if field == "slug"));
    }

    fn post(repo: &CatalogRepository, author: &User, title: &str, tags: &[&str], published: bool) -> BlogPost {
        repo.create_blog_post(NewBlogPost {
            title: LocalizedText::uniform(title),
            excerpt: LocalizedText::uniform(format!("{} excerpt", title)),
            content: LocalizedText::uniform("Body"),
            author_id: author.id.clone(),
            category_id: None,
            featured_image: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_published: published,
            read_time: Some(5),
        })
        .unwrap()
    }

    #[test]
    fn public_blog_listing_never_shows_drafts() {
        let repo = repo();
        let (author, _) = seed_people(&repo);
        post(&repo, &author, "Live", &[], true);
        let draft = post(&repo, &author, "Draft", &[], false);

        let asked_for_drafts = BlogPostFilters {
            published: Some(false),
            ..Default::default()
        };
        let public = repo.list_blog_posts(&asked_for_drafts, BlogAudience::Public).unwrap();
        assert!(public.iter().all(|row| row.post.is_published));

        let staff = repo.list_blog_posts(&asked_for_drafts, BlogAudience::Staff).unwrap();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].post.id, draft.id);

        let everything = repo
            .list_blog_posts(&BlogPostFilters::default(), BlogAudience::Staff)
            .unwrap();
        assert_eq!(everything.len(), 2);
    }

    #[test]
    fn tag_filter_is_a_case_insensitive_intersection() {
        let repo = repo();
        let (author, _) = seed_people(&repo);
        post(&repo, &author, "Rust", &["Rust", "systems"], true);
        post(&repo, &author, "Ads", &["marketing"], true);
        post(&repo, &author, "None", &[], true);

        let filters = BlogPostFilters {
            tags: vec!["rust".to_string(), "MARKETING".to_string()],
            ..Default::default()
        };
        let rows = repo.list_blog_posts(&filters, BlogAudience::Public).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn views_increment_only_when_asked() {
        let repo = repo();
        let (author, _) = seed_people(&repo);
        let created = post(&repo, &author, "Counted", &[], false);

        repo.get_blog_post(&created.id).unwrap();
        assert_eq!(repo.get_blog_post(&created.id).unwrap().post.view_count, 0);

        repo.increment_blog_post_views(&created.id).unwrap();
        assert_eq!(repo.increment_blog_post_views(&created.id).unwrap(), 2);
        assert!(matches!(
            repo.increment_blog_post_views("missing"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn first_publication_stamps_published_at() {
        let repo = repo();
        let (author, _) = seed_people(&repo);
        let draft = post(&repo, &author, "Later", &[], false);
        assert!(draft.published_at.is_none());

        let published = repo
            .update_blog_post(
                &draft.id,
                BlogPostChanges {
                    is_published: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        let stamped = published.published_at.unwrap();

        let edited = repo
            .update_blog_post(
                &draft.id,
                BlogPostChanges {
                    title: Some(LocalizedText::uniform("Later, edited")),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.published_at, Some(stamped));
    }

    #[test]
    fn update_of_missing_user_is_not_found() {
        let repo = repo();
        assert!(matches!(
            repo.update_user("nobody", UserChanges::default()),
            Err(CatalogError::NotFound(_))
        ));
    }
}
