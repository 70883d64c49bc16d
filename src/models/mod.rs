use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use localized::{Locale, LocalizedText};

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
        }
    }

    /// Roles allowed to own courses and blog posts.
    pub fn can_author(&self) -> bool {
        matches!(self, UserRole::Instructor | UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserRole::Student),
            "instructor" => Ok(UserRole::Instructor),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "beginner",
            CourseLevel::Intermediate => "intermediate",
            CourseLevel::Advanced => "advanced",
        }
    }
}

impl FromStr for CourseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(CourseLevel::Beginner),
            "intermediate" => Ok(CourseLevel::Intermediate),
            "advanced" => Ok(CourseLevel::Advanced),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// Languages a course is taught in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLanguage {
    So,
    En,
    Both,
}

impl CourseLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLanguage::So => "so",
            CourseLanguage::En => "en",
            CourseLanguage::Both => "both",
        }
    }

    /// A course taught in both languages satisfies any request, and a request
    /// for `both` places no constraint on the course.
    pub fn satisfies(&self, requested: CourseLanguage) -> bool {
        requested == CourseLanguage::Both || *self == CourseLanguage::Both || *self == requested
    }
}

impl FromStr for CourseLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "so" => Ok(CourseLanguage::So),
            "en" => Ok(CourseLanguage::En),
            "both" => Ok(CourseLanguage::Both),
            other => Err(format!("unknown language '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Zaad,
    Evcplus,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Zaad => "zaad",
            PaymentMethod::Evcplus => "evcplus",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentMethod::Stripe),
            "zaad" => Ok(PaymentMethod::Zaad),
            "evcplus" => Ok(PaymentMethod::Evcplus),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// pending -> completed | failed, completed -> refunded.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Completed, PaymentStatus::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

// --- Stored entities ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: LocalizedText,
    pub description: Option<String>,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub instructor_id: String,
    pub category_id: String,
    pub thumbnail: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub level: CourseLevel,
    pub duration: String,
    pub language: CourseLanguage,
    pub is_published: bool,
    pub features: Vec<String>,
    pub requirements: Vec<String>,
    pub learning_outcomes: Vec<String>,
    pub student_count: u32,
    pub rating: Decimal,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub course_id: String,
    pub title: LocalizedText,
    pub description: Option<String>,
    pub video_url: Option<String>,
    /// Minutes.
    pub duration: Option<u32>,
    pub order: i32,
    pub is_preview: bool,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub progress: u8,
    pub completed_lessons: Vec<String>,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub title: LocalizedText,
    pub excerpt: LocalizedText,
    pub content: LocalizedText,
    pub author_id: String,
    pub category_id: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    /// Estimated minutes.
    pub read_time: Option<u32>,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogComment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub transaction_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchased course line. `price` is the course price captured when the
/// order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub course_id: String,
    pub price: Decimal,
    pub quantity: u32,
}

// --- Creation inputs ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: LocalizedText,
    pub description: Option<String>,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub instructor_id: String,
    pub category_id: String,
    pub thumbnail: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub level: CourseLevel,
    pub duration: String,
    pub language: CourseLanguage,
    pub is_published: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    pub course_id: String,
    pub title: LocalizedText,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration: Option<u32>,
    pub order: i32,
    #[serde(default)]
    pub is_preview: bool,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub user_id: String,
    pub course_id: String,
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlogPost {
    pub title: LocalizedText,
    pub excerpt: LocalizedText,
    pub content: LocalizedText,
    pub author_id: String,
    pub category_id: Option<String>,
    pub featured_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_published: bool,
    pub read_time: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlogComment {
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub course_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

// --- Partial updates ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub avatar: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    pub fn apply(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = avatar.clone();
        }
        if let Some(bio) = &self.bio {
            user.bio = bio.clone();
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseChanges {
    pub title: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub category_id: Option<String>,
    pub thumbnail: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Option<Decimal>>,
    pub level: Option<CourseLevel>,
    pub duration: Option<String>,
    pub language: Option<CourseLanguage>,
    pub is_published: Option<bool>,
    pub features: Option<Vec<String>>,
    pub requirements: Option<Vec<String>>,
    pub learning_outcomes: Option<Vec<String>>,
}

impl CourseChanges {
    pub fn apply(&self, course: &mut Course) {
        if let Some(title) = &self.title {
            course.title = title.clone();
        }
        if let Some(description) = &self.description {
            course.description = description.clone();
        }
        if let Some(category_id) = &self.category_id {
            course.category_id = category_id.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            course.thumbnail = thumbnail.clone();
        }
        if let Some(price) = self.price {
            course.price = price;
        }
        if let Some(original_price) = self.original_price {
            course.original_price = original_price;
        }
        if let Some(level) = self.level {
            course.level = level;
        }
        if let Some(duration) = &self.duration {
            course.duration = duration.clone();
        }
        if let Some(language) = self.language {
            course.language = language;
        }
        if let Some(is_published) = self.is_published {
            course.is_published = is_published;
        }
        if let Some(features) = &self.features {
            course.features = features.clone();
        }
        if let Some(requirements) = &self.requirements {
            course.requirements = requirements.clone();
        }
        if let Some(outcomes) = &self.learning_outcomes {
            course.learning_outcomes = outcomes.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonChanges {
    pub title: Option<LocalizedText>,
    pub description: Option<Option<String>>,
    pub video_url: Option<Option<String>>,
    pub duration: Option<Option<u32>>,
    pub order: Option<i32>,
    pub is_preview: Option<bool>,
    pub content: Option<Option<String>>,
}

impl LessonChanges {
    pub fn apply(&self, lesson: &mut Lesson) {
        if let Some(title) = &self.title {
            lesson.title = title.clone();
        }
        if let Some(description) = &self.description {
            lesson.description = description.clone();
        }
        if let Some(video_url) = &self.video_url {
            lesson.video_url = video_url.clone();
        }
        if let Some(duration) = self.duration {
            lesson.duration = duration;
        }
        if let Some(order) = self.order {
            lesson.order = order;
        }
        if let Some(is_preview) = self.is_preview {
            lesson.is_preview = is_preview;
        }
        if let Some(content) = &self.content {
            lesson.content = content.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewChanges {
    pub rating: Option<u8>,
    pub comment: Option<Option<String>>,
    pub is_published: Option<bool>,
}

impl ReviewChanges {
    pub fn apply(&self, review: &mut Review) {
        if let Some(rating) = self.rating {
            review.rating = rating;
        }
        if let Some(comment) = &self.comment {
            review.comment = comment.clone();
        }
        if let Some(is_published) = self.is_published {
            review.is_published = is_published;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostChanges {
    pub title: Option<LocalizedText>,
    pub excerpt: Option<LocalizedText>,
    pub content: Option<LocalizedText>,
    pub category_id: Option<Option<String>>,
    pub featured_image: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
    pub read_time: Option<Option<u32>>,
}

impl BlogPostChanges {
    pub fn apply(&self, post: &mut BlogPost) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            post.excerpt = excerpt.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(category_id) = &self.category_id {
            post.category_id = category_id.clone();
        }
        if let Some(featured_image) = &self.featured_image {
            post.featured_image = featured_image.clone();
        }
        if let Some(tags) = &self.tags {
            post.tags = tags.clone();
        }
        if let Some(is_published) = self.is_published {
            post.is_published = is_published;
        }
        if let Some(read_time) = self.read_time {
            post.read_time = read_time;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogCommentChanges {
    pub content: Option<String>,
    pub is_approved: Option<bool>,
}

impl BlogCommentChanges {
    pub fn apply(&self, comment: &mut BlogComment) {
        if let Some(content) = &self.content {
            comment.content = content.clone();
        }
        if let Some(is_approved) = self.is_approved {
            comment.is_approved = is_approved;
        }
    }
}

// --- Query filters ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseFilters {
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub search: Option<String>,
    pub language: Option<CourseLanguage>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlogPostFilters {
    pub category: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub published: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Who a blog listing is for. Public listings never contain drafts,
/// whatever `published` filter is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogAudience {
    Public,
    Staff,
}

// --- Joined views ---

#[derive(Debug, Clone, Serialize)]
pub struct CourseWithRelations {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: User,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseWithInstructor {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogPostWithRelations {
    #[serde(flatten)]
    pub post: BlogPost,
    pub author: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentWithCourse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course: Course,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentWithUser {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewWithUser {
    #[serde(flatten)]
    pub review: Review,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentWithUser {
    #[serde(flatten)]
    pub comment: BlogComment,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemWithCourse {
    #[serde(flatten)]
    pub item: CartItem,
    pub course: Course,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemWithCourse {
    #[serde(flatten)]
    pub item: OrderItem,
    pub course: Course,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemWithCourse>,
}

pub mod db_operations;
pub mod localized;
