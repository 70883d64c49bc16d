use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as StdError;
use std::str::FromStr;

use super::{composite_key, Record, StoreResult};
use crate::models::{
    BlogComment, BlogPost, CartItem, Category, Course, Enrollment, Lesson, LocalizedText, Order,
    OrderItem, Review, User,
};

/// Every table the store creates, in dependency order.
pub const ALL_TABLES: &[&str] = &[
    User::TABLE,
    Category::TABLE,
    Course::TABLE,
    Lesson::TABLE,
    Enrollment::TABLE,
    Review::TABLE,
    BlogPost::TABLE,
    BlogComment::TABLE,
    CartItem::TABLE,
    Order::TABLE,
    OrderItem::TABLE,
];

// --- Value encoding ---

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: Option<&String>) -> Value {
    s.map_or(Value::Null, |s| Value::Text(s.clone()))
}

fn int(n: i64) -> Value {
    Value::Integer(n)
}

fn opt_int(n: Option<u32>) -> Value {
    n.map_or(Value::Null, |n| Value::Integer(n as i64))
}

fn flag(b: bool) -> Value {
    Value::Integer(b as i64)
}

fn time(t: &DateTime<Utc>) -> Value {
    Value::Text(t.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn opt_time(t: Option<&DateTime<Utc>>) -> Value {
    t.map_or(Value::Null, time)
}

fn json<T: Serialize>(v: &T) -> StoreResult<Value> {
    Ok(Value::Text(serde_json::to_string(v)?))
}

fn localized(l: &LocalizedText) -> [Value; 3] {
    [text(&l.default), text(&l.en), text(&l.so)]
}

// --- Value decoding ---

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn StdError + Send + Sync>>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn opt_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<Box<dyn StdError + Send + Sync>>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn opt_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn from_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn opt_from_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn localized_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<LocalizedText> {
    Ok(LocalizedText {
        default: row.get(idx)?,
        en: row.get(idx + 1)?,
        so: row.get(idx + 2)?,
    })
}

fn unsigned(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let n: i64 = row.get(idx)?;
    u32::try_from(n).map_err(|e| conversion_error(idx, e))
}

fn opt_unsigned(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u32>> {
    let n: Option<i64> = row.get(idx)?;
    n.map(|n| u32::try_from(n).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

// --- Record implementations ---

impl Record for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id", "email", "name", "role", "avatar", "bio", "is_active", "created_at", "updated_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.email),
            text(&self.name),
            text(self.role.as_str()),
            opt_text(self.avatar.as_ref()),
            opt_text(self.bio.as_ref()),
            flag(self.is_active),
            time(&self.created_at),
            time(&self.updated_at),
        ])
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: parsed(row, 3)?,
            avatar: row.get(4)?,
            bio: row.get(5)?,
            is_active: row.get(6)?,
            created_at: timestamp(row, 7)?,
            updated_at: timestamp(row, 8)?,
        })
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.clone())]
    }
}

impl Record for Category {
    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "name_en", "name_so", "description", "slug"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        let mut values = vec![text(&self.id)];
        values.extend(localized(&self.name));
        values.push(opt_text(self.description.as_ref()));
        values.push(text(&self.slug));
        Ok(values)
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get(0)?,
            name: localized_at(row, 1)?,
            description: row.get(4)?,
            slug: row.get(5)?,
        })
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("slug", self.slug.clone())]
    }
}

impl Record for Course {
    const TABLE: &'static str = "courses";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "title_en",
        "title_so",
        "description",
        "description_en",
        "description_so",
        "instructor_id",
        "category_id",
        "thumbnail",
        "price",
        "original_price",
        "level",
        "duration",
        "language",
        "is_published",
        "features",
        "requirements",
        "learning_outcomes",
        "student_count",
        "rating",
        "review_count",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        let mut values = vec![text(&self.id)];
        values.extend(localized(&self.title));
        values.extend(localized(&self.description));
        values.extend([
            text(&self.instructor_id),
            text(&self.category_id),
            text(&self.thumbnail),
            text(&self.price.to_string()),
            self.original_price
                .map_or(Value::Null, |p| Value::Text(p.to_string())),
            text(self.level.as_str()),
            text(&self.duration),
            text(self.language.as_str()),
            flag(self.is_published),
            json(&self.features)?,
            json(&self.requirements)?,
            json(&self.learning_outcomes)?,
            int(self.student_count as i64),
            text(&self.rating.to_string()),
            int(self.review_count as i64),
            time(&self.created_at),
            time(&self.updated_at),
        ]);
        Ok(values)
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get(0)?,
            title: localized_at(row, 1)?,
            description: localized_at(row, 4)?,
            instructor_id: row.get(7)?,
            category_id: row.get(8)?,
            thumbnail: row.get(9)?,
            price: parsed(row, 10)?,
            original_price: opt_parsed(row, 11)?,
            level: parsed(row, 12)?,
            duration: row.get(13)?,
            language: parsed(row, 14)?,
            is_published: row.get(15)?,
            features: from_json(row, 16)?,
            requirements: from_json(row, 17)?,
            learning_outcomes: from_json(row, 18)?,
            student_count: unsigned(row, 19)?,
            rating: parsed(row, 20)?,
            review_count: unsigned(row, 21)?,
            created_at: timestamp(row, 22)?,
            updated_at: timestamp(row, 23)?,
        })
    }
}

impl Record for Lesson {
    const TABLE: &'static str = "lessons";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "course_id",
        "title",
        "title_en",
        "title_so",
        "description",
        "video_url",
        "duration",
        "sort_order",
        "is_preview",
        "content",
        "created_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        let mut values = vec![text(&self.id), text(&self.course_id)];
        values.extend(localized(&self.title));
        values.extend([
            opt_text(self.description.as_ref()),
            opt_text(self.video_url.as_ref()),
            opt_int(self.duration),
            int(self.order as i64),
            flag(self.is_preview),
            opt_text(self.content.as_ref()),
            time(&self.created_at),
        ]);
        Ok(values)
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Lesson {
            id: row.get(0)?,
            course_id: row.get(1)?,
            title: localized_at(row, 2)?,
            description: row.get(5)?,
            video_url: row.get(6)?,
            duration: opt_unsigned(row, 7)?,
            order: row.get(8)?,
            is_preview: row.get(9)?,
            content: row.get(10)?,
            created_at: timestamp(row, 11)?,
        })
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "course_id, sort_order",
            composite_key(&[&self.course_id, &self.order.to_string()]),
        )]
    }
}

impl Record for Enrollment {
    const TABLE: &'static str = "enrollments";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "course_id",
        "progress",
        "completed_lessons",
        "enrolled_at",
        "completed_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.course_id),
            int(self.progress as i64),
            json(&self.completed_lessons)?,
            time(&self.enrolled_at),
            opt_time(self.completed_at.as_ref()),
        ])
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Enrollment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            progress: row.get(3)?,
            completed_lessons: from_json(row, 4)?,
            enrolled_at: timestamp(row, 5)?,
            completed_at: opt_timestamp(row, 6)?,
        })
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "user_id, course_id",
            composite_key(&[&self.user_id, &self.course_id]),
        )]
    }
}

impl Record for Review {
    const TABLE: &'static str = "reviews";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "course_id",
        "rating",
        "comment",
        "is_published",
        "created_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.course_id),
            int(self.rating as i64),
            opt_text(self.comment.as_ref()),
            flag(self.is_published),
            time(&self.created_at),
        ])
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Review {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            rating: row.get(3)?,
            comment: row.get(4)?,
            is_published: row.get(5)?,
            created_at: timestamp(row, 6)?,
        })
    }
}

impl Record for BlogPost {
    const TABLE: &'static str = "blog_posts";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "title_en",
        "title_so",
        "excerpt",
        "excerpt_en",
        "excerpt_so",
        "content",
        "content_en",
        "content_so",
        "author_id",
        "category_id",
        "featured_image",
        "tags",
        "is_published",
        "published_at",
        "read_time",
        "view_count",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        let mut values = vec![text(&self.id)];
        values.extend(localized(&self.title));
        values.extend(localized(&self.excerpt));
        values.extend(localized(&self.content));
        values.extend([
            text(&self.author_id),
            opt_text(self.category_id.as_ref()),
            opt_text(self.featured_image.as_ref()),
            json(&self.tags)?,
            flag(self.is_published),
            opt_time(self.published_at.as_ref()),
            opt_int(self.read_time),
            int(self.view_count as i64),
            time(&self.created_at),
            time(&self.updated_at),
        ]);
        Ok(values)
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let view_count: i64 = row.get(17)?;
        Ok(BlogPost {
            id: row.get(0)?,
            title: localized_at(row, 1)?,
            excerpt: localized_at(row, 4)?,
            content: localized_at(row, 7)?,
            author_id: row.get(10)?,
            category_id: row.get(11)?,
            featured_image: row.get(12)?,
            tags: from_json(row, 13)?,
            is_published: row.get(14)?,
            published_at: opt_timestamp(row, 15)?,
            read_time: opt_unsigned(row, 16)?,
            view_count: u64::try_from(view_count).map_err(|e| conversion_error(17, e))?,
            created_at: timestamp(row, 18)?,
            updated_at: timestamp(row, 19)?,
        })
    }
}

impl Record for BlogComment {
    const TABLE: &'static str = "blog_comments";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "post_id",
        "user_id",
        "content",
        "parent_id",
        "is_approved",
        "created_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.post_id),
            text(&self.user_id),
            text(&self.content),
            opt_text(self.parent_id.as_ref()),
            flag(self.is_approved),
            time(&self.created_at),
        ])
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BlogComment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            content: row.get(3)?,
            parent_id: row.get(4)?,
            is_approved: row.get(5)?,
            created_at: timestamp(row, 6)?,
        })
    }
}

impl Record for CartItem {
    const TABLE: &'static str = "cart_items";
    const COLUMNS: &'static [&'static str] =
        &["id", "user_id", "course_id", "quantity", "added_at"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.course_id),
            int(self.quantity as i64),
            time(&self.added_at),
        ])
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CartItem {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            quantity: unsigned(row, 3)?,
            added_at: timestamp(row, 4)?,
        })
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "user_id, course_id",
            composite_key(&[&self.user_id, &self.course_id]),
        )]
    }
}

impl Record for Order {
    const TABLE: &'static str = "orders";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "total",
        "currency",
        "payment_method",
        "payment_status",
        "payment_intent_id",
        "transaction_id",
        "metadata",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        let metadata = match &self.metadata {
            Some(m) => json(m)?,
            None => Value::Null,
        };
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.total.to_string()),
            text(&self.currency),
            text(self.payment_method.as_str()),
            text(self.payment_status.as_str()),
            opt_text(self.payment_intent_id.as_ref()),
            opt_text(self.transaction_id.as_ref()),
            metadata,
            time(&self.created_at),
            time(&self.updated_at),
        ])
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            user_id: row.get(1)?,
            total: parsed(row, 2)?,
            currency: row.get(3)?,
            payment_method: parsed(row, 4)?,
            payment_status: parsed(row, 5)?,
            payment_intent_id: row.get(6)?,
            transaction_id: row.get(7)?,
            metadata: opt_from_json(row, 8)?,
            created_at: timestamp(row, 9)?,
            updated_at: timestamp(row, 10)?,
        })
    }
}

impl Record for OrderItem {
    const TABLE: &'static str = "order_items";
    const COLUMNS: &'static [&'static str] = &["id", "order_id", "course_id", "price", "quantity"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_sql_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(&self.order_id),
            text(&self.course_id),
            text(&self.price.to_string()),
            int(self.quantity as i64),
        ])
    }

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(OrderItem {
            id: row.get(0)?,
            order_id: row.get(1)?,
            course_id: row.get(2)?,
            price: parsed(row, 3)?,
            quantity: unsigned(row, 4)?,
        })
    }
}
