use chrono::Utc;
use rust_decimal::Decimal;

use super::catalog_helpers::{
    index_by_id, new_id, newest_first, CatalogError, CatalogRepository, CatalogResult,
};
use crate::models::db_operations::{composite_key, RecordStore, StoreError};
use crate::models::{
    BlogComment, BlogCommentChanges, BlogPost, CartItem, CartItemWithCourse, CommentWithUser,
    Course, Enrollment, EnrollmentWithCourse, EnrollmentWithUser, Lesson, LessonChanges,
    NewBlogComment, NewLesson, NewOrderLine, NewReview, Order, OrderItem, OrderItemWithCourse,
    OrderWithItems, PaymentMethod, PaymentStatus, Review, ReviewChanges, ReviewWithUser, User,
};

const PAIR_KEY: &str = "user_id, course_id";
const DEFAULT_CURRENCY: &str = "USD";

/// Lessons clash on their per-course position.
fn lesson_conflict(e: CatalogError) -> CatalogError {
    match e {
        CatalogError::ConstraintViolation { .. } => CatalogError::ConstraintViolation {
            field: "order".to_string(),
        },
        other => other,
    }
}

fn validate_review_rating(rating: u8) -> CatalogResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(CatalogError::validation("rating", "must be between 1 and 5"));
    }
    Ok(())
}

fn normalize_currency(currency: Option<&str>) -> CatalogResult<String> {
    let code = currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CatalogError::validation("currency", "must be a three-letter code"));
    }
    Ok(code)
}

impl CatalogRepository {
    fn require_course(&self, course_id: &str, field: &str) -> CatalogResult<Course> {
        self.store()
            .get::<Course>(course_id)?
            .ok_or_else(|| CatalogError::validation(field, "course does not exist"))
    }

    fn require_user(&self, user_id: &str, field: &str) -> CatalogResult<User> {
        self.store()
            .get::<User>(user_id)?
            .ok_or_else(|| CatalogError::validation(field, "user does not exist"))
    }

    // --- Lessons ---

    /// Lessons of a course in presentation order.
    pub fn course_lessons(&self, course_id: &str) -> CatalogResult<Vec<Lesson>> {
        self.get_course(course_id)?;
        let mut lessons: Vec<Lesson> = self
            .store()
            .scan::<Lesson>()?
            .into_iter()
            .filter(|lesson| lesson.course_id == course_id)
            .collect();
        lessons.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(lessons)
    }

    pub fn get_lesson(&self, id: &str) -> CatalogResult<Lesson> {
        self.store()
            .get::<Lesson>(id)?
            .ok_or_else(|| CatalogError::NotFound("Lesson".to_string()))
    }

    pub fn create_lesson(&self, input: NewLesson) -> CatalogResult<Lesson> {
        self.require_course(&input.course_id, "courseId")?;
        if input.title.is_blank() {
            return Err(CatalogError::validation("title", "must not be empty"));
        }

        let lesson = Lesson {
            id: new_id(),
            course_id: input.course_id,
            title: input.title,
            description: input.description,
            video_url: input.video_url,
            duration: input.duration,
            order: input.order,
            is_preview: input.is_preview,
            content: input.content,
            created_at: Utc::now(),
        };
        self.store()
            .insert(&lesson)
            .map_err(|e| lesson_conflict(e.into()))?;
        Ok(lesson)
    }

    pub fn update_lesson(&self, id: &str, changes: LessonChanges) -> CatalogResult<Lesson> {
        self.store()
            .update::<Lesson, _>(id, |lesson| changes.apply(lesson))
            .map_err(|e| lesson_conflict(e.into()))?
            .ok_or_else(|| CatalogError::NotFound("Lesson".to_string()))
    }

    // --- Enrollments ---

    pub fn enroll_user(&self, user_id: &str, course_id: &str) -> CatalogResult<Enrollment> {
        self.require_user(user_id, "userId")?;
        self.require_course(course_id, "courseId")?;

        let enrollment = Enrollment {
            id: new_id(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            progress: 0,
            completed_lessons: Vec::new(),
            enrolled_at: Utc::now(),
            completed_at: None,
        };
        self.store().insert(&enrollment).map_err(|e| match CatalogError::from(e) {
            CatalogError::ConstraintViolation { .. } => CatalogError::ConstraintViolation {
                field: "enrollment".to_string(),
            },
            other => other,
        })?;
        log::info!("User {} enrolled in course {}", user_id, course_id);

        self.refresh_course_stats(course_id)?;
        Ok(enrollment)
    }

    pub fn is_user_enrolled(&self, user_id: &str, course_id: &str) -> CatalogResult<bool> {
        Ok(self
            .store()
            .find_unique::<Enrollment>(PAIR_KEY, &composite_key(&[user_id, course_id]))?
            .is_some())
    }

    /// The user's enrollments with their courses, most recent first.
    pub fn user_enrollments(&self, user_id: &str) -> CatalogResult<Vec<EnrollmentWithCourse>> {
        let mut enrollments: Vec<Enrollment> = self
            .store()
            .scan::<Enrollment>()?
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .collect();
        enrollments.sort_by(|a, b| newest_first(&a.enrolled_at, &a.id, &b.enrolled_at, &b.id));

        let courses = index_by_id(self.store().scan::<Course>()?);
        Ok(enrollments
            .into_iter()
            .filter_map(|enrollment| {
                let course = courses.get(&enrollment.course_id)?.clone();
                Some(EnrollmentWithCourse { enrollment, course })
            })
            .collect())
    }

    pub fn course_enrollments(&self, course_id: &str) -> CatalogResult<Vec<EnrollmentWithUser>> {
        let mut enrollments: Vec<Enrollment> = self
            .store()
            .scan::<Enrollment>()?
            .into_iter()
            .filter(|e| e.course_id == course_id)
            .collect();
        enrollments.sort_by(|a, b| newest_first(&a.enrolled_at, &a.id, &b.enrolled_at, &b.id));

        let users = index_by_id(self.store().scan::<User>()?);
        Ok(enrollments
            .into_iter()
            .filter_map(|enrollment| {
                let user = users.get(&enrollment.user_id)?.clone();
                Some(EnrollmentWithUser { enrollment, user })
            })
            .collect())
    }

    /// Records progress; reaching 100 stamps `completed_at` once.
    pub fn update_enrollment_progress(
        &self,
        id: &str,
        progress: u8,
        completed_lessons: Option<Vec<String>>,
    ) -> CatalogResult<Enrollment> {
        if progress > 100 {
            return Err(CatalogError::validation("progress", "must be between 0 and 100"));
        }

        self.store()
            .update::<Enrollment, _>(id, |enrollment| {
                enrollment.progress = progress;
                if let Some(lessons) = completed_lessons {
                    enrollment.completed_lessons = lessons;
                }
                if progress == 100 && enrollment.completed_at.is_none() {
                    enrollment.completed_at = Some(Utc::now());
                }
            })?
            .ok_or_else(|| CatalogError::NotFound("Enrollment".to_string()))
    }

    // --- Reviews ---

    /// One review per user and course.
    pub fn create_review(&self, input: NewReview) -> CatalogResult<Review> {
        validate_review_rating(input.rating)?;
        self.require_user(&input.user_id, "userId")?;
        self.require_course(&input.course_id, "courseId")?;
        if self.get_user_review(&input.user_id, &input.course_id)?.is_some() {
            return Err(CatalogError::ConstraintViolation {
                field: "review".to_string(),
            });
        }

        let review = Review {
            id: new_id(),
            user_id: input.user_id,
            course_id: input.course_id,
            rating: input.rating,
            comment: input.comment,
            is_published: true,
            created_at: Utc::now(),
        };
        self.store().insert(&review)?;
        self.refresh_course_stats(&review.course_id)?;
        Ok(review)
    }

    pub fn update_review(&self, id: &str, changes: ReviewChanges) -> CatalogResult<Review> {
        if let Some(rating) = changes.rating {
            validate_review_rating(rating)?;
        }
        let review = self
            .store()
            .update::<Review, _>(id, |review| changes.apply(review))?
            .ok_or_else(|| CatalogError::NotFound("Review".to_string()))?;
        self.refresh_course_stats(&review.course_id)?;
        Ok(review)
    }

    pub fn get_user_review(&self, user_id: &str, course_id: &str) -> CatalogResult<Option<Review>> {
        Ok(self
            .store()
            .scan::<Review>()?
            .into_iter()
            .find(|r| r.user_id == user_id && r.course_id == course_id))
    }

    /// Published reviews of a course with their authors, newest first.
    pub fn course_reviews(&self, course_id: &str) -> CatalogResult<Vec<ReviewWithUser>> {
        self.get_course(course_id)?;
        let mut reviews: Vec<Review> = self
            .store()
            .scan::<Review>()?
            .into_iter()
            .filter(|r| r.course_id == course_id && r.is_published)
            .collect();
        reviews.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));

        let users = index_by_id(self.store().scan::<User>()?);
        Ok(reviews
            .into_iter()
            .filter_map(|review| {
                let user = users.get(&review.user_id)?.clone();
                Some(ReviewWithUser { review, user })
            })
            .collect())
    }

    /// Recomputes rating, review count and student count from the reviews
    /// and enrollments on record, then overwrites them.
    pub fn refresh_course_stats(&self, course_id: &str) -> CatalogResult<Course> {
        let ratings: Vec<Decimal> = self
            .store()
            .scan::<Review>()?
            .into_iter()
            .filter(|r| r.course_id == course_id && r.is_published)
            .map(|r| Decimal::from(r.rating))
            .collect();
        let students = self
            .store()
            .scan::<Enrollment>()?
            .iter()
            .filter(|e| e.course_id == course_id)
            .count();

        let rating = if ratings.is_empty() {
            Decimal::ZERO
        } else {
            let sum: Decimal = ratings.iter().copied().sum();
            (sum / Decimal::from(ratings.len() as u64)).round_dp(2)
        };
        self.update_course_stats(course_id, rating, ratings.len() as u32, students as u32)
    }

    // --- Blog comments ---

    pub fn create_blog_comment(&self, input: NewBlogComment) -> CatalogResult<BlogComment> {
        if input.content.trim().is_empty() {
            return Err(CatalogError::validation("content", "must not be empty"));
        }
        if self.store().get::<BlogPost>(&input.post_id)?.is_none() {
            return Err(CatalogError::validation("postId", "blog post does not exist"));
        }
        self.require_user(&input.user_id, "userId")?;
        if let Some(parent_id) = &input.parent_id {
            match self.store().get::<BlogComment>(parent_id)? {
                Some(parent) if parent.post_id == input.post_id => {}
                _ => {
                    return Err(CatalogError::validation(
                        "parentId",
                        "parent comment must belong to the same post",
                    ))
                }
            }
        }

        let comment = BlogComment {
            id: new_id(),
            post_id: input.post_id,
            user_id: input.user_id,
            content: input.content.trim().to_string(),
            parent_id: input.parent_id,
            is_approved: false,
            created_at: Utc::now(),
        };
        self.store().insert(&comment)?;
        Ok(comment)
    }

    pub fn update_blog_comment(&self, id: &str, changes: BlogCommentChanges) -> CatalogResult<BlogComment> {
        if let Some(content) = &changes.content {
            if content.trim().is_empty() {
                return Err(CatalogError::validation("content", "must not be empty"));
            }
        }
        self.store()
            .update::<BlogComment, _>(id, |comment| changes.apply(comment))?
            .ok_or_else(|| CatalogError::NotFound("Comment".to_string()))
    }

    /// Approved comments on a post with their authors, oldest first so
    /// threads read top to bottom.
    pub fn post_comments(&self, post_id: &str) -> CatalogResult<Vec<CommentWithUser>> {
        if self.store().get::<BlogPost>(post_id)?.is_none() {
            return Err(CatalogError::NotFound("Blog post".to_string()));
        }
        let mut comments: Vec<BlogComment> = self
            .store()
            .scan::<BlogComment>()?
            .into_iter()
            .filter(|c| c.post_id == post_id && c.is_approved)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let users = index_by_id(self.store().scan::<User>()?);
        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                let user = users.get(&comment.user_id)?.clone();
                Some(CommentWithUser { comment, user })
            })
            .collect())
    }

    // --- Cart ---

    /// Adding a course already in the cart raises its quantity instead.
    pub fn add_to_cart(&self, user_id: &str, course_id: &str, quantity: u32) -> CatalogResult<CartItem> {
        if quantity == 0 {
            return Err(CatalogError::validation("quantity", "must be at least 1"));
        }
        self.require_user(user_id, "userId")?;
        self.require_course(course_id, "courseId")?;

        if let Some(item) = self.raise_cart_quantity(user_id, course_id, quantity)? {
            return Ok(item);
        }

        let item = CartItem {
            id: new_id(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            quantity,
            added_at: Utc::now(),
        };
        match self.store().insert(&item) {
            Ok(()) => Ok(item),
            // Another request created the row first; merge into it.
            Err(StoreError::ConstraintViolation { .. }) => self
                .raise_cart_quantity(user_id, course_id, quantity)?
                .ok_or_else(|| CatalogError::NotFound("Cart item".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn raise_cart_quantity(
        &self,
        user_id: &str,
        course_id: &str,
        quantity: u32,
    ) -> CatalogResult<Option<CartItem>> {
        let key = composite_key(&[user_id, course_id]);
        let existing = match self.store().find_unique::<CartItem>(PAIR_KEY, &key)? {
            Some(existing) => existing,
            None => return Ok(None),
        };

        let mut overflowed = false;
        let updated = self
            .store()
            .update::<CartItem, _>(&existing.id, |item| match item.quantity.checked_add(quantity) {
                Some(total) => item.quantity = total,
                None => overflowed = true,
            })?;
        if overflowed {
            return Err(CatalogError::validation("quantity", "is too large"));
        }
        Ok(updated)
    }

    pub fn user_cart(&self, user_id: &str) -> CatalogResult<Vec<CartItemWithCourse>> {
        let mut items: Vec<CartItem> = self
            .store()
            .scan::<CartItem>()?
            .into_iter()
            .filter(|item| item.user_id == user_id)
            .collect();
        items.sort_by(|a, b| newest_first(&a.added_at, &a.id, &b.added_at, &b.id));

        let courses = index_by_id(self.store().scan::<Course>()?);
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let course = courses.get(&item.course_id)?.clone();
                Some(CartItemWithCourse { item, course })
            })
            .collect())
    }

    pub fn update_cart_item_quantity(&self, id: &str, quantity: u32) -> CatalogResult<CartItem> {
        if quantity == 0 {
            return Err(CatalogError::validation("quantity", "must be at least 1"));
        }
        self.store()
            .update::<CartItem, _>(id, |item| item.quantity = quantity)?
            .ok_or_else(|| CatalogError::NotFound("Cart item".to_string()))
    }

    pub fn remove_from_cart(&self, id: &str) -> CatalogResult<()> {
        if !self.store().delete::<CartItem>(id)? {
            return Err(CatalogError::NotFound("Cart item".to_string()));
        }
        Ok(())
    }

    /// Returns how many items were removed.
    pub fn clear_user_cart(&self, user_id: &str) -> CatalogResult<usize> {
        let mut removed = 0;
        for item in self.store().scan::<CartItem>()? {
            if item.user_id == user_id && self.store().delete::<CartItem>(&item.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    // --- Orders ---

    /// Places an order at the courses' current prices. The order and all its
    /// items are written together or not at all.
    pub fn create_order(
        &self,
        user_id: &str,
        payment_method: PaymentMethod,
        currency: Option<&str>,
        metadata: Option<serde_json::Value>,
        lines: &[NewOrderLine],
    ) -> CatalogResult<OrderWithItems> {
        if lines.is_empty() {
            return Err(CatalogError::validation("items", "an order needs at least one course"));
        }
        let currency = normalize_currency(currency)?;
        self.require_user(user_id, "userId")?;

        let order_id = new_id();
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                return Err(CatalogError::validation("quantity", "must be at least 1"));
            }
            let course = self.require_course(&line.course_id, "courseId")?;
            let item = OrderItem {
                id: new_id(),
                order_id: order_id.clone(),
                course_id: course.id.clone(),
                price: course.price,
                quantity: line.quantity,
            };
            items.push(OrderItemWithCourse { item, course });
        }

        let total: Decimal = items
            .iter()
            .map(|line| line.item.price * Decimal::from(line.item.quantity))
            .sum();
        let now = Utc::now();
        let order = Order {
            id: order_id,
            user_id: user_id.to_string(),
            total,
            currency,
            payment_method,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
            transaction_id: None,
            metadata,
            created_at: now,
            updated_at: now,
        };

        let rows: Vec<OrderItem> = items.iter().map(|line| line.item.clone()).collect();
        self.store().insert_order(&order, &rows)?;
        log::info!("Created order {} for user {} totalling {} {}", order.id, user_id, order.total, order.currency);
        Ok(OrderWithItems { order, items })
    }

    /// Turns the user's cart into a pending order and empties the cart.
    pub fn checkout_cart(&self, user_id: &str, payment_method: PaymentMethod) -> CatalogResult<OrderWithItems> {
        let lines: Vec<NewOrderLine> = self
            .user_cart(user_id)?
            .into_iter()
            .map(|entry| NewOrderLine {
                course_id: entry.item.course_id,
                quantity: entry.item.quantity,
            })
            .collect();
        if lines.is_empty() {
            return Err(CatalogError::validation("cart", "cart is empty"));
        }

        let order = self.create_order(user_id, payment_method, None, None, &lines)?;
        self.clear_user_cart(user_id)?;
        Ok(order)
    }

    fn order_with_items(&self, order: Order, all_items: &[OrderItem]) -> CatalogResult<OrderWithItems> {
        let mut items = Vec::new();
        for item in all_items.iter().filter(|item| item.order_id == order.id) {
            match self.store().get::<Course>(&item.course_id)? {
                Some(course) => items.push(OrderItemWithCourse {
                    item: item.clone(),
                    course,
                }),
                None => log::warn!("Order item {} references missing course {}", item.id, item.course_id),
            }
        }
        Ok(OrderWithItems { order, items })
    }

    pub fn get_order(&self, id: &str) -> CatalogResult<OrderWithItems> {
        let order = self
            .store()
            .get::<Order>(id)?
            .ok_or_else(|| CatalogError::NotFound("Order".to_string()))?;
        let items = self.store().scan::<OrderItem>()?;
        self.order_with_items(order, &items)
    }

    pub fn user_orders(&self, user_id: &str) -> CatalogResult<Vec<OrderWithItems>> {
        let mut orders: Vec<Order> = self
            .store()
            .scan::<Order>()?
            .into_iter()
            .filter(|order| order.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| newest_first(&a.created_at, &a.id, &b.created_at, &b.id));

        let items = self.store().scan::<OrderItem>()?;
        orders
            .into_iter()
            .map(|order| self.order_with_items(order, &items))
            .collect()
    }

    /// Moves an order along `pending -> completed | failed` or
    /// `completed -> refunded`.
    pub fn update_order_status(
        &self,
        id: &str,
        next: PaymentStatus,
        transaction_id: Option<String>,
    ) -> CatalogResult<Order> {
        let mut rejected_from = None;
        let order = self
            .store()
            .update::<Order, _>(id, |order| {
                if !order.payment_status.can_transition_to(next) {
                    rejected_from = Some(order.payment_status);
                    return;
                }
                order.payment_status = next;
                if transaction_id.is_some() {
                    order.transaction_id = transaction_id;
                }
                order.updated_at = Utc::now();
            })?
            .ok_or_else(|| CatalogError::NotFound("Order".to_string()))?;

        if let Some(current) = rejected_from {
            return Err(CatalogError::validation(
                "paymentStatus",
                format!("cannot move from {} to {}", current, next),
            ));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::Storage;
    use crate::models::{
        CourseLanguage, CourseLevel, LocalizedText, NewCategory, NewCourse, NewUser, UserRole,
    };
    use std::str::FromStr;

    struct Fixture {
        repo: CatalogRepository,
        student: User,
        course: Course,
    }

    fn fixture() -> Fixture {
        let repo = CatalogRepository::new(Storage::memory().unwrap());
        let user = |email: &str, role| NewUser {
            email: email.to_string(),
            name: email.to_string(),
            role,
            avatar: None,
            bio: None,
        };
        let instructor = repo.create_user(user("ahmed@example.com", UserRole::Instructor)).unwrap();
        let student = repo.create_user(user("fatima@example.com", UserRole::Student)).unwrap();
        let category = repo
            .create_category(NewCategory {
                name: LocalizedText::uniform("Business"),
                description: None,
                slug: "business".to_string(),
            })
            .unwrap();
        let course = repo
            .create_course(NewCourse {
                title: LocalizedText::uniform("Entrepreneurship"),
                description: LocalizedText::uniform("Start a business"),
                instructor_id: instructor.id.clone(),
                category_id: category.id.clone(),
                thumbnail: "/biz.png".to_string(),
                price: Decimal::from_str("34.99").unwrap(),
                original_price: None,
                level: CourseLevel::Beginner,
                duration: "6h".to_string(),
                language: CourseLanguage::So,
                is_published: true,
                features: vec![],
                requirements: vec![],
                learning_outcomes: vec![],
            })
            .unwrap();
        Fixture { repo, student, course }
    }

    fn lesson(course_id: &str, order: i32) -> NewLesson {
        NewLesson {
            course_id: course_id.to_string(),
            title: LocalizedText::uniform(format!("Lesson {}", order)),
            description: None,
            video_url: None,
            duration: Some(10),
            order,
            is_preview: order == 1,
            content: None,
        }
    }

    #[test]
    fn lessons_come_back_in_order_and_positions_are_unique() {
        let f = fixture();
        f.repo.create_lesson(lesson(&f.course.id, 2)).unwrap();
        f.repo.create_lesson(lesson(&f.course.id, 1)).unwrap();

        let orders: Vec<i32> = f
            .repo
            .course_lessons(&f.course.id)
            .unwrap()
            .iter()
            .map(|l| l.order)
            .collect();
        assert_eq!(orders, vec![1, 2]);

        assert!(matches!(
            f.repo.create_lesson(lesson(&f.course.id, 2)),
            Err(CatalogError::ConstraintViolation { field }) if field == "order"
        ));
    }

    #[test]
    fn enrollment_is_unique_and_counts_students() {
        let f = fixture();
        f.repo.enroll_user(&f.student.id, &f.course.id).unwrap();
        assert!(f.repo.is_user_enrolled(&f.student.id, &f.course.id).unwrap());
        assert_eq!(f.repo.get_course(&f.course.id).unwrap().student_count, 1);

        assert!(matches!(
            f.repo.enroll_user(&f.student.id, &f.course.id),
            Err(CatalogError::ConstraintViolation { .. })
        ));
        assert_eq!(f.repo.user_enrollments(&f.student.id).unwrap().len(), 1);
    }

    #[test]
    fn finishing_a_course_stamps_completion_once() {
        let f = fixture();
        let enrollment = f.repo.enroll_user(&f.student.id, &f.course.id).unwrap();

        assert!(matches!(
            f.repo.update_enrollment_progress(&enrollment.id, 101, None),
            Err(CatalogError::Validation { .. })
        ));
        let done = f.repo.update_enrollment_progress(&enrollment.id, 100, None).unwrap();
        let stamped = done.completed_at.unwrap();
        let again = f.repo.update_enrollment_progress(&enrollment.id, 100, None).unwrap();
        assert_eq!(again.completed_at, Some(stamped));
    }

    #[test]
    fn reviews_drive_the_course_rating() {
        let f = fixture();
        let other = f
            .repo
            .create_user(NewUser {
                email: "third@example.com".to_string(),
                name: "Third".to_string(),
                role: UserRole::Student,
                avatar: None,
                bio: None,
            })
            .unwrap();
        let review = |user_id: &str, rating| NewReview {
            user_id: user_id.to_string(),
            course_id: f.course.id.clone(),
            rating,
            comment: None,
        };

        f.repo.create_review(review(&f.student.id, 5)).unwrap();
        let second = f.repo.create_review(review(&other.id, 4)).unwrap();
        let course = f.repo.get_course(&f.course.id).unwrap();
        assert_eq!(course.rating, Decimal::from_str("4.5").unwrap());
        assert_eq!(course.review_count, 2);

        assert!(matches!(
            f.repo.create_review(review(&f.student.id, 3)),
            Err(CatalogError::ConstraintViolation { .. })
        ));
        assert!(matches!(
            f.repo.create_review(review(&other.id, 0)),
            Err(CatalogError::Validation { .. })
        ));

        f.repo
            .update_review(
                &second.id,
                ReviewChanges {
                    is_published: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let course = f.repo.get_course(&f.course.id).unwrap();
        assert_eq!((course.rating, course.review_count), (Decimal::from(5), 1));
        assert_eq!(f.repo.course_reviews(&f.course.id).unwrap().len(), 1);
    }

    #[test]
    fn re_adding_to_cart_raises_quantity() {
        let f = fixture();
        let first = f.repo.add_to_cart(&f.student.id, &f.course.id, 1).unwrap();
        let second = f.repo.add_to_cart(&f.student.id, &f.course.id, 2).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);
        assert_eq!(f.repo.user_cart(&f.student.id).unwrap().len(), 1);
        assert!(matches!(
            f.repo.update_cart_item_quantity(&first.id, 0),
            Err(CatalogError::Validation { .. })
        ));
    }

    #[test]
    fn cart_quantity_overflow_is_rejected() {
        let f = fixture();
        let item = f.repo.add_to_cart(&f.student.id, &f.course.id, 2).unwrap();

        let err = f.repo.add_to_cart(&f.student.id, &f.course.id, u32::MAX).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "quantity"));
        assert_eq!(f.repo.user_cart(&f.student.id).unwrap()[0].item.quantity, item.quantity);
    }

    #[test]
    fn simultaneous_first_adds_merge_into_one_row() {
        let f = fixture();
        let results: Vec<_> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| f.repo.add_to_cart(&f.student.id, &f.course.id, 1)))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(results.iter().all(|r| r.is_ok()));
        let cart = f.repo.user_cart(&f.student.id).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].item.quantity, 8);
    }

    #[test]
    fn order_keeps_the_price_paid() {
        let f = fixture();
        let placed = f
            .repo
            .create_order(
                &f.student.id,
                PaymentMethod::Zaad,
                None,
                None,
                &[NewOrderLine {
                    course_id: f.course.id.clone(),
                    quantity: 2,
                }],
            )
            .unwrap();
        assert_eq!(placed.order.total, Decimal::from_str("69.98").unwrap());
        assert_eq!(placed.order.currency, "USD");

        f.repo
            .update_course(
                &f.course.id,
                crate::models::CourseChanges {
                    price: Some(Decimal::from(99)),
                    ..Default::default()
                },
            )
            .unwrap();
        let stored = f.repo.get_order(&placed.order.id).unwrap();
        assert_eq!(stored.items[0].item.price, Decimal::from_str("34.99").unwrap());
    }

    #[test]
    fn order_with_unknown_course_leaves_nothing_behind() {
        let f = fixture();
        let result = f.repo.create_order(
            &f.student.id,
            PaymentMethod::Stripe,
            Some("usd"),
            None,
            &[
                NewOrderLine {
                    course_id: f.course.id.clone(),
                    quantity: 1,
                },
                NewOrderLine {
                    course_id: "no-such-course".to_string(),
                    quantity: 1,
                },
            ],
        );
        assert!(result.is_err());
        assert!(f.repo.user_orders(&f.student.id).unwrap().is_empty());
    }

    #[test]
    fn checkout_empties_the_cart() {
        let f = fixture();
        f.repo.add_to_cart(&f.student.id, &f.course.id, 1).unwrap();
        let placed = f.repo.checkout_cart(&f.student.id, PaymentMethod::Evcplus).unwrap();

        assert_eq!(placed.items.len(), 1);
        assert!(f.repo.user_cart(&f.student.id).unwrap().is_empty());
        assert!(matches!(
            f.repo.checkout_cart(&f.student.id, PaymentMethod::Evcplus),
            Err(CatalogError::Validation { field, .. }) if field == "cart"
        ));
    }

    #[test]
    fn payment_status_follows_the_state_machine() {
        let f = fixture();
        f.repo.add_to_cart(&f.student.id, &f.course.id, 1).unwrap();
        let placed = f.repo.checkout_cart(&f.student.id, PaymentMethod::Stripe).unwrap();
        let id = placed.order.id;

        assert!(matches!(
            f.repo.update_order_status(&id, PaymentStatus::Refunded, None),
            Err(CatalogError::Validation { .. })
        ));
        let paid = f
            .repo
            .update_order_status(&id, PaymentStatus::Completed, Some("txn-1".to_string()))
            .unwrap();
        assert_eq!(paid.transaction_id.as_deref(), Some("txn-1"));
        let refunded = f.repo.update_order_status(&id, PaymentStatus::Refunded, None).unwrap();
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
        assert_eq!(refunded.transaction_id.as_deref(), Some("txn-1"));
    }

    #[test]
    fn replies_must_stay_on_the_same_post() {
        let f = fixture();
        let author = f.repo.get_user_by_email("ahmed@example.com").unwrap().unwrap();
        let new_post = |title: &str| crate::models::NewBlogPost {
            title: LocalizedText::uniform(title),
            excerpt: LocalizedText::uniform(title),
            content: LocalizedText::uniform(title),
            author_id: author.id.clone(),
            category_id: None,
            featured_image: None,
            tags: vec![],
            is_published: true,
            read_time: None,
        };
        let first = f.repo.create_blog_post(new_post("One")).unwrap();
        let second = f.repo.create_blog_post(new_post("Two")).unwrap();

        let comment = f
            .repo
            .create_blog_comment(NewBlogComment {
                post_id: first.id.clone(),
                user_id: f.student.id.clone(),
                content: "Mahadsanid".to_string(),
                parent_id: None,
            })
            .unwrap();
        assert!(f.repo.post_comments(&first.id).unwrap().is_empty());

        f.repo
            .update_blog_comment(
                &comment.id,
                BlogCommentChanges {
                    is_approved: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(f.repo.post_comments(&first.id).unwrap().len(), 1);

        let stray_reply = f.repo.create_blog_comment(NewBlogComment {
            post_id: second.id.clone(),
            user_id: f.student.id.clone(),
            content: "Reply".to_string(),
            parent_id: Some(comment.id.clone()),
        });
        assert!(matches!(
            stray_reply,
            Err(CatalogError::Validation { field, .. }) if field == "parentId"
        ));
    }
}
