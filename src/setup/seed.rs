use rust_decimal::Decimal;
use std::str::FromStr;

use crate::helper::catalog_helpers::{CatalogError, CatalogRepository, CatalogResult};
use crate::models::{
    Category, CourseLanguage, CourseLevel, LocalizedText, NewBlogPost, NewCategory, NewCourse,
    NewLesson, NewUser, User, UserRole,
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub users: usize,
    pub courses: usize,
    pub lessons: usize,
    pub blog_posts: usize,
}

fn price(raw: &str) -> CatalogResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| CatalogError::validation("price", e.to_string()))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct CourseSeed<'a> {
    title: (&'a str, &'a str),
    description: (&'a str, &'a str),
    price: &'a str,
    original_price: Option<&'a str>,
    level: CourseLevel,
    duration: &'a str,
    features: &'a [&'a str],
    requirements: &'a [&'a str],
    outcomes: &'a [&'a str],
}

fn course_input(seed: &CourseSeed, instructor: &User, category: &Category) -> CatalogResult<NewCourse> {
    Ok(NewCourse {
        title: LocalizedText::new(seed.title.0, seed.title.0, seed.title.1),
        description: LocalizedText::new(seed.description.0, seed.description.0, seed.description.1),
        instructor_id: instructor.id.clone(),
        category_id: category.id.clone(),
        thumbnail: "/assets/thumbnails/course.png".to_string(),
        price: price(seed.price)?,
        original_price: seed.original_price.map(price).transpose()?,
        level: seed.level,
        duration: seed.duration.to_string(),
        language: CourseLanguage::Both,
        is_published: true,
        features: strings(seed.features),
        requirements: strings(seed.requirements),
        learning_outcomes: strings(seed.outcomes),
    })
}

/// Loads the demo catalog. Does nothing when the `programming` category is
/// already present, so it is safe to run on every start.
pub fn seed_demo_catalog(catalog: &CatalogRepository) -> CatalogResult<SeedSummary> {
    let already_seeded = catalog
        .list_categories()?
        .iter()
        .any(|category| category.slug == "programming");
    if already_seeded {
        log::info!("Demo catalog already present, skipping seed");
        return Ok(SeedSummary::default());
    }

    let mut summary = SeedSummary::default();

    let mut categories = Vec::new();
    for (name, somali, description, slug) in [
        ("Programming", "Barnaamij", "Programming courses", "programming"),
        ("Digital Marketing", "Suuq-geeynta Dijitaal", "Digital marketing courses", "digital-marketing"),
        ("Business", "Ganacsi", "Business courses", "business"),
    ] {
        categories.push(catalog.create_category(NewCategory {
            name: LocalizedText::new(name, name, somali),
            description: Some(description.to_string()),
            slug: slug.to_string(),
        })?);
        summary.categories += 1;
    }

    let ahmed = catalog.create_user(NewUser {
        email: "ahmed@example.com".to_string(),
        name: "Ahmed Mohamed".to_string(),
        role: UserRole::Instructor,
        avatar: Some("/assets/avatars/ahmed.png".to_string()),
        bio: Some("Experienced software developer with 10+ years in the industry".to_string()),
    })?;
    let fatima = catalog.create_user(NewUser {
        email: "fatima@example.com".to_string(),
        name: "Fatima Ali".to_string(),
        role: UserRole::Instructor,
        avatar: Some("/assets/avatars/fatima.png".to_string()),
        bio: Some("Digital marketing expert and entrepreneur".to_string()),
    })?;
    summary.users += 2;

    let courses = [
        (
            CourseSeed {
                title: ("Python Programming Basics", "Python Programming Bilaaga"),
                description: (
                    "Learn Python programming from scratch with hands-on projects",
                    "Baro Python programming bilowga ah oo ay weheliyaan mashruuco gacmeed",
                ),
                price: "29.99",
                original_price: Some("49.99"),
                level: CourseLevel::Beginner,
                duration: "8 hours",
                features: &["Video Lessons", "Hands-on Projects", "Certificate"],
                requirements: &["Basic computer skills"],
                outcomes: &["Learn Python syntax", "Build projects", "Understand programming concepts"],
            },
            &ahmed,
            &categories[0],
        ),
        (
            CourseSeed {
                title: ("Digital Marketing Mastery", "Suuq-geeynta Dijitaal ee Horumar"),
                description: (
                    "Master digital marketing strategies for modern businesses",
                    "Baro xeeladaha suuq-geeynta dijitaal ee ganacsiga casriga ah",
                ),
                price: "39.99",
                original_price: Some("59.99"),
                level: CourseLevel::Intermediate,
                duration: "12 hours",
                features: &["Expert Content", "Case Studies", "Templates"],
                requirements: &["Basic business knowledge"],
                outcomes: &["Social media marketing", "SEO optimization", "Content strategy"],
            },
            &fatima,
            &categories[1],
        ),
        (
            CourseSeed {
                title: ("JavaScript Web Development", "JavaScript Horumarinta Websaydhka"),
                description: (
                    "Build modern web applications with JavaScript and React",
                    "Dhis websaydhyo casri ah JavaScript iyo React",
                ),
                price: "34.99",
                original_price: None,
                level: CourseLevel::Intermediate,
                duration: "15 hours",
                features: &["Live Coding", "Real Projects", "Code Reviews"],
                requirements: &["Basic HTML/CSS", "Programming fundamentals"],
                outcomes: &["JavaScript mastery", "React framework", "Web app deployment"],
            },
            &ahmed,
            &categories[0],
        ),
        (
            CourseSeed {
                title: ("Social Media Marketing", "Suuq-geeynta Baraha Bulshada"),
                description: (
                    "Grow your brand on social media platforms effectively",
                    "Kordhi sumadaada baraha bulshada si hufan",
                ),
                price: "24.99",
                original_price: Some("39.99"),
                level: CourseLevel::Beginner,
                duration: "6 hours",
                features: &["Platform Strategies", "Content Planning", "Analytics"],
                requirements: &["Social media account"],
                outcomes: &["Platform optimization", "Content creation", "Engagement strategies"],
            },
            &fatima,
            &categories[1],
        ),
    ];

    let mut created_courses = Vec::new();
    for (seed, instructor, category) in &courses {
        created_courses.push(catalog.create_course(course_input(seed, instructor, category)?)?);
        summary.courses += 1;
    }

    let python = &created_courses[0];
    for (order, (title, somali)) in [
        ("Installing Python", "Rakibidda Python"),
        ("Variables and Types", "Doorsoomayaasha iyo Noocyada"),
        ("Functions", "Hawlaha"),
    ]
    .into_iter()
    .enumerate()
    {
        catalog.create_lesson(NewLesson {
            course_id: python.id.clone(),
            title: LocalizedText::new(title, title, somali),
            description: None,
            video_url: None,
            duration: Some(15),
            order: order as i32 + 1,
            is_preview: order == 0,
            content: None,
        })?;
        summary.lessons += 1;
    }

    let posts = [
        (
            ("Getting Started with Programming", "Bilowga Barnaamijka"),
            (
                "A comprehensive beginner's guide to programming fundamentals",
                "Tilmaame dhamaystiran oo loogu talagalay bilowga barnaamijka",
            ),
            (
                "Programming is the process of creating instructions for computers...",
                "Barnaamijku waa habka loo abuurayo tilmaamo kombiyuutarada...",
            ),
            &ahmed,
            &categories[0],
            &["programming", "beginner", "tutorial"],
            5,
        ),
        (
            ("Digital Marketing Trends 2024", "Isbeddellada Suuq-geeynta Dijitaal 2024"),
            (
                "Discover the latest trends shaping digital marketing in 2024",
                "Ogaada isbeddellada cusub ee qaabeynaya suuq-geeynta dijitaal 2024",
            ),
            (
                "Digital marketing continues to evolve rapidly...",
                "Suuq-geeynta dijitaal ayaa sii socdaa isbeddel degdeg ah...",
            ),
            &fatima,
            &categories[1],
            &["marketing", "trends", "2024"],
            8,
        ),
        (
            ("Building Your First Web App", "Dhisidda Websaydhkaaga Ugu Horreeyay"),
            (
                "A step-by-step guide to building your first web application",
                "Tilmaame tallaabo-tallaabo ah oo lagu dhisayo websaydhkaaga ugu horreeyay",
            ),
            (
                "Building web applications has become more accessible than ever...",
                "Dhisidda websaydhyada ayaa noqotay mid la heli karo...",
            ),
            &ahmed,
            &categories[0],
            &["web development", "tutorial", "beginner"],
            12,
        ),
    ];

    for (title, excerpt, content, author, category, tags, read_time) in posts {
        catalog.create_blog_post(NewBlogPost {
            title: LocalizedText::new(title.0, title.0, title.1),
            excerpt: LocalizedText::new(excerpt.0, excerpt.0, excerpt.1),
            content: LocalizedText::new(content.0, content.0, content.1),
            author_id: author.id.clone(),
            category_id: Some(category.id.clone()),
            featured_image: None,
            tags: strings(tags),
            is_published: true,
            read_time: Some(read_time),
        })?;
        summary.blog_posts += 1;
    }

    log::info!("Seeded demo catalog: {:?}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::Storage;
    use crate::models::{BlogAudience, BlogPostFilters, CourseFilters};

    #[test]
    fn seeding_twice_only_loads_once() {
        let catalog = CatalogRepository::new(Storage::memory().unwrap());
        let first = seed_demo_catalog(&catalog).unwrap();
        assert_eq!(first.courses, 4);
        assert_eq!(first.blog_posts, 3);

        assert_eq!(seed_demo_catalog(&catalog).unwrap(), SeedSummary::default());
        assert_eq!(catalog.list_courses(&CourseFilters::default()).unwrap().len(), 4);
        assert_eq!(
            catalog
                .list_blog_posts(&BlogPostFilters::default(), BlogAudience::Public)
                .unwrap()
                .len(),
            3
        );
    }
}
