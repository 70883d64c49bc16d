use clap::{Parser, Subcommand};
use edusomal_backend::config::{Config, StorageBackend};
use edusomal_backend::helper::catalog_helpers::CatalogRepository;
use edusomal_backend::models::db_operations::Storage;
use edusomal_backend::models::{NewUser, UserRole};
use edusomal_backend::setup::seed;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "edusomal_setup", author, version, about = "Prepares and inspects the catalog database.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the catalog database and its tables.
    Setup,
    /// Loads the demo categories, instructors, courses and posts.
    Seed,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// student, instructor or admin
        #[arg(long, default_value = "student")]
        role: String,
    },
    List,
}

fn fail(message: String) -> ! {
    eprintln!("❌ Error: {}", message);
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).unwrap_or_else(|e| fail(e.to_string()));
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_database(&config),
            DbAction::Seed => seed_database(&config),
        },
        Commands::User { action } => match action {
            UserAction::Create { email, name, role } => create_user(&config, email, name, role),
            UserAction::List => list_users(&config),
        },
    }
}

fn catalog_db_path(config: &Config) -> PathBuf {
    if config.storage_backend != StorageBackend::Sqlite {
        fail("edusomal_setup manages the sqlite database. Set STORAGE_BACKEND=sqlite.".to_string());
    }
    match config.catalog_db_path() {
        Some(path) => path,
        None => fail("DATABASE_PATH is not set.".to_string()),
    }
}

fn open_catalog(config: &Config) -> CatalogRepository {
    let db_path = catalog_db_path(config);
    if !db_path.exists() {
        fail(format!(
            "Catalog database not found at '{}'. Please run `edusomal_setup db setup` first.",
            db_path.display()
        ));
    }
    match Storage::sqlite(&db_path) {
        Ok(store) => CatalogRepository::new(store),
        Err(e) => fail(format!("Could not open catalog database: {}", e)),
    }
}

fn setup_database(config: &Config) {
    let db_path = catalog_db_path(config);
    println!("\nSetting up catalog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            fail(format!("Could not create database directory: {}", e));
        }
    }

    match Storage::sqlite(&db_path) {
        Ok(_) => println!("✅ Catalog database setup completed successfully."),
        Err(e) => fail(format!("Setting up catalog database failed: {}", e)),
    }
}

fn seed_database(config: &Config) {
    let catalog = open_catalog(config);
    match seed::seed_demo_catalog(&catalog) {
        Ok(summary) if summary == seed::SeedSummary::default() => {
            println!("ℹ️ Demo catalog already present. Nothing to do.")
        }
        Ok(summary) => println!(
            "✅ Seeded {} categories, {} instructors, {} courses, {} lessons and {} blog posts.",
            summary.categories, summary.users, summary.courses, summary.lessons, summary.blog_posts
        ),
        Err(e) => fail(format!("Seeding failed: {}", e)),
    }
}

fn create_user(config: &Config, email: &str, name: &str, role: &str) {
    let role: UserRole = role.parse().unwrap_or_else(|e: String| fail(e));
    let catalog = open_catalog(config);

    let input = NewUser {
        email: email.to_string(),
        name: name.to_string(),
        role,
        avatar: None,
        bio: None,
    };
    match catalog.create_user(input) {
        Ok(user) => println!("✅ Created {} '{}' with id {}.", user.role.as_str(), user.email, user.id),
        Err(e) => fail(format!("Could not create user: {}", e)),
    }
}

fn list_users(config: &Config) {
    let catalog = open_catalog(config);
    let users = catalog
        .list_users()
        .unwrap_or_else(|e| fail(format!("Could not list users: {}", e)));

    if users.is_empty() {
        println!("No users found.");
        return;
    }
    println!("{:<38} {:<11} {:<32} {}", "ID", "ROLE", "EMAIL", "NAME");
    for user in users {
        println!("{:<38} {:<11} {:<32} {}", user.id, user.role.as_str(), user.email, user.name);
    }
}
