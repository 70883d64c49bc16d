use actix_cors::Cors;
use actix_web::{
    http::header,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
use edusomal_backend::{
    config::{Config, StorageBackend},
    models::db_operations::Storage,
    routes,
    setup::seed,
    AppState,
};
use std::fs;
use std::io;
use std::path::PathBuf;

/// A simple handler for the root URL.
async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[derive(Parser, Debug)]
#[command(name = "edusomal_server", author, version, about = "Starts the EduSomal catalog API server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn open_storage(config: &Config) -> io::Result<Storage> {
    let to_io = |e: edusomal_backend::models::db_operations::StoreError| {
        io::Error::new(io::ErrorKind::Other, e.to_string())
    };
    match config.storage_backend {
        StorageBackend::Memory => Storage::memory().map_err(to_io),
        StorageBackend::Sqlite => {
            let db_path = config.catalog_db_path().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "DATABASE_PATH is not set")
            })?;
            if let Some(parent) = db_path.parent() {
                fs::create_dir_all(parent)?;
            }
            Storage::sqlite(&db_path).map_err(to_io)
        }
    }
}

fn cors_for(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let store = open_storage(&config)?;
    log::info!("Using the {} record store", store.backend_name());
    let app_state = web::Data::new(AppState::new(store));

    if config.seed_demo_data {
        seed::seed_demo_catalog(&app_state.catalog)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    }

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .wrap(cors_for(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .app_data(app_state.clone())
            .configure(routes::public::config_api)
            .route("/", web::get().to(root_handler))
    })
    .bind(server_address)?
    .run()
    .await
}
