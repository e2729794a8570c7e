use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::{Arg, Command};
use feedback_api::config::AppConfig;
use feedback_api::database::Database;
use feedback_api::email::{EmailNotifier, SmtpNotifier};
use feedback_api::error::AppResult;
use feedback_api::handlers::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[actix_web::main]
async fn main() -> AppResult<()> {
    let matches = Command::new("feedback-api")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Feedback and chatbot conversation backend")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to configuration file")
                .value_name("FILE"),
        )
        .get_matches();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("feedback_api=info".parse().unwrap()))
        .init();

    tracing::info!("Starting feedback API server");

    let config = match matches.get_one::<String>("config") {
        Some(path) => AppConfig::load_from_file(&PathBuf::from(path))?,
        None => AppConfig::load()?,
    };
    feedback_api::error::set_verbose_errors(!config.is_production());

    let database = Arc::new(Database::new(&config.database.path)?);
    tracing::info!("Database initialized at {:?}", config.database.path);

    let notifier: Option<Arc<dyn EmailNotifier>> = match &config.email {
        Some(email_config) => match SmtpNotifier::new(email_config) {
            Ok(notifier) => {
                tracing::info!(
                    "Email notifications enabled via {}:{}",
                    email_config.host,
                    email_config.port
                );
                Some(Arc::new(notifier))
            }
            Err(e) => {
                tracing::warn!("Email configuration invalid, notifications disabled: {}", e);
                None
            }
        },
        None => {
            tracing::warn!("No email configuration found, notifications disabled");
            None
        }
    };

    let app_state = web::Data::new(AppState {
        database,
        notifier,
        start_time: SystemTime::now(),
    });

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        "Starting HTTP server on {} ({})",
        server_addr,
        config.server.environment
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .wrap(Logger::default())
            .wrap(build_cors(&config))
            .configure(handlers::configure)
    })
    .bind(&server_addr)?
    .run()
    .await?;

    Ok(())
}

/// Requests without an Origin header always pass (they are not CORS
/// requests); requests with one must exactly match the allow-list after
/// trailing-slash normalization.
fn build_cors(config: &AppConfig) -> Cors {
    let allowed: Vec<String> = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect();

    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            origin
                .to_str()
                .map(|origin| {
                    let origin = origin.trim_end_matches('/');
                    allowed.iter().any(|allowed| allowed == origin)
                })
                .unwrap_or(false)
        })
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}
