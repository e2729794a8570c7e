use clap::{Arg, Command};
use feedback_api::config::AppConfig;
use feedback_api::export;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let matches = Command::new("export-training-data")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Exports stored chat sessions as a flat training-data document")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to configuration file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Output file path")
                .value_name("FILE")
                .default_value(export::TRAINING_DATA_FILE),
        )
        .get_matches();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("feedback_api=info".parse().unwrap()))
        .init();

    let config = match matches.get_one::<String>("config") {
        Some(path) => AppConfig::load_from_file(&PathBuf::from(path)),
        None => AppConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Export failed: {}", e);
            std::process::exit(1);
        }
    };

    let output = PathBuf::from(
        matches
            .get_one::<String>("output")
            .expect("output has a default"),
    );

    // Any failure is fatal; there is no partial-write recovery.
    match export::run(&config, &output) {
        Ok(count) => {
            tracing::info!("Data exported to {} ({} sessions)", output.display(), count);
        }
        Err(e) => {
            tracing::error!("Export failed: {}", e);
            std::process::exit(1);
        }
    }
}
