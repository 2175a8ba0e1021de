use std::sync::Arc;

use promotron::config::{load_config, print_schema};
use promotron::startup;
use promotron::utils::logger::init_logging;

#[tokio::main]
async fn main() {
    // `--schema` prints the config JSON schema and exits, for validation
    // tooling.
    if std::env::args().any(|arg| arg == "--schema") {
        print_schema();
        return;
    }

    let config = Arc::new(load_config());
    init_logging(&config.logging);

    if let Err(err) = startup::run(config).await {
        eprintln!("Server error: {}", err);
        std::process::exit(1);
    }
}
