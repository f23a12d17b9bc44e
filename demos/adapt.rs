//! Compiles a configuration file and prints the resulting routes as JSON.
//!
//! Run: `RUST_LOG=debug cargo run --example adapt -- path/to/Caddyfile`
//!
//! Without an argument a built-in sample is used. Set `EMBEDDED_APP` to
//! resolve roots the way an embedded application would.

use ripht_php_server::{ParseContext, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SAMPLE: &str = r#"
frankenphp {
    num_threads 8
    worker public/worker.php 2 {
        env APP_ENV prod
    }
}

@api path /api/*

php_server @api {
    root public
    index off
    file_server off
}

php_server {
    root public
    split .php .phtml
    env APP_ENV prod
}
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let source = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Reading configuration");
            std::fs::read_to_string(path)?
        }
        None => SAMPLE.to_string(),
    };

    let mut ctx = ParseContext::new();
    if let Ok(base) = std::env::var("EMBEDDED_APP") {
        ctx = ctx.with_embedded_app(base);
    }

    let config = ServerConfig::parse(&source, &ctx)?;
    info!(routes = config.routes.len(), "Configuration adapted");

    println!("{}", config.to_json()?);

    Ok(())
}
