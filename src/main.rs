mod app;
mod cli;

use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG overrides; progress lines go to stdout so logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    app::run(cli::parse());
}
