use anyhow::Context;
use signcam::{bootstrap::bootstrap, config::Config, server};

fn main() -> anyhow::Result<()> {
    signcam::init_logger!();

    let config = Config::from_env()?;
    log::debug!("{config:?}");
    let state = bootstrap(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(config.addr)
            .await
            .with_context(|| format!("failed to bind to {}", config.addr))?;
        server::serve(listener, state).await
    })
}
