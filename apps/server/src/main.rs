use anyhow::Context;
use pixhost_domain::config::AppConfig;
use pixhost_server::Server;
use pixhost_server::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg: AppConfig =
        load_config(None::<&str>).context("Critical: Configuration is malformed")?;

    let _telemetry = pixhost_server::telemetry::init(env!("CARGO_PKG_NAME"), &cfg.logging)?;

    Server::builder().config(cfg).build().await?.run().await
}
