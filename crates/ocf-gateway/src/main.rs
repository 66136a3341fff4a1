//! Gateway binary: configuration from the environment, then serve.

use tracing::{error, info};

use ocf_gateway::{logging, Config, Gateway};

fn fail(err: impl std::fmt::Display) -> ! {
    error!("{err}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => fail(err),
    };
    info!(?config, "gateway configuration");

    let gateway = match Gateway::new(config) {
        Ok(gateway) => gateway,
        Err(err) => fail(err),
    };
    if let Err(err) = gateway.listen_and_serve().await {
        fail(err);
    }
}
