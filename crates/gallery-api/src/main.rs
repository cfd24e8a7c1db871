use gallery_api::setup;
use gallery_core::Config;
use gallery_infra::{init_telemetry, shutdown_telemetry, LogFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    init_telemetry(LogFormat::from_env())?;

    let (state, router) = setup::initialize_app(&config).await?;

    let served = setup::server::start_server(&config, router).await;

    state.cleanup.shutdown().await;
    shutdown_telemetry().await;

    served
}
