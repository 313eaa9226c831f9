use fayda_visitor::ApiClient;
use fayda_visitor::kiosk::{KioskConfig, kiosk_routes};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables before reading any of them
    dotenvy::dotenv().ok();

    let config = KioskConfig::from_env()?;

    let default_filter = if config.core().debug() {
        "fayda_visitor=debug,fayda_kiosk=debug"
    } else {
        "fayda_visitor=info,fayda_kiosk=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let gateway = ApiClient::new(config.core().clone())?;
    let bind = config.bind();
    tracing::info!(
        api_base_url = %config.core().api_base_url(),
        %bind,
        "Starting kiosk"
    );

    let app = kiosk_routes(config, gateway);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
