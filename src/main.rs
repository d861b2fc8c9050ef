use hearthline::{hearthline_route, state::AppStateBuilder};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppStateBuilder::new().build();
    let app = hearthline_route(Arc::new(state));

    let addr = std::env::var("HEARTHLINE_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:4100".into());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    tracing::info!("Hearthline messaging service listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
