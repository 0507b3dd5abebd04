use actix_web::{web, App, HttpServer};
use tracing::info;

use roshambo::{config, routes, telemetry, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    // Load environment variables early
    dotenvy::dotenv().ok();

    let port = config::server_port();
    let app_state = AppState::new();

    info!(port, "starting roshambo server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
