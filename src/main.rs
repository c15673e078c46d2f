use actix_web::{web, App, HttpServer};
use log::info;

use dicey_chess_web_app::config::AppConfig;
use dicey_chess_web_app::models::app_state::AppState;
use dicey_chess_web_app::routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    info!("Starting Dicey Chess server at http://{}", bind_addr);

    let app_state = web::Data::new(AppState::new(config));

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
