use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use splitledger::config::Settings;
use splitledger::routes::{self, AppState};
use splitledger::service::LedgerService;
use splitledger::store::MongoStore;
use splitledger::telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = Settings::from_env().map_err(std::io::Error::other)?;
    telemetry::init(settings.json_logs);

    let store = MongoStore::connect(&settings.mongodb_uri, &settings.database)
        .await
        .map_err(std::io::Error::other)?;
    let state = web::Data::new(AppState {
        service: LedgerService::new(Arc::new(store)),
        bot_token: settings.bot_token.clone(),
    });

    tracing::info!(address = %settings.bind_address, port = settings.port, "listening");
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((settings.bind_address.as_str(), settings.port))?
    .run()
    .await
}
