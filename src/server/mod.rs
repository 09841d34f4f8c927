//! main file for the server

pub(crate) mod controller;
pub(crate) mod database;
pub mod model;
pub(crate) mod receipt;
pub(crate) mod service;
pub(crate) mod state;
pub(crate) mod util;


use crate::server::controller::error::CustomError;
use crate::server::controller::{auth, health, receipts, view};
use crate::server::database::Store;
use crate::server::model::config::ServerConfig;
use crate::server::state::AppState;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;

/// Registers every route together with the extractor configs that turn malformed
/// requests into JSON errors.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| CustomError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| CustomError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| CustomError::invalid(err.to_string()).into()),
    )
    .service(health::index)
    .service(health::healthchecker)
    .service(auth::signup)
    .service(auth::login)
    .service(auth::refresh_token)
    .service(receipts::post_receipt)
    .service(receipts::get_receipts)
    .service(receipts::get_receipt)
    .service(view::receipt_html)
    .service(view::receipt_txt)
    .service(view::receipt_qr);
}

/// Run the server
pub async fn run(config: ServerConfig) -> Result<(), anyhow::Error> {
    let store = Store::connect(&config).await?;
    let state = web::Data::new(AppState::from_config(store, &config));
    info!("listening on {}, share links under {}", config.addr, config.domain);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(config.addr)?
    .run()
    .await?;
    Ok(())
}
