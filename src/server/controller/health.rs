use crate::server::controller::error::CustomError;
use crate::server::database::UserStore;
use crate::server::state::AppState;
use actix_web::{get, web, HttpResponse};

#[get("/")]
async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "message": "Receipt service is running" }))
}

#[get("/api/healthchecker")]
async fn healthchecker(data: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    data.store().ping().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}
