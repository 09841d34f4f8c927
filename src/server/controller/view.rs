//! Public share links of a receipt. No credentials needed, the id is the capability.

use crate::server::controller::error::CustomError;
use crate::server::model::receipt::{ReceiptId, ReceiptLinks};
use crate::server::receipt::qr::QrMode;
use crate::server::receipt::render::{LineWidth, ReceiptLayout};
use crate::server::service::receipts;
use crate::server::state::AppState;
use crate::server::util::time;
use actix_web::http::header::ContentType;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TextQuery {
    line_width: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct QrQuery {
    #[serde(default)]
    mode: QrMode,
}

#[get("/{id}/txt")]
async fn receipt_txt(
    id: web::Path<ReceiptId>,
    query: web::Query<TextQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let width = match query.line_width {
        Some(width) => LineWidth::new(width)?,
        None => LineWidth::default(),
    };
    let (receipt, business_name) = receipts::find_printable(data.store(), id.into_inner()).await?;
    let text = ReceiptLayout::new(&receipt, &business_name).text(width, time::helper::get_utc_now());
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(text))
}

#[get("/{id}/html")]
async fn receipt_html(
    id: web::Path<ReceiptId>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let (receipt, business_name) = receipts::find_printable(data.store(), id.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(ReceiptLayout::new(&receipt, &business_name).html()))
}

#[get("/{id}/qr-code")]
async fn receipt_qr(
    id: web::Path<ReceiptId>,
    query: web::Query<QrQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let id = id.into_inner();
    // the code only links to existing receipts
    receipts::find_receipt(data.store(), id, None).await?;
    let links = ReceiptLinks::new(data.domain(), id);
    let png = data.qr().generate(query.mode.target(&links))?;
    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}
