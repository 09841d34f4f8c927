use crate::server::controller::error::CustomError;
use crate::server::controller::CurrentUser;
use crate::server::model::receipt::{
    GetReceiptsResponse, ListReceiptsQuery, PostReceiptRequest, ReceiptDraft, ReceiptId,
};
use crate::server::receipt::render::ReceiptLayout;
use crate::server::service::receipts;
use crate::server::state::AppState;
use actix_web::{get, post, web, HttpResponse};

#[post("/api/receipts")]
async fn post_receipt(
    CurrentUser(user): CurrentUser,
    req: web::Json<PostReceiptRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let draft = ReceiptDraft::try_from(req.into_inner())?;
    let receipt = receipts::create_receipt(data.store(), user.id, draft).await?;
    let body = ReceiptLayout::new(&receipt, &user.business_name).structured(data.domain());
    Ok(HttpResponse::Created().json(body))
}

#[get("/api/receipts")]
async fn get_receipts(
    CurrentUser(user): CurrentUser,
    query: web::Query<ListReceiptsQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let (filter, page) = query.into_inner().into_parts()?;
    let (entries, total) = receipts::list_receipts(data.store(), user.id, &filter, page).await?;
    Ok(HttpResponse::Ok().json(GetReceiptsResponse {
        entries: entries
            .iter()
            .map(|r| ReceiptLayout::new(r, &user.business_name).structured(data.domain()))
            .collect(),
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[get("/api/receipts/{id}")]
async fn get_receipt(
    CurrentUser(user): CurrentUser,
    id: web::Path<ReceiptId>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let receipt = receipts::find_receipt(data.store(), id.into_inner(), Some(user.id)).await?;
    Ok(HttpResponse::Ok()
        .json(ReceiptLayout::new(&receipt, &user.business_name).structured(data.domain())))
}
