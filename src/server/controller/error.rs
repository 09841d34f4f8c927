use crate::server::database::StoreError;
use crate::server::receipt::calculator::CalculationError;
use crate::server::receipt::money::Money;
use crate::server::receipt::qr::QrError;
use crate::server::receipt::render::LineWidthOutOfRange;
use actix_web::http::header::{self, ContentType};
use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};
use log::{error, warn};

#[derive(Debug, Display, Error)]
pub(crate) enum CustomError {
    #[display("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[display("payment of {tendered} does not cover the total of {total}")]
    InsufficientPayment { total: Money, tendered: Money },
    #[display("{resource} not found")]
    NotFound { resource: String },
    #[display("could not validate credentials")]
    Unauthorized,
    #[display("{reason}")]
    Conflict { reason: String },
    #[display("server is busy")]
    ServerIsBusy,
    #[display("database error")]
    DbError,
    #[display("timeout occurred")]
    Timeout,
    #[display("internal error")]
    Internal,
}

impl CustomError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        CustomError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn receipt_not_found(id: i64) -> Self {
        CustomError::NotFound {
            resource: format!("Receipt ID: {id}"),
        }
    }
}

impl error::ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CustomError::InsufficientPayment { .. } => StatusCode::BAD_REQUEST,
            CustomError::NotFound { .. } => StatusCode::NOT_FOUND,
            CustomError::Unauthorized => StatusCode::UNAUTHORIZED,
            CustomError::Conflict { .. } => StatusCode::CONFLICT,
            CustomError::ServerIsBusy => StatusCode::SERVICE_UNAVAILABLE,
            CustomError::DbError | CustomError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());
        res.insert_header(ContentType::json());
        if let CustomError::Unauthorized = self {
            res.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        res.body(serde_json::json!({ "detail": self.to_string() }).to_string())
    }
}

impl From<StoreError> for CustomError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Busy => {
                warn!("no database connection available");
                CustomError::ServerIsBusy
            }
            StoreError::Timeout => {
                warn!("database operation timed out");
                CustomError::Timeout
            }
            StoreError::Conflict { reason } => CustomError::Conflict { reason },
            e => {
                error!("store failed, {}", e);
                CustomError::DbError
            }
        }
    }
}

impl From<CalculationError> for CustomError {
    fn from(e: CalculationError) -> Self {
        match e {
            CalculationError::InsufficientPayment { total, tendered } => {
                CustomError::InsufficientPayment { total, tendered }
            }
            CalculationError::NoItems | CalculationError::Overflow => {
                CustomError::invalid(e.to_string())
            }
            CalculationError::NegativeTotal => {
                error!("calculator produced a negative total");
                CustomError::Internal
            }
        }
    }
}

impl From<validator::ValidationErrors> for CustomError {
    fn from(e: validator::ValidationErrors) -> Self {
        CustomError::invalid(e.to_string())
    }
}

impl From<LineWidthOutOfRange> for CustomError {
    fn from(e: LineWidthOutOfRange) -> Self {
        CustomError::invalid(e.to_string())
    }
}

impl From<QrError> for CustomError {
    fn from(e: QrError) -> Self {
        error!("qr generation failed, {}", e);
        CustomError::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    #[actix_web::test]
    async fn renders_detail_as_json() {
        let err = CustomError::receipt_not_found(99999);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Receipt ID: 99999 not found");
    }

    #[test]
    fn unauthorized_asks_for_bearer() {
        let res = CustomError::Unauthorized.error_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[test]
    fn maps_calculation_errors() {
        let err = CustomError::from(CalculationError::InsufficientPayment {
            total: Money::from_cents(200),
            tendered: Money::from_cents(100),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "payment of 1.00 does not cover the total of 2.00");
        assert_eq!(
            CustomError::from(CalculationError::NoItems).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
