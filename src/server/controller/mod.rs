pub(crate) mod auth;
pub(crate) mod error;
pub(crate) mod health;
pub(crate) mod receipts;
pub(crate) mod view;

use crate::server::controller::error::CustomError;
use crate::server::database::UserStore;
use crate::server::model::user::User;
use crate::server::service::token::TokenScope;
use crate::server::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use log::error;
use std::future::Future;
use std::pin::Pin;

/// Token of an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }
    Some(token.trim().to_string())
}

/// The user a valid access token was issued to.
pub(crate) struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = CustomError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let Some(state) = state else {
                error!("app state is not registered");
                return Err(CustomError::Internal);
            };
            let token = token.ok_or(CustomError::Unauthorized)?;
            let claims = state.tokens().verify(&token, TokenScope::AccessToken)?;
            let user = state
                .store()
                .find_user_by_email(&claims.sub)
                .await?
                .ok_or(CustomError::Unauthorized)?;
            Ok(CurrentUser(user))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn parses_bearer_header() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
