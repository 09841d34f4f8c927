use crate::server::controller::bearer_token;
use crate::server::controller::error::CustomError;
use crate::server::database::UserStore;
use crate::server::model::user::{LoginRequest, NewUser, SignupRequest, TokenResponse, User, UserResponse};
use crate::server::service::password;
use crate::server::service::token::TokenScope;
use crate::server::state::AppState;
use crate::server::util::time;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use validator::Validate;

#[post("/api/auth/signup")]
async fn signup(
    req: web::Json<SignupRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let req = req.into_inner();
    req.validate()?;
    let email = req.email.to_lowercase();
    if data.store().find_user_by_email(&email).await?.is_some() {
        return Err(CustomError::Conflict {
            reason: "user with this email already exists".to_string(),
        });
    }

    let password = req.password;
    let password_hash = web::block(move || password::hash_password(&password))
        .await
        .map_err(|e| {
            error!("hashing task failed, {}", e);
            CustomError::Internal
        })?
        .map_err(|e| {
            error!("{}", e);
            CustomError::Internal
        })?;

    let user = data
        .store()
        .insert_user(NewUser {
            business_name: req.business_name.unwrap_or_else(|| req.username.clone()),
            username: req.username,
            email,
            password_hash,
            created_at: time::helper::get_utc_now(),
        })
        .await?;
    info!("user signed up, id={}", user.id);
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

#[post("/api/auth/login")]
async fn login(
    req: web::Json<LoginRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let req = req.into_inner();
    req.validate()?;
    let user = data
        .store()
        .find_user_by_email(&req.email.to_lowercase())
        .await?
        .ok_or(CustomError::Unauthorized)?;

    let password = req.password;
    let password_hash = user.password_hash.clone();
    let matches = web::block(move || password::verify_password(&password, &password_hash))
        .await
        .map_err(|e| {
            error!("password verification task failed, {}", e);
            CustomError::Internal
        })?;
    if !matches {
        info!("login rejected, id={}", user.id);
        return Err(CustomError::Unauthorized);
    }

    Ok(HttpResponse::Ok().json(issue_tokens(&data, &user).await?))
}

/// Exchanges the current refresh token for a new token pair. A refresh token other
/// than the one last issued revokes the stored one.
#[get("/api/auth/refresh_token")]
async fn refresh_token(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CustomError> {
    let token = bearer_token(&req).ok_or(CustomError::Unauthorized)?;
    let claims = data.tokens().verify(&token, TokenScope::RefreshToken)?;
    let user = data
        .store()
        .find_user_by_email(&claims.sub)
        .await?
        .ok_or(CustomError::Unauthorized)?;

    if user.refresh_token.as_deref() != Some(token.as_str()) {
        warn!("refresh token reuse detected, revoking, id={}", user.id);
        data.store().update_refresh_token(user.id, None).await?;
        return Err(CustomError::Unauthorized);
    }

    Ok(HttpResponse::Ok().json(issue_tokens(&data, &user).await?))
}

async fn issue_tokens(data: &AppState, user: &User) -> Result<TokenResponse, CustomError> {
    let access_token = data.tokens().issue(&user.email, TokenScope::AccessToken)?;
    let refresh = data.tokens().issue(&user.email, TokenScope::RefreshToken)?;
    data.store()
        .update_refresh_token(user.id, Some(&refresh))
        .await?;
    Ok(TokenResponse {
        access_token,
        refresh_token: refresh,
        token_type: "bearer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::database::memory::MemoryStore;
    use crate::server::database::Store;
    use crate::server::model::config::ServerConfig;

    #[actix_web::test]
    async fn issued_refresh_token_is_stored_for_the_user() {
        let state = AppState::from_config(
            Store::Memory(MemoryStore::default()),
            &ServerConfig::default(),
        );
        let user = state
            .store()
            .insert_user(NewUser {
                username: "markus".to_string(),
                email: "markus@example.com".to_string(),
                password_hash: "hash".to_string(),
                business_name: "FOP Markus".to_string(),
                created_at: time::helper::get_utc_now(),
            })
            .await
            .unwrap();

        let tokens = issue_tokens(&state, &user).await.unwrap();
        assert_eq!(tokens.token_type, "bearer");
        assert_ne!(tokens.access_token, tokens.refresh_token);

        let stored = state
            .store()
            .find_user_by_id(user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(tokens.refresh_token.as_str()));

        let claims = state
            .tokens()
            .verify(&tokens.refresh_token, TokenScope::RefreshToken)
            .unwrap();
        assert_eq!(claims.sub, "markus@example.com");
        assert!(state
            .tokens()
            .verify(&tokens.access_token, TokenScope::RefreshToken)
            .is_err());
    }
}
