use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// name printed on top of every receipt of this user
    pub business_name: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub business_name: String,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            business_name: self.business_name,
            refresh_token: None,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SignupRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 24))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub business_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 24))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub business_name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            business_name: user.business_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}
