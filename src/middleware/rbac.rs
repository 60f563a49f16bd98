// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::{User, UserRole},
};

/// Papel exigido por uma rota.
pub trait RoleDef: Send + Sync + 'static {
    fn role() -> UserRole;
    fn slug() -> &'static str;
}

/// Guardião: só deixa passar usuários com o papel `T`. Carrega o usuário.
pub struct RequireRole<T>(pub User, pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if user.role != T::role() {
            let app_state = AppState::from_ref(state);
            return Err(AppError::RoleRequired(T::slug())
                .to_api_error(&Locale::from_headers(&parts.headers), &app_state.i18n_store));
        }

        Ok(RequireRole(user, PhantomData))
    }
}

// ---
// PAPÉIS
// ---

pub struct AdminRole;
impl RoleDef for AdminRole {
    fn role() -> UserRole { UserRole::Admin }
    fn slug() -> &'static str { "admin" }
}
