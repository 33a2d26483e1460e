//! User record endpoints.
//!
//! `GET/PUT /users/{id}` with `current` resolving to the caller; reading and
//! updating other users is reserved for admins. Profile sub-objects are
//! validated by the registered [`ProfileCodec`]s before being stored.
//! `DELETE /users/{id}` reassigns the user's messages to the sentinel user
//! before removing the account.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use userhub_core::types::{
    AuthRequest, AuthResponse, CreateUser, HttpMethod, StatusResponse, UpdateUser, User,
};
use userhub_core::{
    AuthContext, AuthError, AuthPlugin, AuthResult, AuthRoute, SENTINEL_USERNAME,
    is_reserved_username, validate_request_body,
};

use crate::plugins::helpers::{require_checked_session, require_session};

pub struct UsersPlugin;

impl UsersPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UsersPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserView {
    #[serde(flatten)]
    user: User,
    profiles: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 150, message = "Enter a valid username"))]
    pub username: Option<String>,
    pub name: Option<String>,
    pub accepted_terms: Option<bool>,
    /// Profile payloads keyed by registry key.
    pub profiles: Option<HashMap<String, serde_json::Value>>,
}

/// Resolve a path id to a user, enforcing self-or-admin access.
async fn resolve_target(ctx: &AuthContext, actor: &User, id: &str) -> AuthResult<User> {
    if id == "current" || id == actor.id {
        return Ok(actor.clone());
    }
    if !actor.is_admin {
        return Err(AuthError::forbidden("Insufficient permissions"));
    }
    ctx.store
        .get_user_by_id(id)
        .await?
        .ok_or(AuthError::UserNotFound)
}

async fn user_view(ctx: &AuthContext, user: User) -> AuthResult<UserView> {
    let profiles = ctx.store.list_profiles(&user.id).await?;
    Ok(UserView { user, profiles })
}

async fn handle_get_user(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let target = resolve_target(ctx, &actor, id).await?;
    Ok(AuthResponse::json(200, &user_view(ctx, target).await?)?)
}

async fn handle_update_user(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_checked_session(req, ctx).await?;
    let target = resolve_target(ctx, &actor, id).await?;

    let body = req.body.as_deref().unwrap_or_default();
    let request: UpdateUserRequest = validate_request_body(body)?;

    if let Some(username) = &request.username {
        if is_reserved_username(username) {
            return Err(AuthError::field("username", "This username is reserved"));
        }
        if let Some(existing) = ctx.store.get_user_by_username(username).await?
            && existing.id != target.id
        {
            return Err(AuthError::field("username", "This username is already taken"));
        }
    }

    // Validate every submitted profile section before writing any of them.
    if let Some(profiles) = &request.profiles {
        for (key, value) in profiles {
            let codec = ctx
                .profiles
                .get(key)
                .ok_or_else(|| AuthError::not_found(format!("Unknown profile key '{key}'")))?;
            codec.validate(value)?;
        }
    }

    let user = ctx
        .store
        .update_user(
            &target.id,
            UpdateUser {
                username: request.username,
                name: request.name,
                accepted_terms: request.accepted_terms,
                ..Default::default()
            },
        )
        .await?;

    if let Some(profiles) = request.profiles {
        for (key, value) in profiles {
            ctx.store.upsert_profile(&user.id, &key, value).await?;
        }
    }

    Ok(AuthResponse::json(200, &user_view(ctx, user).await?)?)
}

/// The inactive account that deleted users' messages are reassigned to.
async fn sentinel_user(ctx: &AuthContext) -> AuthResult<User> {
    if let Some(user) = ctx.store.get_user_by_username(SENTINEL_USERNAME).await? {
        return Ok(user);
    }
    let create = CreateUser {
        email: format!("{SENTINEL_USERNAME}@{}.invalid", ctx.config.app_name.to_lowercase()),
        username: Some(SENTINEL_USERNAME.to_string()),
        is_active: false,
        ..Default::default()
    };
    ctx.store.create_user(create).await
}

async fn handle_delete_user(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_checked_session(req, ctx).await?;
    if !actor.is_admin {
        return Err(AuthError::forbidden("Insufficient permissions"));
    }
    if id == "current" || id == actor.id {
        return Err(AuthError::CannotRemoveSelf);
    }

    let target = ctx
        .store
        .get_user_by_id(id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let sentinel = sentinel_user(ctx).await?;
    ctx.store.reassign_messages(&target.id, &sentinel.id).await?;
    ctx.store.delete_user_sessions(&target.id).await?;
    ctx.store.delete_user(&target.id).await?;

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}

#[async_trait]
impl AuthPlugin for UsersPlugin {
    fn name(&self) -> &'static str {
        "users"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![
            AuthRoute::new(HttpMethod::Get, "/users/{id}"),
            AuthRoute::new(HttpMethod::Put, "/users/{id}"),
            AuthRoute::new(HttpMethod::Delete, "/users/{id}"),
        ]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        let segments = req.path_segments();
        let resp = match (&req.method, segments.as_slice()) {
            (HttpMethod::Get, ["users", id]) => handle_get_user(req, ctx, id).await?,
            (HttpMethod::Put, ["users", id]) => handle_update_user(req, ctx, id).await?,
            (HttpMethod::Delete, ["users", id]) => handle_delete_user(req, ctx, id).await?,
            _ => return Ok(None),
        };
        Ok(Some(resp))
    }
}
