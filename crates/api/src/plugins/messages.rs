//! Per-user notification messages.
//!
//! Messages are written by the framework's event listener; these endpoints
//! let the signed-in user list them and flip the read/archived flags.
//! `current` resolves to the caller; reading another user's inbox is
//! reserved for admins.

use async_trait::async_trait;
use serde::Deserialize;
use validator::Validate;

use userhub_core::types::{AuthRequest, AuthResponse, HttpMethod, Message, UpdateMessage, User};
use userhub_core::{AuthContext, AuthError, AuthPlugin, AuthResult, AuthRoute, validate_request_body};

use crate::plugins::helpers::require_session;

pub struct MessagesPlugin;

impl MessagesPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MessagesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageRequest {
    pub read: Option<bool>,
    pub archived: Option<bool>,
}

async fn resolve_owner(ctx: &AuthContext, actor: &User, id: &str) -> AuthResult<User> {
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

async fn owned_message(ctx: &AuthContext, user_id: &str, id: &str) -> AuthResult<Message> {
    ctx.store
        .get_message(user_id, id)
        .await?
        .ok_or_else(|| AuthError::not_found("Message not found"))
}

async fn handle_list(
    req: &AuthRequest,
    ctx: &AuthContext,
    user_id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let owner = resolve_owner(ctx, &actor, user_id).await?;
    let messages = ctx.store.list_messages(&owner.id).await?;
    Ok(AuthResponse::json(200, &messages)?)
}

async fn handle_get(
    req: &AuthRequest,
    ctx: &AuthContext,
    user_id: &str,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let owner = resolve_owner(ctx, &actor, user_id).await?;
    let message = owned_message(ctx, &owner.id, id).await?;
    Ok(AuthResponse::json(200, &message)?)
}

async fn handle_update(
    req: &AuthRequest,
    ctx: &AuthContext,
    user_id: &str,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let owner = resolve_owner(ctx, &actor, user_id).await?;
    let message = owned_message(ctx, &owner.id, id).await?;

    let body = req.body.as_deref().unwrap_or_default();
    let request: UpdateMessageRequest = validate_request_body(body)?;

    let message = ctx
        .store
        .update_message(
            &message.id,
            UpdateMessage {
                read: request.read,
                archived: request.archived,
            },
        )
        .await?;

    Ok(AuthResponse::json(200, &message)?)
}

#[async_trait]
impl AuthPlugin for MessagesPlugin {
    fn name(&self) -> &'static str {
        "messages"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![
            AuthRoute::new(HttpMethod::Get, "/users/{id}/messages"),
            AuthRoute::new(HttpMethod::Get, "/users/{id}/messages/{id}"),
            AuthRoute::new(HttpMethod::Put, "/users/{id}/messages/{id}"),
        ]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        let segments = req.path_segments();
        let resp = match (&req.method, segments.as_slice()) {
            (HttpMethod::Get, ["users", user_id, "messages"]) => {
                handle_list(req, ctx, user_id).await?
            }
            (HttpMethod::Get, ["users", user_id, "messages", id]) => {
                handle_get(req, ctx, user_id, id).await?
            }
            (HttpMethod::Put, ["users", user_id, "messages", id]) => {
                handle_update(req, ctx, user_id, id).await?
            }
            _ => return Ok(None),
        };
        Ok(Some(resp))
    }
}
