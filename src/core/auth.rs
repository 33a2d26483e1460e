use std::sync::Arc;

use userhub_core::{
    AuthConfig, AuthContext, AuthError, AuthPlugin, AuthRequest, AuthResponse, AuthResult,
    EventBus, EventListener, IdentityStore, MessageListener, ProfileCodec, ProfileRegistry,
    UserSettings,
};

/// The assembled identity module.
///
/// Holds the plugin chain and the shared [`AuthContext`]; the host embeds
/// it and routes HTTP traffic through [`UserHub::handle_request`].
pub struct UserHub {
    config: Arc<AuthConfig>,
    plugins: Vec<Box<dyn AuthPlugin>>,
    context: AuthContext,
}

/// Builder for a [`UserHub`] instance.
pub struct UserHubBuilder {
    config: AuthConfig,
    settings: UserSettings,
    store: Option<Arc<dyn IdentityStore>>,
    plugins: Vec<Box<dyn AuthPlugin>>,
    listeners: Vec<Arc<dyn EventListener>>,
    profiles: ProfileRegistry,
}

impl UserHubBuilder {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            settings: UserSettings::new(),
            store: None,
            plugins: Vec::new(),
            listeners: Vec::new(),
            profiles: ProfileRegistry::new(),
        }
    }

    /// Set the persistence backend. Required.
    pub fn store<S: IdentityStore>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Replace the default runtime settings.
    pub fn settings(mut self, settings: UserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a plugin. Plugins are consulted in registration order.
    pub fn plugin<P: AuthPlugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Add an event listener on top of the built-in message listener.
    pub fn listener<L: EventListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Register a profile codec. Duplicate keys fail at build time.
    pub fn profile<C: ProfileCodec + 'static>(mut self, codec: C) -> AuthResult<Self> {
        self.profiles.register(Arc::new(codec))?;
        Ok(self)
    }

    pub async fn build(self) -> AuthResult<UserHub> {
        self.config.validate()?;

        let config = Arc::new(self.config);
        let store = self
            .store
            .ok_or_else(|| AuthError::Configuration("an identity store is required".to_string()))?;
        let settings = Arc::new(self.settings);

        // The message listener runs first so notification rows exist by the
        // time custom listeners observe the same event.
        let mut events = EventBus::new();
        events.subscribe(Arc::new(MessageListener::new(
            store.clone(),
            settings.clone(),
        )));
        for listener in self.listeners {
            events.subscribe(listener);
        }

        let context = AuthContext::new(
            config.clone(),
            settings,
            store,
            Arc::new(events),
            Arc::new(self.profiles),
        );

        for plugin in &self.plugins {
            plugin.on_init(&context).await?;
            tracing::debug!(plugin = plugin.name(), "plugin initialized");
        }

        Ok(UserHub {
            config,
            plugins: self.plugins,
            context,
        })
    }
}

impl UserHub {
    /// Create a new builder.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(config: AuthConfig) -> UserHubBuilder {
        UserHubBuilder::new(config)
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// Handle a request, converting plugin errors into JSON responses.
    pub async fn handle_request(&self, req: AuthRequest) -> AuthResponse {
        let method = req.method;
        let path = req.path.clone();
        match self.handle_request_inner(req).await {
            Ok(response) => response,
            Err(err) => {
                self.config
                    .logger
                    .warn(&format!("{method:?} {path} failed: {err}"));
                err.into_response()
            }
        }
    }

    async fn handle_request_inner(&self, mut req: AuthRequest) -> AuthResult<AuthResponse> {
        if self.config.base_path != "/"
            && let Some(stripped) = req.path.strip_prefix(&self.config.base_path)
        {
            req.path = if stripped.starts_with('/') {
                stripped.to_string()
            } else {
                format!("/{stripped}")
            };
        }

        for plugin in &self.plugins {
            if let Some(response) = plugin.on_request(&req, &self.context).await? {
                tracing::debug!(
                    plugin = plugin.name(),
                    path = %req.path,
                    status = response.status,
                    "request handled"
                );
                return Ok(response);
            }
        }

        Err(AuthError::not_found("Not found"))
    }

    /// Drop expired sessions from the store.
    pub async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        self.context.session_manager().cleanup_expired_sessions().await
    }
}
