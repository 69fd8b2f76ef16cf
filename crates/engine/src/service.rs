//! Protection service: the command surface a UI bridge talks to.

use crate::config::EngineConfig;
use crate::engine::{EngineDeps, EngineHandle, ProtectionEngine};
use crate::error::Result;
use crate::presenter::PresenterRef;
use std::sync::Arc;
use tokio::sync::Mutex;
use veil_context::{AppId, ForegroundSource, LauncherQuery, PermissionProbe, PermissionReport};
use veil_events::EventBusRef;
use veil_lock::{ProtectedSet, SecretPattern};
use veil_storage::PolicyStore;

/// Platform-facing collaborators of the service.
#[derive(Clone)]
pub struct PlatformServices {
    pub source: Arc<dyn ForegroundSource>,
    pub permissions: Arc<dyn PermissionProbe>,
    pub launchers: Arc<dyn LauncherQuery>,
}

impl PlatformServices {
    /// All three roles served by one provider.
    pub fn from_provider<P>(source: Arc<dyn ForegroundSource>, provider: Arc<P>) -> Self
    where
        P: PermissionProbe + LauncherQuery + 'static,
    {
        Self {
            source,
            permissions: Arc::clone(&provider) as Arc<dyn PermissionProbe>,
            launchers: provider,
        }
    }
}

/// Starts and stops the engine and reads / writes the policy.
///
/// At most one engine runs at a time. Policy commands work whether or not it
/// is running.
pub struct ProtectionService {
    config: EngineConfig,
    store: Arc<PolicyStore>,
    platform: PlatformServices,
    presenter: PresenterRef,
    bus: EventBusRef,
    engine: Mutex<Option<ProtectionEngine>>,
}

impl ProtectionService {
    pub fn new(
        config: EngineConfig,
        store: Arc<PolicyStore>,
        platform: PlatformServices,
        presenter: PresenterRef,
        bus: EventBusRef,
    ) -> Self {
        Self {
            config,
            store,
            platform,
            presenter,
            bus,
            engine: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start protecting. `Ok(false)` when required permissions are missing.
    pub async fn enable_protection(&self) -> Result<bool> {
        let mut engine = self.engine.lock().await;
        if engine.is_some() {
            tracing::debug!("protection already active");
            return Ok(true);
        }

        let permissions = self.platform.permissions.check();
        if !permissions.can_protect() {
            tracing::warn!(?permissions, "cannot enable protection, permissions missing");
            return Ok(false);
        }

        let deps = EngineDeps {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.platform.source),
            presenter: Arc::clone(&self.presenter),
            bus: Arc::clone(&self.bus),
            launchers: self.platform.launchers.launcher_ids(),
        };
        *engine = Some(ProtectionEngine::start(&self.config, deps)?);
        drop(engine);

        tracing::info!("protection enabled");
        self.bus.emit_protection_status(true);
        Ok(true)
    }

    /// Stop protecting. Returns whether an engine was running.
    pub async fn disable_protection(&self) -> bool {
        let Some(engine) = self.engine.lock().await.take() else {
            return false;
        };
        if let Err(e) = engine.shutdown().await {
            tracing::error!(error = %e, "engine shutdown failed");
        }

        tracing::info!("protection disabled");
        self.bus.emit_protection_status(false);
        true
    }

    pub async fn is_active(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    /// Handle for lifecycle hooks, taps and pushed foreground events.
    pub async fn handle(&self) -> Option<EngineHandle> {
        self.engine.lock().await.as_ref().map(ProtectionEngine::handle)
    }

    /// Persist the protected set. A running engine picks it up through the
    /// store; an inactive one is started if permissions allow.
    pub async fn save_protected_apps(&self, apps: Vec<AppId>) -> Result<()> {
        let apps: ProtectedSet = apps.into_iter().collect();
        self.store.save_protected_apps(&apps)?;

        if !self.is_active().await && self.platform.permissions.check().can_protect() {
            tracing::info!("protected apps saved while inactive, enabling protection");
            self.enable_protection().await?;
        }
        Ok(())
    }

    /// Sorted protected app list.
    pub fn get_protected_apps(&self) -> Result<Vec<AppId>> {
        Ok(self.store.protected_apps()?.to_vec())
    }

    /// Validate and persist a new unlock pattern.
    pub fn save_secret_pattern(&self, codes: Vec<i64>) -> Result<()> {
        let pattern = SecretPattern::from_codes(codes)?;
        self.store.save_secret_pattern(&pattern)?;
        Ok(())
    }

    pub fn get_secret_pattern(&self) -> Result<Vec<u8>> {
        Ok(self.store.secret_pattern()?.codes())
    }

    pub fn check_permissions(&self) -> PermissionReport {
        self.platform.permissions.check()
    }

    pub async fn is_cover_shown(&self) -> bool {
        match self.handle().await {
            Some(handle) => handle.is_cover_shown().await,
            None => false,
        }
    }
}
