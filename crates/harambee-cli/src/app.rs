//! Application orchestration: session bootstrap, the fetch cycle, and the
//! admin insert path.
//!
//! The fetch cycle always rebuilds derived state from scratch: both tables
//! are re-fetched, re-merged, and re-reduced; the snapshots written here
//! are display caches, not sources of truth.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{info, warn};

use harambee_core::aggregate::{aggregate, AggregateResult};
use harambee_core::api::ApiClient;
use harambee_core::auth::{CredentialStore, Session};
use harambee_core::cache::{AssetCache, CacheManager, CachedData, HttpFetcher};
use harambee_core::config::Config;
use harambee_core::models::{NewTransaction, Permission};
use harambee_core::store::{keys, StateStore};

pub struct App {
    pub config: Config,
    pub session: Session,
    pub api: ApiClient,
    pub cache: CacheManager,
    pub store: StateStore,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config.cache_dir().context("Resolving cache directory")?;

        let mut session = Session::new(cache_dir.clone());
        if let Err(e) = session.load() {
            warn!(error = %e, "Failed to load session");
        }

        let mut api = ApiClient::new(config.backend_url()?, config.anon_key()?)?;
        if let Some(ref data) = session.data {
            if !data.is_expired() {
                api.set_token(data.access_token.clone());
            }
        }

        let cache = CacheManager::new(cache_dir.clone())?;
        let store = StateStore::open(cache_dir)?;

        Ok(Self {
            config,
            session,
            api,
            cache,
            store,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Check if the user has a valid, non-expired session
    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid()
    }

    /// First name of the signed-in user, for the dashboard heading.
    pub fn viewer_name(&self) -> String {
        self.session
            .data
            .as_ref()
            .map(|d| d.first_name.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| self.session.email().map(str::to_string))
            .unwrap_or_else(|| "guest".to_string())
    }

    /// Sign in and persist the session. `remember` stores the password in
    /// the OS keychain for the next login.
    pub async fn sign_in(&mut self, email: &str, password: &str, remember: bool) -> Result<()> {
        let session_data = self
            .api
            .sign_in(email, password)
            .await
            .map_err(friendly_auth_error)?;

        if remember {
            if let Err(e) = CredentialStore::store(email, password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }

        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.api.set_token(session_data.access_token.clone());
        self.session.update(session_data);
        self.session.save()?;

        info!("Login successful");
        Ok(())
    }

    /// Register a new account with profile metadata, then persist the
    /// resulting session.
    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<()> {
        let session_data = self
            .api
            .sign_up(email, password, first_name, last_name)
            .await
            .map_err(friendly_auth_error)?;

        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.api.set_token(session_data.access_token.clone());
        self.session.update(session_data);
        self.session.save()?;

        info!("Account created");
        Ok(())
    }

    /// Sign out: invalidate the session remotely and clear all local state.
    pub async fn sign_out(&mut self) -> Result<()> {
        if self.is_authenticated() {
            // Best effort - the local state is cleared regardless.
            if let Err(e) = self.api.sign_out().await {
                warn!(error = %e, "Remote sign-out failed");
            }
        }
        self.session.clear()?;
        self.store.clear()?;
        self.cache.clear()?;
        info!("Signed out");
        Ok(())
    }

    // =========================================================================
    // Fetch Cycle
    // =========================================================================

    /// Run one fetch cycle: fetch both tables, merge, persist the snapshots
    /// and the derived state.
    pub async fn refresh(&mut self) -> Result<AggregateResult> {
        let viewer_email = self
            .session
            .email()
            .map(str::to_string)
            .unwrap_or_default();

        let (members, transactions) = tokio::join!(
            self.api.fetch_members(),
            self.api.fetch_transactions()
        );
        let members = members.context("Fetching members")?;
        let transactions = transactions.context("Fetching transactions")?;

        let result = aggregate(&members, &transactions, &viewer_email);

        if let Err(e) = self.cache.save_members(&members) {
            warn!(error = %e, "Failed to snapshot members");
        }
        if let Err(e) = self.cache.save_transactions(&transactions) {
            warn!(error = %e, "Failed to snapshot transactions");
        }
        if let Err(e) = self.cache.save_aggregate(&result) {
            warn!(error = %e, "Failed to snapshot aggregate");
        }

        self.write_store(&result);
        Ok(result)
    }

    /// The dashboard data: a fresh fetch when possible, the cached snapshot
    /// when the backend is unreachable. The boolean is true for a fresh
    /// result.
    pub async fn dashboard_data(&mut self) -> Result<(CachedData<AggregateResult>, bool)> {
        match self.refresh().await {
            Ok(result) => Ok((CachedData::new(result), true)),
            Err(e) => {
                warn!(error = %e, "Fetch cycle failed, falling back to snapshot");
                let cached = self
                    .cache
                    .load_aggregate()
                    .unwrap_or(None)
                    .context("Backend unreachable and no cached snapshot available")?;
                Ok((cached, false))
            }
        }
    }

    /// Persist the derived values the dashboard shows. Consumers get the
    /// `AggregateResult` handed to them; this is only a warm-start cache.
    fn write_store(&mut self, result: &AggregateResult) {
        if let Some(data) = self.session.data.as_ref() {
            self.store.set(keys::USER, data.first_name.clone());
            self.store.set(keys::EMAIL, data.email.clone());
        }
        self.store
            .set(keys::TOTAL_CONTRIBUTION, result.totals.total.to_string());
        self.store.set(
            keys::CURRENT_USER_CONTRIBUTIONS,
            result.totals.own.to_string(),
        );
        self.store.set(
            keys::UNIQUE_CONTRIBUTORS,
            result.totals.unique_contributors.to_string(),
        );
        self.store
            .set(keys::PERMISSION, result.viewer_permission.to_string());

        if let Err(e) = self.store.save() {
            warn!(error = %e, "Failed to persist state store");
        }
    }

    // =========================================================================
    // Recording Transactions
    // =========================================================================

    /// Record a contribution for a member. Admin only; the view is
    /// re-fetched and re-merged after the insert.
    pub async fn record(&mut self, member_id: i64, amount: Decimal) -> Result<AggregateResult> {
        let current = self.refresh().await?;
        if current.viewer_permission != Permission::Admin {
            anyhow::bail!("Only admin members can record transactions");
        }

        let inserted = self
            .api
            .insert_transaction(&NewTransaction {
                member: member_id,
                amount,
            })
            .await
            .context("Recording transaction")?;
        info!(id = inserted.id, member = member_id, "Transaction recorded");

        self.refresh().await
    }

    // =========================================================================
    // Asset Cache
    // =========================================================================

    /// The asset cache for the configured generation.
    pub fn asset_cache(&self) -> Result<AssetCache<HttpFetcher>> {
        Ok(AssetCache::new(
            self.config.asset_cache_dir()?,
            self.config.asset_generation.clone(),
            HttpFetcher::new()?,
        ))
    }
}

/// Map transport-level failures to messages fit for the login form; auth
/// service messages already are.
fn friendly_auth_error(e: anyhow::Error) -> anyhow::Error {
    let text = e.to_string().to_lowercase();
    if text.contains("network") || text.contains("connect") {
        anyhow::anyhow!("Unable to connect to server. Check your internet connection.")
    } else if text.contains("timeout") {
        anyhow::anyhow!("Connection timed out. Please try again.")
    } else {
        e
    }
}
