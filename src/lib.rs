//! FridgeFriend client library
//!
//! A household food-inventory tracker. Items, profiles, households and
//! notifications live in a hosted Supabase project; emails go out through
//! EmailJS and recipe suggestions come from Spoonacular.
//!
//! ```no_run
//! use fridgefriend::prelude::*;
//!
//! # async fn run() -> fridgefriend::Result<()> {
//! let client = FridgeFriend::new(FridgeFriendConfig::from_env()?)?;
//! client.sign_in("sam@example.com", "password").await?;
//!
//! let inventory = client.inventory();
//! inventory.fetch_items().await?;
//! let summary = inventory.summary(chrono::Local::now().date_naive()).await;
//! println!("{} items expired", summary.expired.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod household;
pub mod inventory;
pub mod models;
pub mod notifications;
pub mod profile;
pub mod recipes;

use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use fridgefriend_auth::{Auth, Session, SignUpOutcome, User};
use fridgefriend_email::{EmailClient, EmailCredentials};
use fridgefriend_postgrest::PostgrestClient;
use fridgefriend_realtime::RealtimeClient;
use fridgefriend_recipes::RecipeClient;

pub use crate::config::{ClientOptions, EmailConfig, FridgeFriendConfig, RecipeConfig};
pub use crate::error::{Error, Result};

use crate::household::HouseholdService;
use crate::inventory::InventoryStore;
use crate::notifications::{ExpiryAlerter, NotificationStore};
use crate::profile::ProfileStore;
use crate::recipes::RecipeBrowser;

/// Handle shared by every service. Cloning is cheap; clones share the
/// session and the realtime socket.
#[derive(Clone)]
pub struct FridgeFriend {
    config: FridgeFriendConfig,
    options: ClientOptions,
    http_client: Client,
    auth: Arc<Auth>,
    realtime: RealtimeClient,
    email: Option<EmailClient>,
    recipes: Option<RecipeClient>,
}

impl FridgeFriend {
    pub fn new(config: FridgeFriendConfig) -> Result<Self> {
        Self::new_with_options(config, ClientOptions::default())
    }

    pub fn new_with_options(config: FridgeFriendConfig, options: ClientOptions) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let base_url = config.url.as_str().trim_end_matches('/');

        let auth = Auth::new(base_url, &config.anon_key, http_client.clone());
        let realtime = RealtimeClient::new(base_url, &config.anon_key);

        let email = config.email.as_ref().map(|email| {
            EmailClient::new(
                &email.base_url,
                EmailCredentials {
                    service_id: email.service_id.clone(),
                    template_id: email.template_id.clone(),
                    user_id: email.user_id.clone(),
                    access_token: email.access_token.clone(),
                },
                http_client.clone(),
            )
        });
        let recipes = config
            .recipes
            .as_ref()
            .map(|r| RecipeClient::new(&r.base_url, &r.api_key, http_client.clone()));

        Ok(Self {
            config,
            options,
            http_client,
            auth: Arc::new(auth),
            realtime,
            email,
            recipes,
        })
    }

    pub fn config(&self) -> &FridgeFriendConfig {
        &self.config
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    /// The email client, or `Error::Config` when email is not configured
    pub fn email(&self) -> Result<&EmailClient> {
        self.email
            .as_ref()
            .ok_or_else(|| Error::config("email delivery is not configured"))
    }

    /// The recipe client, or `Error::Config` when no API key is configured
    pub fn recipes(&self) -> Result<&RecipeClient> {
        self.recipes
            .as_ref()
            .ok_or_else(|| Error::config("recipe search is not configured"))
    }

    /// Query builder for `table`, authorised with the anon key
    pub fn from(&self, table: &str) -> PostgrestClient {
        PostgrestClient::new(
            self.config.url.as_str(),
            &self.config.anon_key,
            table,
            self.http_client.clone(),
        )
    }

    /// Query builder for `table` on behalf of the signed-in user
    pub async fn table(&self, table: &str) -> Result<PostgrestClient> {
        let session = self
            .auth
            .get_session()
            .await
            .ok_or(Error::NotAuthenticated)?;
        Ok(self.from(table).with_auth(&session.access_token)?)
    }

    pub async fn current_user(&self) -> Result<User> {
        self.auth
            .get_session()
            .await
            .map(|session| session.user)
            .ok_or(Error::NotAuthenticated)
    }

    /// Signs in and hands the access token to the realtime client
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.auth.sign_in_with_password(email, password).await?;
        self.realtime
            .set_auth(Some(session.access_token.clone()))
            .await;
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<SignUpOutcome> {
        let outcome = self.auth.sign_up(email, password, phone).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.realtime
                .set_auth(Some(session.access_token.clone()))
                .await;
        }
        Ok(outcome)
    }

    /// Revokes the session and closes the realtime socket
    pub async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await?;
        self.realtime.set_auth(None).await;
        self.realtime.disconnect().await?;
        Ok(())
    }

    pub fn inventory(&self) -> InventoryStore {
        InventoryStore::new(self.clone())
    }

    pub fn households(&self) -> HouseholdService {
        HouseholdService::new(self.clone())
    }

    pub fn profile(&self) -> ProfileStore {
        ProfileStore::new(self.clone())
    }

    pub fn notifications(&self) -> NotificationStore {
        NotificationStore::new(self.clone())
    }

    pub fn expiry_alerter(&self) -> ExpiryAlerter {
        ExpiryAlerter::new(self.clone())
    }

    pub fn recipe_browser(&self) -> RecipeBrowser {
        RecipeBrowser::new(self.clone())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::{ClientOptions, FridgeFriendConfig};
    pub use crate::error::{Error, Result};
    pub use crate::household::{HouseholdService, InviteOutcome};
    pub use crate::inventory::{ExpirationSummary, InventoryStore, ItemChange, ItemFilter};
    pub use crate::models::{FoodItem, FoodItemPatch, NewFoodItem, NewNotification, NotificationKind};
    pub use crate::notifications::{AddOutcome, NotificationStore};
    pub use crate::recipes::{RecipeQuery, RecipeSort};
    pub use crate::FridgeFriend;
}
