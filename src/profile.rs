//! The signed-in user's profile and notification preferences

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error};

use fridgefriend_auth::User;

use crate::error::Result;
use crate::models::{NotificationSettings, Profile, ProfileUpdate, PROFILES};
use crate::FridgeFriend;

const PROFILE_COLUMNS: &str = "id,name,number,email,household_id,expiry_notifications,inventory_updates,recipe_recommendations,email_notifications";

#[derive(Serialize)]
struct ProfileUpsert<'a> {
    id: &'a str,
    #[serde(flatten)]
    fields: &'a ProfileUpdate,
}

#[derive(Debug, Default)]
struct ProfileState {
    profile: Option<Profile>,
    loading: bool,
    error: Option<String>,
}

/// Mirrors the `profiles` row of the signed-in user
pub struct ProfileStore {
    client: FridgeFriend,
    state: RwLock<ProfileState>,
}

impl ProfileStore {
    pub fn new(client: FridgeFriend) -> Self {
        Self {
            client,
            state: RwLock::new(ProfileState::default()),
        }
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.state.read().await.profile.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Message of the last failed operation
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Loads the profile row; `None` before the first save
    pub async fn fetch_profile(&self) -> Result<Option<Profile>> {
        self.begin().await;
        let result = self.load().await;
        self.finish(result).await
    }

    /// Upserts the given fields on the user's row, then reloads it
    pub async fn save_profile(&self, update: &ProfileUpdate) -> Result<Option<Profile>> {
        self.begin().await;
        let result = async {
            let user = self.client.current_user().await?;
            let _: Vec<serde_json::Value> = self
                .client
                .table(PROFILES)
                .await?
                .on_conflict("id")
                .upsert(&ProfileUpsert {
                    id: &user.id,
                    fields: update,
                })
                .await?;
            debug!(user_id = %user.id, "profile saved");
            self.load().await
        }
        .await;
        self.finish(result).await
    }

    /// The four preference flags; defaults when the profile does not exist yet
    pub async fn notification_settings(&self) -> Result<NotificationSettings> {
        Ok(self
            .fetch_profile()
            .await?
            .map(|p| NotificationSettings::from(&p))
            .unwrap_or_default())
    }

    pub async fn save_notification_settings(
        &self,
        settings: NotificationSettings,
    ) -> Result<Option<Profile>> {
        let update = ProfileUpdate {
            settings: Some(settings),
            ..Default::default()
        };
        self.save_profile(&update).await
    }

    /// Profile name when set, else the local part of the email address
    pub async fn display_name(&self, user: &User) -> String {
        let state = self.state.read().await;
        state
            .profile
            .as_ref()
            .and_then(|p| p.name.clone())
            .filter(|name| !name.trim().is_empty())
            .or_else(|| user.email_local_part().map(str::to_string))
            .unwrap_or_else(|| user.id.clone())
    }

    async fn load(&self) -> Result<Option<Profile>> {
        let user = self.client.current_user().await?;
        let profile: Option<Profile> = self
            .client
            .table(PROFILES)
            .await?
            .select(PROFILE_COLUMNS)
            .eq("id", &user.id)
            .maybe_single()
            .await?;
        Ok(profile)
    }

    async fn begin(&self) {
        let mut state = self.state.write().await;
        state.loading = true;
        state.error = None;
    }

    async fn finish(&self, result: Result<Option<Profile>>) -> Result<Option<Profile>> {
        let mut state = self.state.write().await;
        state.loading = false;
        match &result {
            Ok(profile) => state.profile = profile.clone(),
            Err(e) => {
                error!("profile operation failed: {}", e);
                state.error = Some(e.to_string());
            }
        }
        result
    }
}
