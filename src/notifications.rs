//! Stored notifications, their email copies and the expiry digest

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use fridgefriend_auth::User;

use crate::error::{Error, Result};
use crate::inventory::{ExpirationSummary, ExpiryDigest};
use crate::models::{NewNotification, Notification, NotificationKind, NOTIFICATIONS, PROFILES};
use crate::FridgeFriend;

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(Notification),
    /// An identical notification was stored inside the dedup window
    Duplicate,
}

/// Template parameters of a notification email
#[derive(Debug, Serialize)]
struct NotificationEmail<'a> {
    to_email: &'a str,
    user_name: &'a str,
    title: &'a str,
    message: &'a str,
}

/// Template parameters of the expiry digest email
#[derive(Debug, Serialize)]
struct ExpiryEmail<'a> {
    to_email: &'a str,
    user_name: &'a str,
    item_list: &'a str,
    days_warning: i64,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPreferences {
    #[serde(default)]
    expiry_notifications: bool,
    #[serde(default)]
    email_notifications: bool,
}

#[derive(Debug, Default)]
struct NotificationState {
    notifications: Vec<Notification>,
    loading: bool,
    error: Option<String>,
}

/// The signed-in user's notifications, newest first
pub struct NotificationStore {
    client: FridgeFriend,
    state: RwLock<NotificationState>,
}

impl NotificationStore {
    pub fn new(client: FridgeFriend) -> Self {
        Self {
            client,
            state: RwLock::new(NotificationState::default()),
        }
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.state
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        self.state.write().await.loading = true;
        let result = self.load().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match &result {
            Ok(list) => {
                state.notifications = list.clone();
                state.error = None;
            }
            Err(e) => state.error = Some(e.to_string()),
        }
        result
    }

    /// Stores a notification unless an identical one was stored inside the
    /// dedup window, emails it when the user has email notifications on,
    /// then reloads the list.
    pub async fn add_notification(&self, notification: NewNotification) -> Result<AddOutcome> {
        let result = self.record(notification, true).await;
        self.track(result).await
    }

    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        let result = async {
            let user = self.client.current_user().await?;
            let _: Vec<Value> = self
                .client
                .table(NOTIFICATIONS)
                .await?
                .eq("id", id)
                .eq("user_id", &user.id)
                .update(&json!({ "read": true }))
                .await?;
            Ok(())
        }
        .await;

        if result.is_ok() {
            let mut state = self.state.write().await;
            if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
                n.read = true;
            }
        }
        self.track(result).await
    }

    pub async fn mark_all_as_read(&self) -> Result<()> {
        let result = async {
            let user = self.client.current_user().await?;
            let _: Vec<Value> = self
                .client
                .table(NOTIFICATIONS)
                .await?
                .eq("user_id", &user.id)
                .eq("read", "false")
                .update(&json!({ "read": true }))
                .await?;
            Ok(())
        }
        .await;

        if result.is_ok() {
            let mut state = self.state.write().await;
            for n in state.notifications.iter_mut() {
                n.read = true;
            }
        }
        self.track(result).await
    }

    /// Deletes every notification of the user
    pub async fn clear_notifications(&self) -> Result<()> {
        let result = async {
            let user = self.client.current_user().await?;
            let _: Vec<Value> = self
                .client
                .table(NOTIFICATIONS)
                .await?
                .eq("user_id", &user.id)
                .delete()
                .await?;
            Ok(())
        }
        .await;

        if result.is_ok() {
            self.state.write().await.notifications.clear();
        }
        self.track(result).await
    }

    pub(crate) async fn record(
        &self,
        notification: NewNotification,
        send_email: bool,
    ) -> Result<AddOutcome> {
        let user = self.client.current_user().await?;

        if self.is_duplicate(&user.id, &notification).await? {
            info!(title = %notification.title, "skipping duplicate notification");
            return Ok(AddOutcome::Duplicate);
        }

        let inserted: Vec<Notification> = self
            .client
            .table(NOTIFICATIONS)
            .await?
            .insert(&json!({
                "user_id": user.id,
                "title": notification.title,
                "message": notification.message,
                "type": notification.kind,
            }))
            .await?;
        let stored = inserted
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("No notification data returned"))?;

        if send_email {
            if let Err(e) = self.email_copy(&user, &stored).await {
                warn!("notification email not sent: {}", e);
            }
        }

        if let Err(e) = self.fetch_notifications().await {
            warn!("notification stored but list not reloaded: {}", e);
            self.state
                .write()
                .await
                .notifications
                .insert(0, stored.clone());
        }
        Ok(AddOutcome::Added(stored))
    }

    async fn is_duplicate(&self, user_id: &str, notification: &NewNotification) -> Result<bool> {
        let since = Utc::now() - self.client.options().notification_dedup_window;
        let existing: Option<Value> = self
            .client
            .table(NOTIFICATIONS)
            .await?
            .select("id")
            .eq("user_id", user_id)
            .eq("title", &notification.title)
            .eq("message", &notification.message)
            .gte(
                "created_at",
                &since.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .maybe_single()
            .await?;
        Ok(existing.is_some())
    }

    async fn email_copy(&self, user: &User, notification: &Notification) -> Result<()> {
        let preferences = email_preferences(&self.client, &user.id).await?;
        if !preferences.email_notifications {
            debug!("user has disabled email notifications");
            return Ok(());
        }

        let Some(to_email) = user.email.as_deref() else {
            debug!("user has no email address");
            return Ok(());
        };
        let user_name = user.email_local_part().unwrap_or(to_email);

        self.client
            .email()?
            .send(&NotificationEmail {
                to_email,
                user_name,
                title: &notification.title,
                message: &notification.message,
            })
            .await?;
        info!(title = %notification.title, "notification email sent");
        Ok(())
    }

    async fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!("notification operation failed: {}", e);
            self.state.write().await.error = Some(e.to_string());
        }
        result
    }

    async fn load(&self) -> Result<Vec<Notification>> {
        let user = self.client.current_user().await?;
        let notifications = self
            .client
            .table(NOTIFICATIONS)
            .await?
            .select("*")
            .eq("user_id", &user.id)
            .order("created_at", fridgefriend_postgrest::SortOrder::Descending)
            .execute()
            .await?;
        Ok(notifications)
    }
}

async fn email_preferences(client: &FridgeFriend, user_id: &str) -> Result<EmailPreferences> {
    let preferences: Option<EmailPreferences> = client
        .table(PROFILES)
        .await?
        .select("expiry_notifications,email_notifications")
        .eq("id", user_id)
        .maybe_single()
        .await?;
    Ok(preferences.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutcome {
    /// Nothing is expired or due today
    NothingToSend,
    /// This item list was already handled during this process
    AlreadySent,
    /// The user turned expiry notifications off
    Disabled,
    /// A warning notification was recorded; email is off or unavailable
    Recorded,
    Sent,
}

/// Sends at most one expiry digest per user and item list per process
pub struct ExpiryAlerter {
    client: FridgeFriend,
    notifications: NotificationStore,
    alerted: Mutex<HashSet<String>>,
}

impl ExpiryAlerter {
    pub fn new(client: FridgeFriend) -> Self {
        Self {
            notifications: NotificationStore::new(client.clone()),
            client,
            alerted: Mutex::new(HashSet::new()),
        }
    }

    pub async fn send_expiry_digest(&self, summary: &ExpirationSummary) -> Result<DigestOutcome> {
        let Some(digest) = ExpiryDigest::from_summary(summary) else {
            return Ok(DigestOutcome::NothingToSend);
        };

        let user = self.client.current_user().await?;
        let key = format!("{}:{}", user.id, digest.item_list);
        if self.alerted.lock().await.contains(&key) {
            debug!("expiry digest already sent for {}", digest.item_list);
            return Ok(DigestOutcome::AlreadySent);
        }

        let preferences = email_preferences(&self.client, &user.id).await?;
        if !preferences.expiry_notifications {
            self.alerted.lock().await.insert(key);
            return Ok(DigestOutcome::Disabled);
        }

        self.notifications
            .record(
                NewNotification::new(
                    NotificationKind::Warning,
                    "Items Expiring",
                    &format!("These items need attention: {}", digest.item_list),
                ),
                false,
            )
            .await?;

        let outcome = match (
            preferences.email_notifications,
            user.email.as_deref(),
            self.client.email(),
        ) {
            (true, Some(to_email), Ok(email)) => {
                let template_id = self
                    .client
                    .config()
                    .email
                    .as_ref()
                    .and_then(|e| e.expiry_template_id.clone())
                    .unwrap_or_else(|| email.credentials().template_id.clone());
                email
                    .send_template(
                        &template_id,
                        &ExpiryEmail {
                            to_email,
                            user_name: user.email_local_part().unwrap_or(to_email),
                            item_list: &digest.item_list,
                            days_warning: digest.days_warning,
                        },
                    )
                    .await?;
                info!(items = %digest.item_list, "expiry digest sent");
                DigestOutcome::Sent
            }
            _ => DigestOutcome::Recorded,
        };

        self.alerted.lock().await.insert(key);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_params_field_names() {
        let params = serde_json::to_value(ExpiryEmail {
            to_email: "sam@example.com",
            user_name: "sam",
            item_list: "Milk (expired)",
            days_warning: -1,
        })
        .unwrap();
        assert_eq!(
            params,
            json!({
                "to_email": "sam@example.com",
                "user_name": "sam",
                "item_list": "Milk (expired)",
                "days_warning": -1
            })
        );
    }
}
