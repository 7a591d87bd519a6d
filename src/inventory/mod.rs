//! The household inventory: remote CRUD, dashboards and live updates

pub mod expiry;
pub mod storage;

pub use expiry::{
    days_until_expiration, expiration_label, parse_date, shelf_life_columns, soon_to_expire,
    ExpirationBucket, ExpirationSummary, ExpiryDigest, ItemFilter, ShelfLife,
};
pub use storage::StorageDistribution;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use fridgefriend_postgrest::SortOrder;
use fridgefriend_realtime::{DatabaseChanges, PostgresChangeEvent, PostgresChangePayload, Subscription};

use crate::error::{Error, Result};
use crate::household::HouseholdService;
use crate::models::{FoodItem, FoodItemPatch, NewFoodItem, NewNotification, FRIDGE_ITEMS};
use crate::notifications::NotificationStore;
use crate::FridgeFriend;

#[derive(Serialize)]
struct ItemInsert<'a> {
    #[serde(flatten)]
    item: &'a NewFoodItem,
    user_id: &'a str,
    household_id: &'a str,
    created_at: String,
}

#[derive(Debug, Default)]
struct InventoryState {
    items: Vec<FoodItem>,
    loading: bool,
    error: Option<String>,
}

/// Items of every household the signed-in user belongs to
pub struct InventoryStore {
    client: FridgeFriend,
    households: HouseholdService,
    notifications: NotificationStore,
    state: RwLock<InventoryState>,
}

impl InventoryStore {
    pub fn new(client: FridgeFriend) -> Self {
        Self {
            households: HouseholdService::new(client.clone()),
            notifications: NotificationStore::new(client.clone()),
            client,
            state: RwLock::new(InventoryState::default()),
        }
    }

    pub async fn items(&self) -> Vec<FoodItem> {
        self.state.read().await.items.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Message of the last failed operation
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Reloads items of all accepted households, earliest expiration first
    pub async fn fetch_items(&self) -> Result<Vec<FoodItem>> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = self.load().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match &result {
            Ok(items) => state.items = items.clone(),
            Err(e) => {
                error!("Error fetching inventory: {}", e);
                state.error = Some(e.to_string());
            }
        }
        result
    }

    /// Files a new item under the user's household and announces it
    pub async fn add_item(&self, item: NewFoodItem) -> Result<FoodItem> {
        self.clear_error().await;
        let result = self.insert(&item).await;
        let created = self.track(result).await?;

        self.state.write().await.items.push(created.clone());

        if let Err(e) = self
            .notifications
            .add_notification(NewNotification::item_added(&item.name))
            .await
        {
            warn!("item added but notification failed: {}", e);
        }

        Ok(created)
    }

    /// Applies a partial update and reloads the inventory
    pub async fn update_item(&self, id: &str, patch: &FoodItemPatch) -> Result<Vec<FoodItem>> {
        self.clear_error().await;
        if id.trim().is_empty() {
            return self
                .track(Err(Error::invalid_input("Missing item ID for update")))
                .await;
        }

        let result = async {
            let _: Vec<FoodItem> = self
                .client
                .table(FRIDGE_ITEMS)
                .await?
                .eq("id", id)
                .update(patch)
                .await?;
            Ok(())
        }
        .await;
        self.track(result).await?;

        debug!(item_id = %id, "item updated");
        self.fetch_items().await
    }

    pub async fn delete_item(&self, id: &str) -> Result<()> {
        self.clear_error().await;
        let result = async {
            let _: Vec<FoodItem> = self
                .client
                .table(FRIDGE_ITEMS)
                .await?
                .eq("id", id)
                .delete()
                .await?;
            Ok(())
        }
        .await;
        self.track(result).await?;

        self.state.write().await.items.retain(|item| item.id != id);
        debug!(item_id = %id, "item deleted");
        Ok(())
    }

    pub async fn storage_location_counts(&self) -> StorageDistribution {
        StorageDistribution::from_items(&self.state.read().await.items)
    }

    pub async fn soon_to_expire(&self, today: NaiveDate) -> Vec<FoodItem> {
        soon_to_expire(&self.state.read().await.items, today)
    }

    pub async fn summary(&self, today: NaiveDate) -> ExpirationSummary {
        ExpirationSummary::categorize(&self.state.read().await.items, today)
    }

    /// Subscribes to item changes of every accepted household, one channel
    /// per household. Dropping the watch leaves the channels.
    pub async fn watch(&self) -> Result<InventoryWatch> {
        let user = self.client.current_user().await?;
        let memberships = self.households.accepted_memberships(&user.id).await?;

        if let Some(session) = self.client.auth().get_session().await {
            self.client
                .realtime()
                .set_auth(Some(session.access_token))
                .await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::new();
        for membership in &memberships {
            let tx = tx.clone();
            let joined = self
                .client
                .realtime()
                .channel(&format!("fridge_sync_{}", membership.household_id))
                .on(
                    DatabaseChanges::new(FRIDGE_ITEMS).eq("household_id", &membership.household_id),
                    move |change| {
                        let _ = tx.send(ItemChange::from_payload(&change));
                    },
                )
                .subscribe()
                .await?;
            subscriptions.extend(joined);
        }

        info!(households = memberships.len(), "watching inventory");
        Ok(InventoryWatch {
            _subscriptions: subscriptions,
            changes: rx,
        })
    }

    async fn load(&self) -> Result<Vec<FoodItem>> {
        let user = self.client.current_user().await?;
        let memberships = self.households.accepted_memberships(&user.id).await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let household_ids: Vec<&str> = memberships.iter().map(|m| m.household_id.as_str()).collect();
        let items = self
            .client
            .table(FRIDGE_ITEMS)
            .await?
            .select("*")
            .in_list("household_id", &household_ids)
            .order("expiration", SortOrder::Ascending)
            .execute()
            .await?;
        Ok(items)
    }

    async fn insert(&self, item: &NewFoodItem) -> Result<FoodItem> {
        item.validate()?;
        let user = self.client.current_user().await?;
        let household_id = self
            .households
            .resolve_for_user(&user.id)
            .await?
            .ok_or_else(|| Error::no_household("User is not in an accepted household."))?;

        let inserted: Vec<FoodItem> = self
            .client
            .table(FRIDGE_ITEMS)
            .await?
            .insert(&ItemInsert {
                item,
                user_id: &user.id,
                household_id: &household_id,
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            })
            .await?;

        let created = inserted
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("inserted item was not returned"))?;
        info!(item_id = %created.id, household_id = %household_id, "item added");
        Ok(created)
    }

    async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    async fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!("inventory operation failed: {}", e);
            self.state.write().await.error = Some(e.to_string());
        }
        result
    }
}

/// A row change seen on a household channel
#[derive(Debug, Clone, PartialEq)]
pub enum ItemChange {
    Insert(FoodItem),
    Update(FoodItem),
    Delete { id: String },
    /// The change could not be decoded
    Error(String),
}

impl ItemChange {
    fn from_payload(change: &PostgresChangePayload) -> Self {
        let decode = |value: &serde_json::Value| {
            serde_json::from_value::<FoodItem>(value.clone()).map_err(|e| e.to_string())
        };
        match change.event_type {
            PostgresChangeEvent::Insert => match decode(&change.record) {
                Ok(item) => ItemChange::Insert(item),
                Err(e) => ItemChange::Error(e),
            },
            PostgresChangeEvent::Update => match decode(&change.record) {
                Ok(item) => ItemChange::Update(item),
                Err(e) => ItemChange::Error(e),
            },
            PostgresChangeEvent::Delete => match change.old_record.get("id").and_then(|v| v.as_str()) {
                Some(id) => ItemChange::Delete { id: id.to_string() },
                None => ItemChange::Error("delete without an id".to_string()),
            },
            PostgresChangeEvent::All => ItemChange::Error("unexpected wildcard event".to_string()),
        }
    }
}

/// Live item changes; refetch the inventory after each one
pub struct InventoryWatch {
    _subscriptions: Vec<Subscription>,
    changes: mpsc::UnboundedReceiver<ItemChange>,
}

impl InventoryWatch {
    /// `None` once every channel is gone, or right away with no households
    pub async fn next_change(&mut self) -> Option<ItemChange> {
        self.changes.recv().await
    }
}
