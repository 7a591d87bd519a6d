//! Records mirrored from the hosted tables

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub const FRIDGE_ITEMS: &str = "fridge_items";
pub const PROFILES: &str = "profiles";
pub const HOUSEHOLDS: &str = "households";
pub const HOUSEHOLD_MEMBERS: &str = "household_members";
pub const NOTIFICATIONS: &str = "notifications";

/// A row of `fridge_items`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub purchased: String,
    pub expiration: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub household_id: String,
    #[serde(default)]
    pub created_at: String,
}

/// Form input for a new item; ownership columns are filled in on insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFoodItem {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub category: String,
    pub purchased: String,
    pub expiration: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewFoodItem {
    /// One piece of dairy in the refrigerator, purchased on `purchased`
    pub fn new(name: &str, expiration: NaiveDate, purchased: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            quantity: 1,
            unit: "piece".to_string(),
            category: "dairy".to_string(),
            purchased: purchased.format("%Y-%m-%d").to_string(),
            expiration: expiration.format("%Y-%m-%d").to_string(),
            location: StorageLocation::Refrigerator.as_str().to_string(),
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("item name is required"));
        }
        if self.quantity <= 0 {
            return Err(Error::invalid_input("quantity must be positive"));
        }
        if crate::inventory::parse_date(&self.expiration).is_none() {
            return Err(Error::invalid_input(format!(
                "expiration '{}' is not a date",
                self.expiration
            )));
        }
        Ok(())
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl FoodItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Storage places offered by the add-item form. Stored items may carry
/// any string, so the inventory keeps `location` as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocation {
    Refrigerator,
    Freezer,
    Pantry,
    Counter,
    Cabinet,
}

impl StorageLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Refrigerator => "refrigerator",
            StorageLocation::Freezer => "freezer",
            StorageLocation::Pantry => "pantry",
            StorageLocation::Counter => "counter",
            StorageLocation::Cabinet => "cabinet",
        }
    }
}

/// A row of `profiles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Phone number
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub household_id: Option<String>,
    #[serde(default)]
    pub expiry_notifications: bool,
    #[serde(default)]
    pub inventory_updates: bool,
    #[serde(default)]
    pub recipe_recommendations: bool,
    #[serde(default)]
    pub email_notifications: bool,
}

/// Fields written by the settings form
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household_id: Option<String>,
    #[serde(flatten)]
    pub settings: Option<NotificationSettings>,
}

/// The four notification preference flags of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub expiry_notifications: bool,
    pub inventory_updates: bool,
    pub recipe_recommendations: bool,
    pub email_notifications: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            expiry_notifications: true,
            inventory_updates: true,
            recipe_recommendations: true,
            email_notifications: true,
        }
    }
}

impl From<&Profile> for NotificationSettings {
    fn from(profile: &Profile) -> Self {
        Self {
            expiry_notifications: profile.expiry_notifications,
            inventory_updates: profile.inventory_updates,
            recipe_recommendations: profile.recipe_recommendations,
            email_notifications: profile.email_notifications,
        }
    }
}

/// A row of `households`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Member,
}

/// Pending moves to accepted once; `Rejected` exists in the schema only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Accepted,
    Rejected,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Accepted => "accepted",
            MembershipStatus::Rejected => "rejected",
        }
    }
}

/// A row of `household_members`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    #[serde(default)]
    pub id: Option<String>,
    pub household_id: String,
    pub user_id: String,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
            NotificationKind::Success => "success",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(NotificationKind::Info),
            "warning" => Ok(NotificationKind::Warning),
            "error" => Ok(NotificationKind::Error),
            "success" => Ok(NotificationKind::Success),
            other => Err(Error::invalid_input(format!(
                "unknown notification type '{}'",
                other
            ))),
        }
    }
}

/// A row of `notifications`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            kind,
        }
    }

    /// Announcement sent after an item is inserted
    pub fn item_added(name: &str) -> Self {
        Self::new(
            NotificationKind::Info,
            "Item Added",
            &format!("The item \"{}\" has been added to your inventory.", name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = FoodItemPatch {
            quantity: Some(3),
            location: Some("freezer".to_string()),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "quantity": 3, "location": "freezer" })
        );
        assert!(FoodItemPatch::default().is_empty());
    }

    #[test]
    fn test_profile_update_flattens_settings() {
        let update = ProfileUpdate {
            name: Some("Sam".to_string()),
            settings: Some(NotificationSettings {
                email_notifications: false,
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "name": "Sam",
                "expiry_notifications": true,
                "inventory_updates": true,
                "recipe_recommendations": true,
                "email_notifications": false
            })
        );
    }

    #[test]
    fn test_new_item_validation() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut item = NewFoodItem::new("Milk", today, today);
        assert!(item.validate().is_ok());
        assert_eq!(item.expiration, "2024-05-01");

        item.expiration = "soon".to_string();
        assert!(matches!(item.validate(), Err(Error::InvalidInput(_))));

        item.expiration = "2024-05-03".to_string();
        item.name = "  ".to_string();
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_notification_row_uses_type_column() {
        let row = json!({
            "id": "n1",
            "user_id": "u1",
            "title": "Item Added",
            "message": "The item \"Milk\" has been added to your inventory.",
            "type": "info",
            "read": false,
            "created_at": "2024-05-01T10:00:00+00:00"
        });

        let notification: Notification = serde_json::from_value(row).unwrap();
        assert_eq!(notification.kind, NotificationKind::Info);
        assert_eq!(NewNotification::item_added("Milk").message, notification.message);
    }
}
