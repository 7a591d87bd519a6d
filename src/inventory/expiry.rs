//! Expiration bucketing for dashboards, the inventory board and digests

use chrono::{DateTime, NaiveDate};

use crate::models::FoodItem;

/// Parses `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(prefix) = value.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Whole days from `today` to the item's expiration date; negative once past
pub fn days_until_expiration(item: &FoodItem, today: NaiveDate) -> Option<i64> {
    parse_date(&item.expiration).map(|date| (date - today).num_days())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpirationBucket {
    Expired,
    Today,
    ThisWeek,
    Later,
}

impl ExpirationBucket {
    /// Unknown dates land in `Later`
    pub fn for_days(days: Option<i64>) -> Self {
        match days {
            Some(d) if d < 0 => ExpirationBucket::Expired,
            Some(0) => ExpirationBucket::Today,
            Some(d) if d <= 7 => ExpirationBucket::ThisWeek,
            _ => ExpirationBucket::Later,
        }
    }
}

pub fn bucket_for(item: &FoodItem, today: NaiveDate) -> ExpirationBucket {
    ExpirationBucket::for_days(days_until_expiration(item, today))
}

/// Items partitioned into the four dashboard buckets, each in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpirationSummary {
    pub expired: Vec<FoodItem>,
    pub today: Vec<FoodItem>,
    pub this_week: Vec<FoodItem>,
    pub later: Vec<FoodItem>,
}

impl ExpirationSummary {
    pub fn categorize(items: &[FoodItem], today: NaiveDate) -> Self {
        let mut summary = Self::default();
        for item in items {
            let bucket = match bucket_for(item, today) {
                ExpirationBucket::Expired => &mut summary.expired,
                ExpirationBucket::Today => &mut summary.today,
                ExpirationBucket::ThisWeek => &mut summary.this_week,
                ExpirationBucket::Later => &mut summary.later,
            };
            bucket.push(item.clone());
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.expired.len() + self.today.len() + self.this_week.len() + self.later.len()
    }

    /// Expired and due-today items, earliest expiration first, at most `limit`
    pub fn attention_needed(&self, limit: usize) -> Vec<FoodItem> {
        let mut items: Vec<FoodItem> = self
            .expired
            .iter()
            .chain(self.today.iter())
            .cloned()
            .collect();
        items.sort_by_key(|item| parse_date(&item.expiration));
        items.truncate(limit);
        items
    }
}

/// Items expiring between today and a week from now, inclusive
pub fn soon_to_expire(items: &[FoodItem], today: NaiveDate) -> Vec<FoodItem> {
    items
        .iter()
        .filter(|item| is_expiring_soon(item, today))
        .cloned()
        .collect()
}

fn is_expiring_soon(item: &FoodItem, today: NaiveDate) -> bool {
    matches!(days_until_expiration(item, today), Some(d) if (0..=7).contains(&d))
}

/// Columns of the inventory board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShelfLife {
    Expired,
    Today,
    /// One to three days left
    Soon,
    /// Four to seven days left
    ThisWeek,
    /// Eight or more days, or no readable date
    Fresh,
}

impl ShelfLife {
    pub const ALL: [ShelfLife; 5] = [
        ShelfLife::Expired,
        ShelfLife::Today,
        ShelfLife::Soon,
        ShelfLife::ThisWeek,
        ShelfLife::Fresh,
    ];

    pub fn for_days(days: Option<i64>) -> Self {
        match days {
            Some(d) if d < 0 => ShelfLife::Expired,
            Some(0) => ShelfLife::Today,
            Some(d) if d <= 3 => ShelfLife::Soon,
            Some(d) if d <= 7 => ShelfLife::ThisWeek,
            _ => ShelfLife::Fresh,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ShelfLife::Expired => "Expired",
            ShelfLife::Today => "Expires Today",
            ShelfLife::Soon => "Expiring Soon",
            ShelfLife::ThisWeek => "This Week",
            ShelfLife::Fresh => "Fresh",
        }
    }
}

/// Groups items into board columns, keeping input order within a column
pub fn shelf_life_columns(items: &[FoodItem], today: NaiveDate) -> Vec<(ShelfLife, Vec<FoodItem>)> {
    let mut columns: Vec<(ShelfLife, Vec<FoodItem>)> =
        ShelfLife::ALL.iter().map(|c| (*c, Vec::new())).collect();
    for item in items {
        let column = ShelfLife::for_days(days_until_expiration(item, today));
        if let Some((_, list)) = columns.iter_mut().find(|(c, _)| *c == column) {
            list.push(item.clone());
        }
    }
    columns
}

/// Status text shown next to an item
pub fn expiration_label(item: &FoodItem, today: NaiveDate) -> String {
    match days_until_expiration(item, today) {
        None => "Unknown expiration".to_string(),
        Some(d) if d < 0 => "Expired".to_string(),
        Some(0) => "Expires today!".to_string(),
        Some(1) => "Expires in 1 day".to_string(),
        Some(d) if d <= 7 => format!("Expires in {} days", d),
        Some(_) => "Fresh".to_string(),
    }
}

/// Inventory list filters; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub location: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub expiring_soon: bool,
}

impl ItemFilter {
    pub fn matches(&self, item: &FoodItem, today: NaiveDate) -> bool {
        if let Some(location) = &self.location {
            if &item.location != location {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &item.category != category {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !item.name.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        !self.expiring_soon || is_expiring_soon(item, today)
    }

    pub fn apply(&self, items: &[FoodItem], today: NaiveDate) -> Vec<FoodItem> {
        items
            .iter()
            .filter(|item| self.matches(item, today))
            .cloned()
            .collect()
    }
}

/// Template parameters of the expiry email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryDigest {
    /// `"Milk (expired), Eggs (expires today)"`
    pub item_list: String,
    /// 0 when something expires today, -1 when everything listed has expired
    pub days_warning: i64,
}

impl ExpiryDigest {
    /// `None` when nothing is expired or due today
    pub fn from_summary(summary: &ExpirationSummary) -> Option<Self> {
        if summary.expired.is_empty() && summary.today.is_empty() {
            return None;
        }

        let item_list = summary
            .expired
            .iter()
            .map(|item| format!("{} (expired)", item.name))
            .chain(
                summary
                    .today
                    .iter()
                    .map(|item| format!("{} (expires today)", item.name)),
            )
            .collect::<Vec<_>>()
            .join(", ");

        let days_warning = if summary.today.is_empty() { -1 } else { 0 };

        Some(Self {
            item_list,
            days_warning,
        })
    }
}
