//! Households, membership resolution and invitations

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    Household, HouseholdMember, MembershipRole, MembershipStatus, HOUSEHOLDS, HOUSEHOLD_MEMBERS,
    PROFILES,
};
use crate::FridgeFriend;

/// The columns of an accepted membership needed to pick a household
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub household_id: String,
    pub role: MembershipRole,
}

/// The owned household when there is one, otherwise the first listed
pub fn resolve_household_id(memberships: &[Membership]) -> Option<&str> {
    memberships
        .iter()
        .find(|m| m.role == MembershipRole::Owner)
        .or_else(|| memberships.first())
        .map(|m| m.household_id.as_str())
}

/// An invitation waiting for the invitee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvite {
    pub household_id: String,
    pub status: MembershipStatus,
    pub household_name: String,
}

#[derive(Deserialize)]
struct InviteRow {
    household_id: String,
    status: MembershipStatus,
    #[serde(default)]
    households: Value,
}

impl From<InviteRow> for PendingInvite {
    fn from(row: InviteRow) -> Self {
        // The embedded household comes back as an object or a one-element array.
        let household = match &row.households {
            Value::Array(list) => list.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        Self {
            household_id: row.household_id,
            status: row.status,
            household_name: household
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Public profile fields shown in the member list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberWithProfile {
    pub member: HouseholdMember,
    /// Blank when the member has no profile row
    pub profile: MemberProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteOutcome {
    /// The pending row was accepted and the profile linked
    Accepted,
    /// The membership had already been accepted; nothing was written
    AlreadyAccepted,
}

#[derive(Deserialize)]
struct ProfileHousehold {
    #[serde(default)]
    household_id: Option<String>,
}

/// `local@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub struct HouseholdService {
    client: FridgeFriend,
}

impl HouseholdService {
    pub fn new(client: FridgeFriend) -> Self {
        Self { client }
    }

    /// Accepted memberships of `user_id`
    pub async fn accepted_memberships(&self, user_id: &str) -> Result<Vec<Membership>> {
        let memberships = self
            .client
            .table(HOUSEHOLD_MEMBERS)
            .await?
            .select("household_id,role")
            .eq("user_id", user_id)
            .eq("status", MembershipStatus::Accepted.as_str())
            .execute()
            .await?;
        Ok(memberships)
    }

    /// The household new items of `user_id` are filed under
    pub async fn resolve_for_user(&self, user_id: &str) -> Result<Option<String>> {
        let memberships = self.accepted_memberships(user_id).await?;
        Ok(resolve_household_id(&memberships).map(str::to_string))
    }

    /// Creates a household, links it to the profile and records the
    /// creator as its accepted owner.
    pub async fn create_household(&self, name: &str, user_id: &str) -> Result<Household> {
        let created: Vec<Household> = self
            .client
            .table(HOUSEHOLDS)
            .await?
            .select("id,name")
            .insert(&json!({ "name": name }))
            .await?;
        let household = created
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("created household was not returned"))?;

        self.link_profile(user_id, &household.id).await?;

        let _: Vec<Value> = self
            .client
            .table(HOUSEHOLD_MEMBERS)
            .await?
            .insert(&json!({
                "household_id": household.id,
                "user_id": user_id,
                "role": MembershipRole::Owner,
                "status": MembershipStatus::Accepted,
            }))
            .await?;

        info!(household_id = %household.id, "created household");
        Ok(household)
    }

    /// Renames the signed-in user's household, creating one first when the
    /// profile has none. An empty `name` becomes "{email local part}'s Household".
    pub async fn save_household_name(&self, name: &str) -> Result<Household> {
        let user = self.client.current_user().await?;
        let name = match name.trim() {
            "" => format!("{}'s Household", user.email_local_part().unwrap_or("My")),
            trimmed => trimmed.to_string(),
        };

        let household_id = match self.profile_household_id(&user.id).await? {
            Some(id) => id,
            None => self.create_household(&name, &user.id).await?.id,
        };

        let updated: Vec<Household> = self
            .client
            .table(HOUSEHOLDS)
            .await?
            .eq("id", &household_id)
            .update(&json!({ "name": name }))
            .await?;

        updated
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("household {}", household_id)))
    }

    /// Name of the household linked to the signed-in user's profile
    pub async fn household_name(&self) -> Result<Option<String>> {
        let user = self.client.current_user().await?;
        let Some(household_id) = self.profile_household_id(&user.id).await? else {
            debug!("user has no household yet");
            return Ok(None);
        };

        let household: Option<Household> = self
            .client
            .table(HOUSEHOLDS)
            .await?
            .select("id,name")
            .eq("id", &household_id)
            .maybe_single()
            .await?;
        Ok(household.map(|h| h.name))
    }

    pub async fn members(&self, household_id: &str) -> Result<Vec<MemberWithProfile>> {
        let members: Vec<HouseholdMember> = self
            .client
            .table(HOUSEHOLD_MEMBERS)
            .await?
            .select("id,household_id,user_id,role,status")
            .eq("household_id", household_id)
            .execute()
            .await?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
        let profiles: Vec<MemberProfile> = self
            .client
            .table(PROFILES)
            .await?
            .select("id,email,name")
            .in_list("id", &user_ids)
            .execute()
            .await?;

        Ok(members
            .into_iter()
            .map(|member| {
                let profile = profiles
                    .iter()
                    .find(|p| p.id == member.user_id)
                    .cloned()
                    .unwrap_or_default();
                MemberWithProfile { member, profile }
            })
            .collect())
    }

    /// Invites a registered user into the signed-in user's household
    pub async fn invite_by_email(&self, email: &str) -> Result<HouseholdMember> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(Error::invalid_input("Please enter a valid email address."));
        }

        let invitee: Option<MemberProfile> = self
            .client
            .table(PROFILES)
            .await?
            .select("id,email,name")
            .eq("email", &email)
            .maybe_single()
            .await?;
        let invitee = invitee.ok_or_else(|| {
            Error::not_found("That email isn't registered with FridgeFriend.")
        })?;

        let user = self.client.current_user().await?;
        let household_id = self.profile_household_id(&user.id).await?.ok_or_else(|| {
            Error::no_household("You don't yet have a household; create one first.")
        })?;

        let inserted: Vec<HouseholdMember> = self
            .client
            .table(HOUSEHOLD_MEMBERS)
            .await?
            .insert(&json!({
                "user_id": invitee.id,
                "household_id": household_id,
                "status": MembershipStatus::Pending,
                "role": MembershipRole::Member,
            }))
            .await?;

        info!(household_id = %household_id, invitee = %invitee.id, "invitation sent");
        inserted
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("created invitation was not returned"))
    }

    pub async fn pending_invites(&self, user_id: &str) -> Result<Vec<PendingInvite>> {
        let rows: Vec<InviteRow> = self
            .client
            .table(HOUSEHOLD_MEMBERS)
            .await?
            .select("household_id,status,households(name)")
            .eq("user_id", user_id)
            .eq("status", MembershipStatus::Pending.as_str())
            .execute()
            .await?;
        Ok(rows.into_iter().map(PendingInvite::from).collect())
    }

    /// Accepts the signed-in user's pending invitation to `household_id`.
    ///
    /// Only a pending row is updated, so repeating the call never transitions
    /// twice or rewrites the profile.
    pub async fn accept_invite(&self, household_id: &str) -> Result<InviteOutcome> {
        let user = self.client.current_user().await?;

        let transitioned: Vec<HouseholdMember> = self
            .client
            .table(HOUSEHOLD_MEMBERS)
            .await?
            .eq("user_id", &user.id)
            .eq("household_id", household_id)
            .eq("status", MembershipStatus::Pending.as_str())
            .update(&json!({ "status": MembershipStatus::Accepted }))
            .await?;

        if !transitioned.is_empty() {
            self.link_profile(&user.id, household_id).await?;
            info!(household_id = %household_id, "invite accepted");
            return Ok(InviteOutcome::Accepted);
        }

        let accepted: Option<Value> = self
            .client
            .table(HOUSEHOLD_MEMBERS)
            .await?
            .select("household_id")
            .eq("user_id", &user.id)
            .eq("household_id", household_id)
            .eq("status", MembershipStatus::Accepted.as_str())
            .maybe_single()
            .await?;

        match accepted {
            Some(_) => {
                debug!(household_id = %household_id, "invite was already accepted");
                Ok(InviteOutcome::AlreadyAccepted)
            }
            None => {
                warn!(household_id = %household_id, "no invitation to accept");
                Err(Error::not_found(format!(
                    "no invitation to household {}",
                    household_id
                )))
            }
        }
    }

    async fn profile_household_id(&self, user_id: &str) -> Result<Option<String>> {
        let profile: Option<ProfileHousehold> = self
            .client
            .table(PROFILES)
            .await?
            .select("household_id")
            .eq("id", user_id)
            .maybe_single()
            .await?;
        Ok(profile.and_then(|p| p.household_id))
    }

    async fn link_profile(&self, user_id: &str, household_id: &str) -> Result<()> {
        let _: Vec<Value> = self
            .client
            .table(PROFILES)
            .await?
            .eq("id", user_id)
            .update(&json!({ "household_id": household_id }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(household_id: &str, role: MembershipRole) -> Membership {
        Membership {
            household_id: household_id.to_string(),
            role,
        }
    }

    #[test]
    fn test_owner_household_preferred() {
        let memberships = vec![
            membership("A", MembershipRole::Member),
            membership("B", MembershipRole::Owner),
        ];
        assert_eq!(resolve_household_id(&memberships), Some("B"));
    }

    #[test]
    fn test_first_household_without_owner() {
        let memberships = vec![
            membership("A", MembershipRole::Member),
            membership("C", MembershipRole::Member),
        ];
        assert_eq!(resolve_household_id(&memberships), Some("A"));
        assert_eq!(resolve_household_id(&[]), None);
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("sam@example.com"));
        assert!(is_valid_email("a.b@mail.example.org"));
        assert!(!is_valid_email("sam@example"));
        assert!(!is_valid_email("sam example@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("sam@@example.com"));
        assert!(!is_valid_email("sam@example."));
    }

    #[test]
    fn test_invite_row_household_shapes() {
        let object: InviteRow = serde_json::from_value(json!({
            "household_id": "h1",
            "status": "pending",
            "households": { "name": "Flat 4" }
        }))
        .unwrap();
        assert_eq!(PendingInvite::from(object).household_name, "Flat 4");

        let array: InviteRow = serde_json::from_value(json!({
            "household_id": "h2",
            "status": "pending",
            "households": [{ "name": "Cabin" }]
        }))
        .unwrap();
        assert_eq!(PendingInvite::from(array).household_name, "Cabin");

        let missing: InviteRow = serde_json::from_value(json!({
            "household_id": "h3",
            "status": "pending"
        }))
        .unwrap();
        assert_eq!(PendingInvite::from(missing).household_name, "");
    }
}
