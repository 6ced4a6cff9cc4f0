//! Request and response bodies of the roster routes.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::validation::{validate_user_id, validate_username},
    state::{
        ban::Ban,
        invitation::Invitation,
        liability::LiabilityChange,
        player::{Identity, Player, PlayerRef, SlotKind, UserId},
        roster::{Admission, RemovalOutcome, Roster, RosterError},
    },
};

const NAME_MAX_LEN: usize = 64;

/// Identity of a chat user as supplied by the command surface.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityInput {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Validate for IdentityInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_user_id(self.id) {
            errors.add("id", e);
        }

        let first_name = self.first_name.trim();
        if first_name.is_empty() || first_name.chars().count() > NAME_MAX_LEN {
            let mut err = ValidationError::new("first_name_length");
            err.message = Some("first name must contain between 1 and 64 characters".into());
            errors.add("first_name", err);
        }

        if let Some(ref username) = self.username {
            if let Err(e) = validate_username(username) {
                errors.add("username", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl TryFrom<IdentityInput> for Identity {
    type Error = RosterError;

    fn try_from(value: IdentityInput) -> Result<Self, Self::Error> {
        Identity::new(value.id, value.first_name, value.last_name, value.username)
    }
}

/// Designates a roster entry: a member by id or a reserved slot by username.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInput {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Validate for TargetInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match (self.user_id, &self.username) {
            (Some(id), None) => {
                if let Err(e) = validate_user_id(id) {
                    errors.add("user_id", e);
                }
            }
            (None, Some(username)) => {
                if let Err(e) = validate_username(username) {
                    errors.add("username", e);
                }
            }
            _ => {
                let mut err = ValidationError::new("target_shape");
                err.message = Some("exactly one of `user_id` or `username` is required".into());
                errors.add("user_id", err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl TryFrom<TargetInput> for PlayerRef {
    type Error = RosterError;

    fn try_from(value: TargetInput) -> Result<Self, Self::Error> {
        match (value.user_id, value.username) {
            (Some(id), None) => Ok(PlayerRef::Id(UserId(id))),
            (None, Some(username)) => Ok(PlayerRef::Reserved(
                crate::state::player::normalize_username(&username)?,
            )),
            _ => Err(RosterError::InvalidIdentity(
                "exactly one of `user_id` or `username` is required".into(),
            )),
        }
    }
}

/// Body of commands that only need the caller.
#[derive(Debug, Deserialize, Validate)]
pub struct CallerRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
}

/// Toggle one of the caller's flags.
#[derive(Debug, Deserialize, Validate)]
pub struct FlagRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(length(min = 1, max = 32))]
    pub flag: String,
}

/// Nominate a playing member for the liability.
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(range(min = 1))]
    pub candidate: i64,
}

/// Put a member on the list at an optional position.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminAddRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(nested)]
    pub player: IdentityInput,
    #[serde(default)]
    pub index: Option<usize>,
}

/// Insert an ordered list of members.
#[derive(Debug, Deserialize, Validate)]
pub struct SeedRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(nested)]
    pub players: Vec<IdentityInput>,
}

/// Act on one roster entry.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminTargetRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(nested)]
    pub target: TargetInput,
}

/// Set the approval of one roster entry.
#[derive(Debug, Deserialize, Validate)]
pub struct ApprovalRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(nested)]
    pub target: TargetInput,
    pub approved: bool,
}

/// Toggle a flag on one roster entry.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminFlagRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(nested)]
    pub target: TargetInput,
    #[validate(length(min = 1, max = 32))]
    pub flag: String,
}

/// Move the liability between two members.
#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(range(min = 1))]
    pub from: i64,
    #[validate(range(min = 1))]
    pub to: i64,
}

/// Hand an unassigned liability to a member.
#[derive(Debug, Deserialize, Validate)]
pub struct GrantRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(range(min = 1))]
    pub to: i64,
}

/// Bar a member from joining for a number of days.
#[derive(Debug, Deserialize, Validate)]
pub struct BanRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(range(min = 1, max = 365))]
    pub days: u32,
}

/// Lift a ban.
#[derive(Debug, Deserialize, Validate)]
pub struct UnbanRequest {
    #[validate(nested)]
    pub caller: IdentityInput,
    #[validate(range(min = 1))]
    pub user_id: i64,
}

/// Reserve a slot for a username.
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub caller: IdentityInput,
    pub username: String,
    #[serde(default)]
    pub index: Option<usize>,
}

impl Validate for InviteRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(caller_errors) = self.caller.validate() {
            errors.merge_self("caller", Err(caller_errors));
        }
        if let Err(e) = validate_username(&self.username) {
            errors.add("username", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// One roster entry as shown to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlayerView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub reserved: bool,
    pub liable: bool,
    pub approved: bool,
    pub flags: Vec<String>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            name: player.display_name(),
            user_id: player.user_id().map(|id| id.0),
            username: player.key.username().map(str::to_owned),
            reserved: player.key.is_reserved(),
            liable: player.liable,
            approved: player.approved,
            flags: player.flags.iter().cloned().collect(),
        }
    }
}

impl From<Player> for PlayerView {
    fn from(player: Player) -> Self {
        PlayerView::from(&player)
    }
}

/// A pending invitation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InvitationView {
    pub username: String,
    pub expires_at: String,
}

impl From<&Invitation> for InvitationView {
    fn from(invitation: &Invitation) -> Self {
        Self {
            username: invitation.username.clone(),
            expires_at: invitation
                .expires_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| "invalid-timestamp".into()),
        }
    }
}

/// A recorded ban.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BanView {
    pub user_id: i64,
    pub until: String,
}

impl From<&Ban> for BanView {
    fn from(ban: &Ban) -> Self {
        Self {
            user_id: ban.user_id.0,
            until: ban
                .until
                .format(&Rfc3339)
                .unwrap_or_else(|_| "invalid-timestamp".into()),
        }
    }
}

/// Full state of the list.
#[derive(Debug, Clone, Serialize)]
pub struct RosterView {
    pub capacity: usize,
    pub playing: Vec<PlayerView>,
    pub waiting: Vec<PlayerView>,
    pub invitations: Vec<InvitationView>,
    pub liable: Option<PlayerView>,
    pub pending_asks: Vec<i64>,
    pub bans: Vec<BanView>,
}

impl From<&Roster> for RosterView {
    fn from(roster: &Roster) -> Self {
        Self {
            capacity: roster.capacity(),
            playing: roster.playing().iter().map(PlayerView::from).collect(),
            waiting: roster.waiting().iter().map(PlayerView::from).collect(),
            invitations: roster.invitations().map(InvitationView::from).collect(),
            liable: roster.liable().map(PlayerView::from),
            pending_asks: roster.pending_asks().into_iter().map(|id| id.0).collect(),
            bans: roster.bans().map(BanView::from).collect(),
        }
    }
}

/// Result of joining the list.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionResponse {
    pub player: PlayerView,
    pub position: usize,
    pub slot: SlotKind,
    pub accepted_invitation: bool,
}

impl From<&Admission> for AdmissionResponse {
    fn from(admission: &Admission) -> Self {
        Self {
            player: PlayerView::from(&admission.player),
            position: admission.index,
            slot: admission.slot,
            accepted_invitation: admission.accepted_invitation,
        }
    }
}

/// Result of leaving the list.
#[derive(Debug, Clone, Serialize)]
pub struct RemovalResponse {
    pub removed: PlayerView,
    pub slot: SlotKind,
    pub promoted: Option<PlayerView>,
}

impl From<&RemovalOutcome> for RemovalResponse {
    fn from(outcome: &RemovalOutcome) -> Self {
        Self {
            removed: PlayerView::from(&outcome.removed),
            slot: outcome.slot,
            promoted: outcome.promoted.as_ref().map(PlayerView::from),
        }
    }
}

/// A flag after toggling.
#[derive(Debug, Clone, Serialize)]
pub struct FlagResponse {
    pub player: PlayerView,
    pub flag: String,
    pub enabled: bool,
}

/// Liability holder before and after a change.
#[derive(Debug, Clone, Serialize)]
pub struct LiabilityResponse {
    pub from: Option<PlayerView>,
    pub to: PlayerView,
}

impl From<&LiabilityChange> for LiabilityResponse {
    fn from(change: &LiabilityChange) -> Self {
        Self {
            from: change.from.as_ref().map(PlayerView::from),
            to: PlayerView::from(&change.to),
        }
    }
}

/// A fresh invitation.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationResponse {
    pub invitation: InvitationView,
    pub position: usize,
}

/// Outcome of a bulk seed.
#[derive(Debug, Clone, Serialize)]
pub struct SeedResponse {
    pub added: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Random teams built from the playing slots.
#[derive(Debug, Clone, Serialize)]
pub struct TeamsResponse {
    pub teams: Vec<Vec<PlayerView>>,
}

/// A ban as recorded or lifted.
#[derive(Debug, Clone, Serialize)]
pub struct BanResponse {
    pub ban: BanView,
}

/// Outcome of an admin clear.
#[derive(Debug, Clone, Serialize)]
pub struct ClearedResponse {
    pub withdrawn_invitations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: i64) -> IdentityInput {
        IdentityInput {
            id,
            first_name: "Dana".into(),
            last_name: None,
            username: Some("dana_k".into()),
        }
    }

    #[test]
    fn identity_input_reports_every_bad_field() {
        let input = IdentityInput {
            id: 0,
            first_name: "  ".into(),
            last_name: None,
            username: Some("x".into()),
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("id"));
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("username"));
    }

    #[test]
    fn target_requires_exactly_one_designation() {
        let both = TargetInput {
            user_id: Some(1),
            username: Some("guest_one".into()),
        };
        assert!(both.validate().is_err());

        let reserved = TargetInput {
            user_id: None,
            username: Some("@Guest_One".into()),
        };
        assert!(reserved.validate().is_ok());
        assert_eq!(
            PlayerRef::try_from(reserved).unwrap(),
            PlayerRef::Reserved("guest_one".into())
        );
    }

    #[test]
    fn nested_caller_is_validated() {
        let request = AskRequest {
            caller: caller(-1),
            candidate: 2,
        };
        assert!(request.validate().is_err());

        let request = InviteRequest {
            caller: caller(1),
            username: "bad name".into(),
            index: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn ban_length_is_bounded() {
        let request = BanRequest {
            caller: caller(1),
            user_id: 5,
            days: 0,
        };
        assert!(request.validate().is_err());

        let request = BanRequest {
            caller: caller(1),
            user_id: 5,
            days: 14,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn player_view_hides_missing_fields() {
        let view = PlayerView::from(&Player::reserved("guest_one".into()));
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("user_id").is_none());
        assert_eq!(json["reserved"], true);
    }
}
