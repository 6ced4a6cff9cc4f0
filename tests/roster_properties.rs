//! Random command sequences against the roster never break its structural invariants.

use std::collections::HashSet;

use fc_roster_back::state::{
    calendar::EventCalendar,
    player::{Identity, PlayerKey, PlayerRef, UserId},
    roster::Roster,
};
use proptest::prelude::*;
use time::{Duration, OffsetDateTime, macros::datetime};

const MONDAY_NOON: OffsetDateTime = datetime!(2026-10-19 12:00 +2);
// Sunday between the approval deadline and the cleanup.
const SUNDAY_EVENING: OffsetDateTime = datetime!(2026-10-18 17:00 +2);

#[derive(Debug, Clone)]
enum Op {
    Create(i64),
    AddSelf(i64),
    AddAdmin(i64, usize),
    Remove(i64),
    RemoveReserved(i64),
    Invite(i64, usize),
    Accept(i64),
    Expire(i64),
    Prune(bool),
    Ask(i64, i64),
    Assume(i64),
    SetApproval(i64, bool),
    Transfer(i64, i64),
    Grant(i64),
    ClearAll,
}

fn user() -> impl Strategy<Value = i64> {
    1i64..8
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => user().prop_map(Op::Create),
        3 => user().prop_map(Op::AddSelf),
        1 => (user(), 0usize..10).prop_map(|(id, at)| Op::AddAdmin(id, at)),
        2 => user().prop_map(Op::Remove),
        1 => user().prop_map(Op::RemoveReserved),
        2 => (user(), 0usize..10).prop_map(|(id, at)| Op::Invite(id, at)),
        2 => user().prop_map(Op::Accept),
        1 => user().prop_map(Op::Expire),
        1 => any::<bool>().prop_map(Op::Prune),
        2 => (user(), user()).prop_map(|(from, to)| Op::Ask(from, to)),
        1 => user().prop_map(Op::Assume),
        2 => (user(), any::<bool>()).prop_map(|(id, value)| Op::SetApproval(id, value)),
        1 => (user(), user()).prop_map(|(from, to)| Op::Transfer(from, to)),
        1 => user().prop_map(Op::Grant),
        1 => Just(Op::ClearAll),
    ]
}

fn member(id: i64) -> Identity {
    Identity::new(id, format!("Player {id}"), None, Some(format!("player_{id}"))).unwrap()
}

fn username(id: i64) -> String {
    format!("player_{id}")
}

fn apply(roster: &mut Roster, op: &Op) {
    // Rejections are expected; only the state left behind matters.
    match *op {
        Op::Create(id) => {
            let _ = roster.create(member(id));
        }
        Op::AddSelf(id) => {
            let _ = roster.add_self(member(id));
        }
        Op::AddAdmin(id, at) => {
            let _ = roster.add_admin(member(id), Some(at));
        }
        Op::Remove(id) => {
            let _ = roster.remove(&PlayerRef::Id(UserId(id)), MONDAY_NOON);
        }
        Op::RemoveReserved(id) => {
            let _ = roster.remove(&PlayerRef::Reserved(username(id)), MONDAY_NOON);
        }
        Op::Invite(id, at) => {
            let _ = roster.invite(&username(id), Some(at), MONDAY_NOON);
        }
        Op::Accept(id) => {
            let _ = roster.accept(member(id));
        }
        Op::Expire(id) => {
            let name = username(id);
            let token = roster
                .invitations()
                .find(|invitation| invitation.username == name)
                .map(|invitation| invitation.token);
            if let Some(token) = token {
                roster.expire_invitation(&name, token, MONDAY_NOON);
            }
        }
        Op::Prune(sunday) => {
            let now = if sunday { SUNDAY_EVENING } else { MONDAY_NOON };
            roster.prune_unapproved(now);
            let again = roster.prune_unapproved(now);
            assert!(again.is_empty(), "second prune removed {again:?}");
        }
        Op::Ask(from, to) => {
            let _ = roster.ask(UserId(from), UserId(to));
        }
        Op::Assume(id) => {
            let _ = roster.assume(UserId(id));
        }
        Op::SetApproval(id, value) => {
            let _ = roster.set_approval(&PlayerRef::Id(UserId(id)), value);
        }
        Op::Transfer(from, to) => {
            let _ = roster.transfer_liability(UserId(from), UserId(to));
        }
        Op::Grant(id) => {
            let _ = roster.grant_liability(UserId(id));
        }
        Op::ClearAll => {
            roster.clear_all();
        }
    }
}

fn check_invariants(roster: &Roster) -> Result<(), TestCaseError> {
    let snapshot = roster.snapshot();

    let mut members = HashSet::new();
    let mut placeholders = HashSet::new();
    for player in &snapshot.players {
        let fresh = match &player.key {
            PlayerKey::Member(identity) => members.insert(identity.id),
            PlayerKey::Reserved { username } => placeholders.insert(username.clone()),
        };
        prop_assert!(fresh, "duplicate entry {:?}", player.key);
    }

    let liable = snapshot.players.iter().filter(|p| p.liable).count();
    prop_assert!(liable <= 1, "{} liable players", liable);
    prop_assert!(
        snapshot
            .players
            .iter()
            .all(|p| !p.liable || !p.key.is_reserved()),
        "a reserved slot holds the liability"
    );

    let invited: HashSet<String> = snapshot
        .invitations
        .iter()
        .map(|invitation| invitation.username.clone())
        .collect();
    prop_assert_eq!(invited.len(), snapshot.invitations.len());
    prop_assert_eq!(&invited, &placeholders);

    for id in &snapshot.asked {
        prop_assert!(members.contains(id), "asked {} is not on the list", id);
    }
    Ok(())
}

proptest! {
    /// Whatever the order of commands, keys stay unique, at most one player is liable, each
    /// reserved slot pairs with exactly one invitation and every nominee is on the list.
    #[test]
    fn command_sequences_keep_the_roster_consistent(ops in prop::collection::vec(op(), 1..60)) {
        let mut roster = Roster::new(4, EventCalendar::default(), Duration::hours(24));
        for op in &ops {
            apply(&mut roster, op);
            check_invariants(&roster)?;
        }
    }

    /// A prune leaves no unconfirmed entry in a playing slot besides the liable one.
    #[test]
    fn prune_leaves_only_confirmed_players(
        ops in prop::collection::vec(op(), 1..40),
        sunday in any::<bool>(),
    ) {
        let mut roster = Roster::new(4, EventCalendar::default(), Duration::hours(24));
        for op in &ops {
            apply(&mut roster, op);
        }

        let now = if sunday { SUNDAY_EVENING } else { MONDAY_NOON };
        roster.prune_unapproved(now);
        prop_assert!(roster.playing().iter().all(|p| p.approved || p.liable));
        check_invariants(&roster)?;
    }
}
