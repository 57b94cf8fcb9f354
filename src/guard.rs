//! Referential integrity guard
//!
//! Cross-entity rules that the plain whitelist path cannot express:
//! - team deletion falls back to deactivation while active players reference it
//! - player deletion is always a deactivation
//! - matches never pit a team against itself, and a winner is one of the two teams
//! - tournaments never end before they start
//! - match results are derived from the scores and persisted in one UPDATE
//!
//! Pure checks (`check_new_match`, `check_tournament_dates`) run before any
//! statement reaches the store.

use chrono::NaiveDate;
use crate::entity::Entity;
use crate::query::{FilterSet, QueryBuilder, Statement};
use crate::storage::SqliteStore;
use crate::value::{self, FieldMap, Row, Value};
use crate::{Error, Result};

/// How a delete request was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// Row removed from the store
    Removed,
    /// Row kept with its active flag cleared
    Deactivated { active_players: usize },
}

impl std::fmt::Display for Deletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Deletion::Removed => write!(f, "removed"),
            Deletion::Deactivated { active_players: 0 } => write!(f, "deactivated"),
            Deletion::Deactivated { active_players } => {
                write!(f, "deactivated ({} active players)", active_players)
            }
        }
    }
}

/// Result of a match decided by its scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Team1,
    Team2,
    Draw,
}

impl MatchOutcome {
    /// Strictly higher score wins; equal scores mean no winner
    pub fn from_scores(score_team1: u32, score_team2: u32) -> Self {
        match score_team1.cmp(&score_team2) {
            std::cmp::Ordering::Greater => MatchOutcome::Team1,
            std::cmp::Ordering::Less => MatchOutcome::Team2,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
        }
    }

    /// Right-hand side of the `winner_team_id` assignment
    fn winner_expr(&self) -> &'static str {
        match self {
            MatchOutcome::Team1 => "team1_id",
            MatchOutcome::Team2 => "team2_id",
            MatchOutcome::Draw => "NULL",
        }
    }
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchOutcome::Team1 => write!(f, "team 1 wins"),
            MatchOutcome::Team2 => write!(f, "team 2 wins"),
            MatchOutcome::Draw => write!(f, "draw"),
        }
    }
}

/// Integer id carried by a field, accepting numeric text
fn id_of(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn date_of(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::DateTime(dt) => Some(dt.date()),
        Value::Text(s) => value::parse_date(s),
        _ => None,
    }
}

/// Reject a match row that pits a team against itself or names an outside winner
pub fn check_new_match(fields: &FieldMap) -> Result<()> {
    let team1 = fields.get("team1_id").and_then(id_of);
    let team2 = fields.get("team2_id").and_then(id_of);

    if let (Some(t1), Some(t2)) = (team1, team2) {
        if t1 == t2 {
            return Err(Error::InvalidMatch(format!("team {} cannot play against itself", t1)));
        }
    }

    match fields.get("winner_team_id") {
        None | Some(Value::Null) => Ok(()),
        Some(winner) => {
            let winner = id_of(winner)
                .ok_or_else(|| Error::InvalidMatch(format!("winner '{}' is not a team id", winner)))?;
            check_winner(winner, team1, team2)
        }
    }
}

fn check_winner(winner: i64, team1: Option<i64>, team2: Option<i64>) -> Result<()> {
    if Some(winner) == team1 || Some(winner) == team2 {
        Ok(())
    } else {
        Err(Error::InvalidMatch(format!(
            "winner {} is not one of the competing teams",
            winner
        )))
    }
}

/// Reject a tournament whose end date precedes its start date.
///
/// `stored` supplies the missing side on partial updates.
pub fn check_tournament_dates(fields: &FieldMap, stored: Option<&Row>) -> Result<()> {
    let pick = |column: &str| {
        fields
            .get(column)
            .or_else(|| stored.and_then(|row| row.get(column)))
            .and_then(date_of)
    };

    if let (Some(start), Some(end)) = (pick("start_date"), pick("end_date")) {
        if end < start {
            return Err(Error::Validation(format!(
                "tournament ends ({}) before it starts ({})",
                end, start
            )));
        }
    }
    Ok(())
}

/// Store-aware side of the guard
pub struct IntegrityGuard<'a> {
    store: &'a SqliteStore,
}

impl<'a> IntegrityGuard<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Validate a field map about to be inserted
    pub fn check_create(&self, entity: Entity, fields: &FieldMap) -> Result<()> {
        match entity {
            Entity::Match => check_new_match(fields),
            Entity::Tournament => check_tournament_dates(fields, None),
            _ => Ok(()),
        }
    }

    /// Validate a partial update against the stored row.
    ///
    /// Only reads the store when the update touches a guarded column.
    pub fn check_update(&self, entity: Entity, id: i64, fields: &FieldMap) -> Result<()> {
        match entity {
            Entity::Match => {
                let winner = match fields.get("winner_team_id") {
                    None | Some(Value::Null) => return Ok(()),
                    Some(v) => id_of(v).ok_or_else(|| {
                        Error::InvalidMatch(format!("winner '{}' is not a team id", v))
                    })?,
                };
                let stored = self.stored(entity, id)?;
                check_winner(winner, stored.get_i64("team1_id"), stored.get_i64("team2_id"))
            }
            Entity::Tournament => {
                if !fields.contains_key("start_date") && !fields.contains_key("end_date") {
                    return Ok(());
                }
                let stored = self.stored(entity, id)?;
                check_tournament_dates(fields, Some(&stored))
            }
            _ => Ok(()),
        }
    }

    fn stored(&self, entity: Entity, id: i64) -> Result<Row> {
        self.store
            .fetch_one(&QueryBuilder::for_entity(entity).select_by_id(id))?
            .ok_or(Error::NotFound { entity, id })
    }

    /// Delete a team, deactivating it instead while active players reference it.
    ///
    /// The dependent count and the resulting write run in one immediate
    /// transaction, so no player can join between the two.
    pub fn delete_team(&self, id: i64) -> Result<Deletion> {
        self.store.transaction(|store| {
            let players = QueryBuilder::for_entity(Entity::Player);
            let dependents = FilterSet::new()
                .eq("team_id", Some(id))
                .eq("is_active", Some(true))
                .build(players.spec())?;
            let active_players = store.fetch_scalar(&players.count(dependents))? as usize;

            let teams = QueryBuilder::for_entity(Entity::Team);
            let (stmt, outcome) = if active_players > 0 {
                (teams.deactivate(id)?, Deletion::Deactivated { active_players })
            } else {
                (teams.delete(id), Deletion::Removed)
            };

            if store.execute(&stmt)? == 0 {
                return Err(Error::NotFound { entity: Entity::Team, id });
            }
            if active_players > 0 {
                tracing::warn!(
                    "Team {} still has {} active players, deactivated instead of removed",
                    id,
                    active_players
                );
            }
            Ok(outcome)
        })
    }

    /// Players are never removed, only deactivated
    pub fn delete_player(&self, id: i64) -> Result<Deletion> {
        let stmt = QueryBuilder::for_entity(Entity::Player).deactivate(id)?;
        if self.store.execute(&stmt)? == 0 {
            return Err(Error::NotFound { entity: Entity::Player, id });
        }
        Ok(Deletion::Deactivated { active_players: 0 })
    }

    /// Store both scores and the derived winner in a single UPDATE
    pub fn record_match_result(&self, id: i64, score_team1: u32, score_team2: u32) -> Result<MatchOutcome> {
        let outcome = MatchOutcome::from_scores(score_team1, score_team2);
        let spec = Entity::Match.spec();
        let stmt = Statement::new(
            format!(
                "UPDATE {} SET score_team1 = ?, score_team2 = ?, winner_team_id = {} WHERE {} = ?",
                spec.table,
                outcome.winner_expr(),
                spec.primary_key
            ),
            vec![score_team1.into(), score_team2.into(), Value::Integer(id)],
        );

        if self.store.execute(&stmt)? == 0 {
            return Err(Error::NotFound { entity: Entity::Match, id });
        }
        tracing::debug!("Match {} result {}:{} ({})", id, score_team1, score_team2, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_team(store: &SqliteStore, name: &str) -> i64 {
        let stmt = QueryBuilder::for_entity(Entity::Team)
            .insert(&FieldMap::new().with("team_name", name))
            .unwrap();
        store.insert(&stmt).unwrap()
    }

    fn seed_player(store: &SqliteStore, team_id: i64, nickname: &str, active: bool) -> i64 {
        let stmt = QueryBuilder::for_entity(Entity::Player)
            .insert(
                &FieldMap::new()
                    .with("team_id", team_id)
                    .with("nickname", nickname)
                    .with("is_active", active),
            )
            .unwrap();
        store.insert(&stmt).unwrap()
    }

    fn seed_match(store: &SqliteStore, team1: i64, team2: i64) -> i64 {
        let tournament = store
            .insert(
                &QueryBuilder::for_entity(Entity::Tournament)
                    .insert(
                        &FieldMap::new()
                            .with("tournament_name", "IEM Cologne")
                            .with("start_date", "2024-08-01")
                            .with("end_date", "2024-08-18"),
                    )
                    .unwrap(),
            )
            .unwrap();
        store
            .insert(
                &QueryBuilder::for_entity(Entity::Match)
                    .insert(
                        &FieldMap::new()
                            .with("tournament_id", tournament)
                            .with("team1_id", team1)
                            .with("team2_id", team2)
                            .with("match_date", "2024-08-18 18:00:00"),
                    )
                    .unwrap(),
            )
            .unwrap()
    }

    fn fetch(store: &SqliteStore, entity: Entity, id: i64) -> Option<Row> {
        store
            .fetch_one(&QueryBuilder::for_entity(entity).select_by_id(id))
            .unwrap()
    }

    #[test]
    fn test_outcome_from_scores() {
        assert_eq!(MatchOutcome::from_scores(16, 10), MatchOutcome::Team1);
        assert_eq!(MatchOutcome::from_scores(2, 13), MatchOutcome::Team2);
        assert_eq!(MatchOutcome::from_scores(10, 10), MatchOutcome::Draw);
    }

    #[test]
    fn test_self_match_rejected() {
        let fields = FieldMap::new().with("team1_id", 4i64).with("team2_id", 4i64);
        assert!(matches!(check_new_match(&fields), Err(Error::InvalidMatch(_))));

        let as_text = FieldMap::new().with("team1_id", "4").with("team2_id", 4i64);
        assert!(matches!(check_new_match(&as_text), Err(Error::InvalidMatch(_))));
    }

    #[test]
    fn test_winner_must_be_a_competitor() {
        let base = FieldMap::new().with("team1_id", 1i64).with("team2_id", 2i64);

        assert!(check_new_match(&base.clone().with("winner_team_id", 2i64)).is_ok());
        assert!(check_new_match(&base.clone().with("winner_team_id", Value::Null)).is_ok());
        assert!(matches!(
            check_new_match(&base.with("winner_team_id", 3i64)),
            Err(Error::InvalidMatch(_))
        ));
    }

    #[test]
    fn test_tournament_dates() {
        let ok = FieldMap::new().with("start_date", "2024-05-01").with("end_date", "2024-05-01");
        assert!(check_tournament_dates(&ok, None).is_ok());

        let bad = FieldMap::new().with("start_date", "2024-05-10").with("end_date", "2024-05-01");
        assert!(matches!(check_tournament_dates(&bad, None), Err(Error::Validation(_))));

        let stored = FieldMap::new().with("start_date", "2024-05-10").with("end_date", "2024-05-12");
        let partial = FieldMap::new().with("end_date", "2024-05-09");
        assert!(check_tournament_dates(&partial, Some(&stored)).is_err());
    }

    #[test]
    fn test_delete_team_with_active_players_deactivates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let team = seed_team(&store, "Team Spirit");
        seed_player(&store, team, "donk", true);
        seed_player(&store, team, "sh1ro", true);
        seed_player(&store, team, "retired", false);

        let guard = IntegrityGuard::new(&store);
        assert_eq!(
            guard.delete_team(team).unwrap(),
            Deletion::Deactivated { active_players: 2 }
        );

        let row = fetch(&store, Entity::Team, team).unwrap();
        assert_eq!(row.get_bool("is_active"), Some(false));
    }

    #[test]
    fn test_delete_team_without_active_players_removes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let team = seed_team(&store, "Complexity");
        let benched = seed_player(&store, team, "JT", false);

        let guard = IntegrityGuard::new(&store);
        assert_eq!(guard.delete_team(team).unwrap(), Deletion::Removed);
        assert!(fetch(&store, Entity::Team, team).is_none());

        let player = fetch(&store, Entity::Player, benched).unwrap();
        assert_eq!(player.get("team_id"), Some(&Value::Null));
    }

    #[test]
    fn test_delete_missing_team() {
        let store = SqliteStore::open_in_memory().unwrap();
        let guard = IntegrityGuard::new(&store);
        assert!(matches!(
            guard.delete_team(404),
            Err(Error::NotFound { entity: Entity::Team, id: 404 })
        ));
    }

    #[test]
    fn test_delete_team_referenced_by_match_fails_and_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = seed_team(&store, "Eternal Fire");
        let b = seed_team(&store, "Monte");
        seed_match(&store, a, b);

        let guard = IntegrityGuard::new(&store);
        assert!(matches!(guard.delete_team(a), Err(Error::Query(_))));
        assert!(fetch(&store, Entity::Team, a).is_some());
        assert!(store.is_connected());
    }

    #[test]
    fn test_delete_player_is_soft() {
        let store = SqliteStore::open_in_memory().unwrap();
        let team = seed_team(&store, "Vitality");
        let player = seed_player(&store, team, "ZywOo", true);

        let guard = IntegrityGuard::new(&store);
        assert!(matches!(guard.delete_player(player).unwrap(), Deletion::Deactivated { .. }));
        assert_eq!(fetch(&store, Entity::Player, player).unwrap().get_bool("is_active"), Some(false));
    }

    #[test]
    fn test_record_match_result() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = seed_team(&store, "FaZe");
        let b = seed_team(&store, "NAVI");
        let m = seed_match(&store, a, b);
        let guard = IntegrityGuard::new(&store);

        assert_eq!(guard.record_match_result(m, 16, 10).unwrap(), MatchOutcome::Team1);
        let row = fetch(&store, Entity::Match, m).unwrap();
        assert_eq!(row.get_i64("winner_team_id"), Some(a));
        assert_eq!(row.get_i64("score_team1"), Some(16));

        assert_eq!(guard.record_match_result(m, 10, 10).unwrap(), MatchOutcome::Draw);
        let row = fetch(&store, Entity::Match, m).unwrap();
        assert_eq!(row.get("winner_team_id"), Some(&Value::Null));

        assert_eq!(guard.record_match_result(m, 9, 13).unwrap(), MatchOutcome::Team2);
        assert_eq!(fetch(&store, Entity::Match, m).unwrap().get_i64("winner_team_id"), Some(b));

        assert!(matches!(
            guard.record_match_result(999, 1, 0),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_match_update_winner_checked_against_stored_teams() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = seed_team(&store, "MOUZ");
        let b = seed_team(&store, "Falcons");
        let c = seed_team(&store, "Astralis");
        let m = seed_match(&store, a, b);
        let guard = IntegrityGuard::new(&store);

        let bad = FieldMap::new().with("winner_team_id", c);
        assert!(matches!(guard.check_update(Entity::Match, m, &bad), Err(Error::InvalidMatch(_))));

        let good = FieldMap::new().with("winner_team_id", b);
        assert!(guard.check_update(Entity::Match, m, &good).is_ok());

        let before = store.statements_issued();
        let untouched = FieldMap::new().with("stage", "Grand Final");
        assert!(guard.check_update(Entity::Match, m, &untouched).is_ok());
        assert_eq!(store.statements_issued(), before);
    }
}
