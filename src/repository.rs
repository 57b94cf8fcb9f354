//! Entity repository - the public CRUD and search surface
//!
//! One generic implementation serves every entity. Column knowledge comes
//! from the static entity table; cross-entity rules are delegated to the
//! integrity guard.

use crate::entity::{Entity, Tier, TournamentStatus};
use crate::guard::{Deletion, IntegrityGuard, MatchOutcome};
use crate::query::{FilterSet, QueryBuilder};
use crate::storage::SqliteStore;
use crate::value::{FieldMap, Row};
use crate::{Error, Result};

/// Aggregate figures for one team
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStatistics {
    pub team: Row,
    pub active_players: usize,
    pub matches_played: usize,
    pub wins: usize,
}

impl TeamStatistics {
    /// Matches played that ended without this team winning (draws included)
    pub fn non_wins(&self) -> usize {
        self.matches_played.saturating_sub(self.wins)
    }

    /// Share of matches won, 0.0 when none were played
    pub fn win_rate(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.wins as f64 / self.matches_played as f64
        }
    }
}

/// Generic repository over one store
#[derive(Clone, Copy)]
pub struct Repository<'a> {
    store: &'a SqliteStore,
}

impl<'a> Repository<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a SqliteStore {
        self.store
    }

    fn guard(&self) -> IntegrityGuard<'a> {
        IntegrityGuard::new(self.store)
    }

    // ========== CRUD ==========

    /// Insert a row from the insertable subset of `fields`; returns the new id
    pub fn create(&self, entity: Entity, fields: &FieldMap) -> Result<i64> {
        self.guard().check_create(entity, fields)?;
        let stmt = QueryBuilder::for_entity(entity).insert(fields)?;
        let id = self.store.insert(&stmt)?;
        tracing::debug!("Created {} #{}", entity, id);
        Ok(id)
    }

    pub fn get_by_id(&self, entity: Entity, id: i64) -> Result<Option<Row>> {
        self.store
            .fetch_one(&QueryBuilder::for_entity(entity).select_by_id(id))
    }

    /// List rows matching `filters`.
    ///
    /// Soft-deletable entities only list active rows unless the filter set
    /// asks for inactive ones too.
    pub fn get_all(&self, entity: Entity, filters: &FilterSet) -> Result<Vec<Row>> {
        self.list(entity, filters, None)
    }

    /// Like `get_all`, but every row is decoded on its own: a stored value
    /// that no longer fits its column costs that row only
    pub fn scan(&self, entity: Entity, filters: &FilterSet) -> Result<Vec<Result<Row>>> {
        let builder = QueryBuilder::for_entity(entity);
        let predicate = active_scope(entity, filters).build(builder.spec())?;
        self.store.fetch_each(&builder.select(predicate, None))
    }

    fn list(&self, entity: Entity, filters: &FilterSet, order: Option<&'static str>) -> Result<Vec<Row>> {
        let builder = QueryBuilder::for_entity(entity);
        let predicate = active_scope(entity, filters).build(builder.spec())?;
        self.store.fetch_all(&builder.select(predicate, order))
    }

    /// Apply the updatable subset of `fields` to one row
    pub fn update(&self, entity: Entity, id: i64, fields: &FieldMap) -> Result<()> {
        let stmt = QueryBuilder::for_entity(entity).update(id, fields)?;
        self.guard().check_update(entity, id, fields)?;
        if self.store.execute(&stmt)? == 0 {
            return Err(Error::NotFound { entity, id });
        }
        tracing::debug!("Updated {} #{}", entity, id);
        Ok(())
    }

    /// Delete one row, following the guard's policy for teams and players
    pub fn delete(&self, entity: Entity, id: i64) -> Result<Deletion> {
        match entity {
            Entity::Team => self.guard().delete_team(id),
            Entity::Player => self.guard().delete_player(id),
            _ => {
                let stmt = QueryBuilder::for_entity(entity).delete(id);
                if self.store.execute(&stmt)? == 0 {
                    return Err(Error::NotFound { entity, id });
                }
                Ok(Deletion::Removed)
            }
        }
    }

    // ========== Search ==========

    /// Free-text search over the entity's search columns, inactive rows included
    pub fn search(&self, entity: Entity, term: &str) -> Result<Vec<Row>> {
        let spec = entity.spec();
        let filters = FilterSet::new()
            .any_like(spec.search_columns, Some(term))
            .include_inactive(true);
        self.get_all(entity, &filters)
    }

    /// Tournaments by optional name/location term, tier and status
    pub fn search_tournaments(
        &self,
        term: Option<&str>,
        tier: Option<Tier>,
        status: Option<TournamentStatus>,
    ) -> Result<Vec<Row>> {
        let filters = FilterSet::new()
            .any_like(Entity::Tournament.spec().search_columns, term)
            .eq("tier", tier.map(|t| t.as_str()))
            .eq("status", status.map(|s| s.as_str()));
        self.get_all(Entity::Tournament, &filters)
    }

    /// Upcoming tournaments, soonest first
    pub fn upcoming_tournaments(&self) -> Result<Vec<Row>> {
        let filters = FilterSet::new().eq("status", Some(TournamentStatus::Upcoming.as_str()));
        self.list(Entity::Tournament, &filters, Some("start_date"))
    }

    // ========== Teams, players and matches ==========

    /// Active roster of a team, grouped by role
    pub fn players_by_team(&self, team_id: i64) -> Result<Vec<Row>> {
        let filters = FilterSet::new().eq("team_id", Some(team_id));
        self.list(Entity::Player, &filters, Some("role, nickname"))
    }

    /// Every match the team took part in, newest first
    pub fn matches_by_team(&self, team_id: i64) -> Result<Vec<Row>> {
        let filters = FilterSet::new().any_eq(&["team1_id", "team2_id"], Some(team_id));
        self.get_all(Entity::Match, &filters)
    }

    pub fn matches_by_tournament(&self, tournament_id: i64) -> Result<Vec<Row>> {
        let filters = FilterSet::new().eq("tournament_id", Some(tournament_id));
        self.list(Entity::Match, &filters, Some("match_date"))
    }

    pub fn record_match_result(&self, id: i64, score_team1: u32, score_team2: u32) -> Result<MatchOutcome> {
        self.guard().record_match_result(id, score_team1, score_team2)
    }

    pub fn team_statistics(&self, team_id: i64) -> Result<TeamStatistics> {
        let team = self
            .get_by_id(Entity::Team, team_id)?
            .ok_or(Error::NotFound { entity: Entity::Team, id: team_id })?;

        let players = QueryBuilder::for_entity(Entity::Player);
        let roster = FilterSet::new()
            .eq("team_id", Some(team_id))
            .eq("is_active", Some(true))
            .build(players.spec())?;

        let matches = QueryBuilder::for_entity(Entity::Match);
        let played = FilterSet::new()
            .any_eq(&["team1_id", "team2_id"], Some(team_id))
            .build(matches.spec())?;
        let won = FilterSet::new()
            .eq("winner_team_id", Some(team_id))
            .build(matches.spec())?;

        Ok(TeamStatistics {
            team,
            active_players: self.store.fetch_scalar(&players.count(roster))? as usize,
            matches_played: self.store.fetch_scalar(&matches.count(played))? as usize,
            wins: self.store.fetch_scalar(&matches.count(won))? as usize,
        })
    }

    /// Count rows matching `filters` under the same active-row rule as `get_all`
    pub fn count(&self, entity: Entity, filters: &FilterSet) -> Result<usize> {
        let builder = QueryBuilder::for_entity(entity);
        let predicate = active_scope(entity, filters).build(builder.spec())?;
        Ok(self.store.fetch_scalar(&builder.count(predicate))? as usize)
    }
}

/// Add the active-row condition unless inactive rows were asked for
fn active_scope(entity: Entity, filters: &FilterSet) -> FilterSet {
    match entity.spec().active_flag {
        Some(flag) if !filters.includes_inactive() => filters.clone().eq(flag, Some(true)),
        _ => filters.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Statement;
    use crate::value::Value;

    struct Fixture {
        store: SqliteStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: SqliteStore::open_in_memory().unwrap(),
            }
        }

        fn repo(&self) -> Repository<'_> {
            Repository::new(&self.store)
        }

        fn team(&self, name: &str) -> i64 {
            self.repo()
                .create(Entity::Team, &FieldMap::new().with("team_name", name))
                .unwrap()
        }

        fn tournament(&self, name: &str, tier: &str, status: &str, start: &str) -> i64 {
            self.repo()
                .create(
                    Entity::Tournament,
                    &FieldMap::new()
                        .with("tournament_name", name)
                        .with("tier", tier)
                        .with("status", status)
                        .with("start_date", start)
                        .with("end_date", start),
                )
                .unwrap()
        }

        fn game(&self, tournament: i64, team1: i64, team2: i64, date: &str) -> i64 {
            self.repo()
                .create(
                    Entity::Match,
                    &FieldMap::new()
                        .with("tournament_id", tournament)
                        .with("team1_id", team1)
                        .with("team2_id", team2)
                        .with("match_date", date),
                )
                .unwrap()
        }
    }

    #[test]
    fn test_create_and_get() {
        let fx = Fixture::new();
        let id = fx
            .repo()
            .create(
                Entity::Team,
                &FieldMap::new()
                    .with("team_name", "Ninjas in Pyjamas")
                    .with("abbreviation", "NIP")
                    .with("team_id", 77i64),
            )
            .unwrap();

        assert_ne!(id, 77);
        let row = fx.repo().get_by_id(Entity::Team, id).unwrap().unwrap();
        assert_eq!(row.get_str("abbreviation"), Some("NIP"));
        assert!(fx.repo().get_by_id(Entity::Team, id + 100).unwrap().is_none());
    }

    #[test]
    fn test_mistyped_values_never_reach_the_store() {
        let fx = Fixture::new();
        let repo = fx.repo();
        let good = fx.team("Good");
        let before = fx.store.statements_issued();

        let err = repo
            .create(
                Entity::Team,
                &FieldMap::new().with("team_name", "Bad").with("founded_date", "17.03.2009"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Serialization { ref column, .. } if column == "founded_date"));

        let err = repo
            .update(Entity::Team, good, &FieldMap::new().with("founded_date", Value::Bool(true)))
            .unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
        assert_eq!(fx.store.statements_issued(), before);

        // Well-formed text is stored in its typed form
        repo.update(Entity::Team, good, &FieldMap::new().with("founded_date", "2009-03-17"))
            .unwrap();
        let teams = repo.get_all(Entity::Team, &FilterSet::new()).unwrap();
        assert_eq!(teams.len(), 1);
        assert!(matches!(teams[0].get("founded_date"), Some(Value::Date(_))));
    }

    #[test]
    fn test_scan_isolates_undecodable_rows() {
        let fx = Fixture::new();
        fx.team("Good");
        // Written behind the repository's back, as an older tool might have
        fx.store
            .execute(&Statement::new(
                "INSERT INTO teams (team_name, founded_date) VALUES (?, ?)",
                vec![Value::Text("Bad".into()), Value::Text("17.03.2009".into())],
            ))
            .unwrap();

        assert!(fx.repo().get_all(Entity::Team, &FilterSet::new()).is_err());

        let rows = fx.repo().scan(Entity::Team, &FilterSet::new()).unwrap();
        assert_eq!(rows.len(), 2);
        let good: Vec<_> = rows.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(good.len(), 1);
        assert_eq!(good[0].get_str("team_name"), Some("Good"));
    }

    #[test]
    fn test_self_match_issues_zero_statements() {
        let fx = Fixture::new();
        let team = fx.team("Heroic");
        let before = fx.store.statements_issued();

        let err = fx
            .repo()
            .create(
                Entity::Match,
                &FieldMap::new()
                    .with("tournament_id", 1i64)
                    .with("team1_id", team)
                    .with("team2_id", team)
                    .with("match_date", "2024-01-01 12:00:00"),
            )
            .unwrap_err();

        assert!(matches!(err, Error::InvalidMatch(_)));
        assert!(err.is_rejected_early());
        assert_eq!(fx.store.statements_issued(), before);
    }

    #[test]
    fn test_update_partial_and_unknown_fields() {
        let fx = Fixture::new();
        let id = fx.team("BIG");
        let repo = fx.repo();

        repo.update(
            Entity::Team,
            id,
            &FieldMap::new().with("coach", "tabseN").with("not_a_column", 1i64),
        )
        .unwrap();
        let row = repo.get_by_id(Entity::Team, id).unwrap().unwrap();
        assert_eq!(row.get_str("coach"), Some("tabseN"));
        assert_eq!(row.get_str("team_name"), Some("BIG"));

        let before = fx.store.statements_issued();
        assert!(matches!(
            repo.update(Entity::Team, id, &FieldMap::new().with("team_id", 5i64)),
            Err(Error::NoUpdatableFields(Entity::Team))
        ));
        assert_eq!(fx.store.statements_issued(), before);

        assert!(matches!(
            repo.update(Entity::Team, 999, &FieldMap::new().with("coach", "x")),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_username_is_recoverable() {
        let fx = Fixture::new();
        let repo = fx.repo();
        let account = FieldMap::new()
            .with("username", "admin")
            .with("password_hash", "x")
            .with("role", "Admin");

        repo.create(Entity::Account, &account).unwrap();
        let err = repo.create(Entity::Account, &account).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
        assert!(!err.is_fatal());
        assert_eq!(repo.get_all(Entity::Account, &FilterSet::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_team_delete_policy() {
        let fx = Fixture::new();
        let repo = fx.repo();
        let kept = fx.team("G2");
        let gone = fx.team("OG");
        repo.create(
            Entity::Player,
            &FieldMap::new().with("nickname", "m0NESY").with("team_id", kept),
        )
        .unwrap();

        assert!(matches!(repo.delete(Entity::Team, kept).unwrap(), Deletion::Deactivated { active_players: 1 }));
        assert_eq!(repo.delete(Entity::Team, gone).unwrap(), Deletion::Removed);

        let still_there = repo.get_by_id(Entity::Team, kept).unwrap().unwrap();
        assert_eq!(still_there.get_bool("is_active"), Some(false));
        assert!(repo.get_by_id(Entity::Team, gone).unwrap().is_none());

        // Deactivated teams drop out of default listings only
        assert!(repo.get_all(Entity::Team, &FilterSet::new()).unwrap().is_empty());
        let everything = FilterSet::new().include_inactive(true);
        assert_eq!(repo.get_all(Entity::Team, &everything).unwrap().len(), 1);
        assert_eq!(repo.count(Entity::Team, &FilterSet::new()).unwrap(), 0);
        assert_eq!(repo.count(Entity::Team, &everything).unwrap(), 1);
    }

    #[test]
    fn test_hard_delete_cascades_tournament_matches() {
        let fx = Fixture::new();
        let repo = fx.repo();
        let a = fx.team("Liquid");
        let b = fx.team("Cloud9");
        let t = fx.tournament("BLAST Premier", "A-Tier", "Completed", "2024-02-01");
        fx.game(t, a, b, "2024-02-02 15:00:00");

        assert_eq!(repo.delete(Entity::Tournament, t).unwrap(), Deletion::Removed);
        assert!(repo.get_all(Entity::Match, &FilterSet::new()).unwrap().is_empty());
        assert!(matches!(repo.delete(Entity::Tournament, t), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_search_tournaments_filters() {
        let fx = Fixture::new();
        fx.tournament("PGL Major Copenhagen", "S-Tier", "Completed", "2024-03-17");
        fx.tournament("IEM Katowice", "S-Tier", "Completed", "2024-01-31");
        fx.tournament("ESL Challenger Melbourne", "A-Tier", "Upcoming", "2024-04-26");
        fx.tournament("CCT Europe", "C-Tier", "Ongoing", "2024-04-01");
        let repo = fx.repo();

        assert_eq!(repo.search_tournaments(None, None, None).unwrap().len(), 4);

        let s_tier = repo.search_tournaments(None, Some(Tier::S), None).unwrap();
        assert_eq!(s_tier.len(), 2);
        assert!(s_tier.iter().all(|r| r.get_str("tier") == Some("S-Tier")));

        let combined = repo
            .search_tournaments(Some("major"), Some(Tier::S), Some(TournamentStatus::Completed))
            .unwrap();
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].get_str("tournament_name"), Some("PGL Major Copenhagen"));

        let by_location_or_name = repo.search_tournaments(Some("melbourne"), None, None).unwrap();
        assert_eq!(by_location_or_name.len(), 1);

        let upcoming = repo.upcoming_tournaments().unwrap();
        assert_eq!(upcoming.len(), 1);
    }

    #[test]
    fn test_tournament_end_before_start_rejected() {
        let fx = Fixture::new();
        let err = fx
            .repo()
            .create(
                Entity::Tournament,
                &FieldMap::new()
                    .with("tournament_name", "Backwards Cup")
                    .with("start_date", "2024-05-10")
                    .with("end_date", "2024-05-01"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_free_text_search_includes_inactive() {
        let fx = Fixture::new();
        let repo = fx.repo();
        let team = fx.team("FURIA");
        repo.create(
            Entity::Player,
            &FieldMap::new().with("nickname", "KSCERATO").with("nationality", "Brazil").with("team_id", team),
        )
        .unwrap();
        let benched = repo
            .create(
                Entity::Player,
                &FieldMap::new().with("nickname", "arT").with("nationality", "Brazil"),
            )
            .unwrap();
        repo.delete(Entity::Player, benched).unwrap();

        assert_eq!(repo.search(Entity::Player, "brazil").unwrap().len(), 2);
        assert_eq!(repo.get_all(Entity::Player, &FilterSet::new()).unwrap().len(), 1);
        assert_eq!(repo.search(Entity::Team, "FUR").unwrap().len(), 1);
    }

    #[test]
    fn test_roster_and_statistics() {
        let fx = Fixture::new();
        let repo = fx.repo();
        let a = fx.team("NAVI");
        let b = fx.team("Vitality");
        for (nick, role) in [("b1t", "Rifler"), ("Aleksib", "IGL"), ("jL", "Entry Fragger")] {
            repo.create(
                Entity::Player,
                &FieldMap::new().with("nickname", nick).with("role", role).with("team_id", a),
            )
            .unwrap();
        }

        let roster = repo.players_by_team(a).unwrap();
        let nicks: Vec<_> = roster.iter().filter_map(|r| r.get_str("nickname")).collect();
        assert_eq!(nicks, vec!["jL", "Aleksib", "b1t"]);

        let t = fx.tournament("Major", "S-Tier", "Ongoing", "2024-06-01");
        let m1 = fx.game(t, a, b, "2024-06-02 12:00:00");
        let m2 = fx.game(t, b, a, "2024-06-03 12:00:00");
        fx.game(t, a, b, "2024-06-04 12:00:00");

        assert_eq!(repo.record_match_result(m1, 16, 10).unwrap(), MatchOutcome::Team1);
        assert_eq!(repo.record_match_result(m2, 10, 10).unwrap(), MatchOutcome::Draw);

        let stats = repo.team_statistics(a).unwrap();
        assert_eq!(stats.active_players, 3);
        assert_eq!(stats.matches_played, 3);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.non_wins(), 2);

        let matches = repo.matches_by_team(b).unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].get("match_date"), repo.get_by_id(Entity::Match, 3).unwrap().unwrap().get("match_date"));
        assert_eq!(repo.matches_by_tournament(t).unwrap()[0].get_i64("match_id"), Some(m1));

        let none = repo.get_by_id(Entity::Match, m2).unwrap().unwrap();
        assert_eq!(none.get("winner_team_id"), Some(&Value::Null));

        assert!(matches!(repo.team_statistics(999), Err(Error::NotFound { .. })));
    }
}
