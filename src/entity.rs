//! Entity table - the static description of every stored entity
//!
//! Each entity maps to one table with:
//! - a store-assigned integer primary key
//! - a fixed column list, each column carrying its kind and whether it may be
//!   written on insert and/or update
//! - the text columns used for free-text search
//! - an optional active flag (soft-deletable entities)
//!
//! The query builder only ever interpolates column names taken from these
//! tables, which is what keeps dynamic statements injection-safe.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The five managed entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Account,
    Team,
    Player,
    Tournament,
    Match,
}

impl Entity {
    /// Get the string representation of the entity
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Account => "account",
            Entity::Team => "team",
            Entity::Player => "player",
            Entity::Tournament => "tournament",
            Entity::Match => "match",
        }
    }

    /// Get all entities, in dependency order (referenced before referencing)
    pub fn all() -> &'static [Entity] {
        &[
            Entity::Account,
            Entity::Team,
            Entity::Player,
            Entity::Tournament,
            Entity::Match,
        ]
    }

    /// Static column table for this entity
    pub fn spec(&self) -> &'static EntitySpec {
        match self {
            Entity::Account => &ACCOUNTS,
            Entity::Team => &TEAMS,
            Entity::Player => &PLAYERS,
            Entity::Tournament => &TOURNAMENTS,
            Entity::Match => &MATCHES,
        }
    }

    pub fn table(&self) -> &'static str {
        self.spec().table
    }
}

impl FromStr for Entity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "account" | "accounts" | "user" | "users" => Ok(Entity::Account),
            "team" | "teams" => Ok(Entity::Team),
            "player" | "players" => Ok(Entity::Player),
            "tournament" | "tournaments" => Ok(Entity::Tournament),
            "match" | "matches" => Ok(Entity::Match),
            _ => Err(Error::UnknownEntity(s.to_string())),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store-native kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Integer values, including primary and foreign keys
    Integer,
    Text,
    /// Stored as 0/1
    Bool,
    /// Stored as `YYYY-MM-DD`
    Date,
    /// Stored as `YYYY-MM-DD HH:MM:SS`
    DateTime,
    /// Fixed-point, stored as decimal text with two minor digits
    Decimal,
    /// Text restricted to a closed set of values
    Choice(&'static ChoiceSet),
}

/// Closed set of stored names plus the parser for every accepted spelling
pub struct ChoiceSet {
    pub names: &'static [&'static str],
    parse: fn(&str) -> Result<&'static str>,
}

impl ChoiceSet {
    /// Stored name for `text`, accepting the same forms as the enum's `FromStr`
    pub fn canonical(&self, text: &str) -> Result<&'static str> {
        (self.parse)(text)
    }
}

impl PartialEq for ChoiceSet {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}

impl Eq for ChoiceSet {}

impl std::fmt::Debug for ChoiceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names).finish()
    }
}

/// One column of an entity table
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub insertable: bool,
    pub updatable: bool,
}

impl Column {
    /// Writable on both insert and update
    const fn writable(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, insertable: true, updatable: true }
    }

    /// Assigned by the store, never written
    const fn read_only(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, insertable: false, updatable: false }
    }

    const fn insert_only(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, insertable: true, updatable: false }
    }

    const fn update_only(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, insertable: false, updatable: true }
    }
}

/// Static description of an entity's table
#[derive(Debug)]
pub struct EntitySpec {
    pub entity: Entity,
    pub table: &'static str,
    pub primary_key: &'static str,
    /// All columns in projection order, primary key first
    pub columns: &'static [Column],
    /// Text columns searched by the unstructured multi-field search
    pub search_columns: &'static [&'static str],
    pub default_order: &'static str,
    /// Column holding the active flag for soft-deletable entities
    pub active_flag: Option<&'static str>,
    /// Column used as the human label in pick-lists
    pub label_column: &'static str,
}

impl EntitySpec {
    /// Look up any column by name
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column that may be written on insert
    pub fn insertable(&self, name: &str) -> Option<&'static Column> {
        self.column(name).filter(|c| c.insertable)
    }

    /// Look up a column that may be written on update
    pub fn updatable(&self, name: &str) -> Option<&'static Column> {
        self.column(name).filter(|c| c.updatable)
    }

    /// Comma separated projection of every column
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_soft_deletable(&self) -> bool {
        self.active_flag.is_some()
    }
}

impl PartialEq for EntitySpec {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

// ========== Closed value sets ==========

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountRole {
    Admin,
    Manager,
    Viewer,
}

impl AccountRole {
    pub const NAMES: &'static [&'static str] = &["Admin", "Manager", "Viewer"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Admin => "Admin",
            AccountRole::Manager => "Manager",
            AccountRole::Viewer => "Viewer",
        }
    }
}

impl FromStr for AccountRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(AccountRole::Admin),
            "manager" => Ok(AccountRole::Manager),
            "viewer" => Ok(AccountRole::Viewer),
            _ => Err(Error::Validation(format!("Unknown account role: {}", s))),
        }
    }
}

/// In-game role of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerRole {
    Igl,
    Awper,
    EntryFragger,
    Support,
    Lurker,
    Rifler,
}

impl PlayerRole {
    pub const NAMES: &'static [&'static str] =
        &["IGL", "AWPer", "Entry Fragger", "Support", "Lurker", "Rifler"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerRole::Igl => "IGL",
            PlayerRole::Awper => "AWPer",
            PlayerRole::EntryFragger => "Entry Fragger",
            PlayerRole::Support => "Support",
            PlayerRole::Lurker => "Lurker",
            PlayerRole::Rifler => "Rifler",
        }
    }
}

impl FromStr for PlayerRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], " ").as_str() {
            "igl" | "in game leader" => Ok(PlayerRole::Igl),
            "awper" | "awp" | "sniper" => Ok(PlayerRole::Awper),
            "entry fragger" | "entry" => Ok(PlayerRole::EntryFragger),
            "support" => Ok(PlayerRole::Support),
            "lurker" => Ok(PlayerRole::Lurker),
            "rifler" => Ok(PlayerRole::Rifler),
            _ => Err(Error::Validation(format!("Unknown player role: {}", s))),
        }
    }
}

/// Tournament tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
}

impl Tier {
    pub const NAMES: &'static [&'static str] = &["S-Tier", "A-Tier", "B-Tier", "C-Tier"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::S => "S-Tier",
            Tier::A => "A-Tier",
            Tier::B => "B-Tier",
            Tier::C => "C-Tier",
        }
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        match lower.strip_suffix("-tier").unwrap_or(&lower) {
            "s" => Ok(Tier::S),
            "a" => Ok(Tier::A),
            "b" => Ok(Tier::B),
            "c" => Ok(Tier::C),
            _ => Err(Error::Validation(format!("Unknown tier: {}", s))),
        }
    }
}

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TournamentStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub const NAMES: &'static [&'static str] = &["Upcoming", "Ongoing", "Completed", "Cancelled"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "Upcoming",
            TournamentStatus::Ongoing => "Ongoing",
            TournamentStatus::Completed => "Completed",
            TournamentStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for TournamentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(TournamentStatus::Upcoming),
            "ongoing" | "live" => Ok(TournamentStatus::Ongoing),
            "completed" | "finished" => Ok(TournamentStatus::Completed),
            "cancelled" | "canceled" => Ok(TournamentStatus::Cancelled),
            _ => Err(Error::Validation(format!("Unknown tournament status: {}", s))),
        }
    }
}

/// Series format of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchFormat {
    Bo1,
    Bo3,
    Bo5,
}

impl MatchFormat {
    pub const NAMES: &'static [&'static str] = &["BO1", "BO3", "BO5"];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchFormat::Bo1 => "BO1",
            MatchFormat::Bo3 => "BO3",
            MatchFormat::Bo5 => "BO5",
        }
    }
}

impl FromStr for MatchFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bo1" | "1" => Ok(MatchFormat::Bo1),
            "bo3" | "3" => Ok(MatchFormat::Bo3),
            "bo5" | "5" => Ok(MatchFormat::Bo5),
            _ => Err(Error::Validation(format!("Unknown match format: {}", s))),
        }
    }
}

macro_rules! closed_set {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl $ty {
            pub const CHOICES: ChoiceSet = ChoiceSet {
                names: <$ty>::NAMES,
                parse: |s| s.trim().parse::<$ty>().map(|v| v.as_str()),
            };
        })*
    };
}

closed_set!(AccountRole, PlayerRole, Tier, TournamentStatus, MatchFormat);

// ========== Entity tables ==========

use ColumnKind::*;

pub static ACCOUNTS: EntitySpec = EntitySpec {
    entity: Entity::Account,
    table: "users",
    primary_key: "user_id",
    columns: &[
        Column::read_only("user_id", Integer),
        Column::writable("username", Text),
        Column::writable("password_hash", Text),
        Column::writable("role", Choice(&AccountRole::CHOICES)),
        Column::writable("email", Text),
        Column::read_only("created_at", DateTime),
        Column::update_only("last_login", DateTime),
    ],
    search_columns: &["username", "email"],
    default_order: "user_id",
    active_flag: None,
    label_column: "username",
};

pub static TEAMS: EntitySpec = EntitySpec {
    entity: Entity::Team,
    table: "teams",
    primary_key: "team_id",
    columns: &[
        Column::read_only("team_id", Integer),
        Column::writable("team_name", Text),
        Column::writable("abbreviation", Text),
        Column::writable("country", Text),
        Column::writable("coach", Text),
        Column::writable("founded_date", Date),
        Column::writable("is_active", Bool),
    ],
    search_columns: &["team_name", "abbreviation", "country"],
    default_order: "team_name",
    active_flag: Some("is_active"),
    label_column: "team_name",
};

pub static PLAYERS: EntitySpec = EntitySpec {
    entity: Entity::Player,
    table: "players",
    primary_key: "player_id",
    columns: &[
        Column::read_only("player_id", Integer),
        Column::writable("team_id", Integer),
        Column::writable("nickname", Text),
        Column::writable("real_name", Text),
        Column::writable("nationality", Text),
        Column::writable("role", Choice(&PlayerRole::CHOICES)),
        Column::writable("birth_date", Date),
        Column::writable("is_active", Bool),
    ],
    search_columns: &["nickname", "real_name", "nationality"],
    default_order: "nickname",
    active_flag: Some("is_active"),
    label_column: "nickname",
};

pub static TOURNAMENTS: EntitySpec = EntitySpec {
    entity: Entity::Tournament,
    table: "tournaments",
    primary_key: "tournament_id",
    columns: &[
        Column::read_only("tournament_id", Integer),
        Column::writable("tournament_name", Text),
        Column::writable("location", Text),
        Column::writable("start_date", Date),
        Column::writable("end_date", Date),
        Column::writable("prize_pool", Decimal),
        Column::writable("tier", Choice(&Tier::CHOICES)),
        Column::writable("status", Choice(&TournamentStatus::CHOICES)),
    ],
    search_columns: &["tournament_name", "location"],
    default_order: "start_date DESC",
    active_flag: None,
    label_column: "tournament_name",
};

pub static MATCHES: EntitySpec = EntitySpec {
    entity: Entity::Match,
    table: "matches",
    primary_key: "match_id",
    columns: &[
        Column::read_only("match_id", Integer),
        Column::writable("tournament_id", Integer),
        Column::insert_only("team1_id", Integer),
        Column::insert_only("team2_id", Integer),
        Column::writable("score_team1", Integer),
        Column::writable("score_team2", Integer),
        Column::writable("match_date", DateTime),
        Column::writable("best_of", Choice(&MatchFormat::CHOICES)),
        Column::writable("stage", Text),
        Column::writable("winner_team_id", Integer),
    ],
    search_columns: &["stage"],
    default_order: "match_date DESC",
    active_flag: None,
    label_column: "stage",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_spec_starts_with_its_key() {
        for entity in Entity::all() {
            let spec = entity.spec();
            assert_eq!(spec.entity, *entity);
            assert_eq!(spec.columns[0].name, spec.primary_key);
            assert!(spec.insertable(spec.primary_key).is_none());
            assert!(spec.updatable(spec.primary_key).is_none());
        }
    }

    #[test]
    fn test_search_and_label_columns_exist() {
        for entity in Entity::all() {
            let spec = entity.spec();
            for col in spec.search_columns {
                assert!(spec.column(col).is_some(), "{} missing {}", spec.table, col);
            }
            assert!(spec.column(spec.label_column).is_some());
            if let Some(flag) = spec.active_flag {
                assert_eq!(spec.column(flag).map(|c| c.kind), Some(ColumnKind::Bool));
            }
        }
    }

    #[test]
    fn test_account_whitelists() {
        let spec = Entity::Account.spec();
        assert!(spec.insertable("created_at").is_none());
        assert!(spec.insertable("last_login").is_none());
        assert!(spec.updatable("last_login").is_some());
        assert!(spec.updatable("username").is_some());
        assert!(!spec.is_soft_deletable());
        assert!(Entity::Team.spec().is_soft_deletable());
        assert!(Entity::Player.spec().is_soft_deletable());
    }

    #[test]
    fn test_entity_parsing() {
        assert_eq!("USERS".parse::<Entity>().unwrap(), Entity::Account);
        assert_eq!("matches".parse::<Entity>().unwrap(), Entity::Match);
        assert!(matches!("games".parse::<Entity>(), Err(Error::UnknownEntity(_))));
    }

    #[test]
    fn test_closed_value_sets() {
        assert_eq!("s".parse::<Tier>().unwrap(), Tier::S);
        assert_eq!("B-Tier".parse::<Tier>().unwrap().as_str(), "B-Tier");
        assert_eq!("entry-fragger".parse::<PlayerRole>().unwrap(), PlayerRole::EntryFragger);
        assert_eq!("bo5".parse::<MatchFormat>().unwrap().to_string(), "BO5");
        assert_eq!("canceled".parse::<TournamentStatus>().unwrap(), TournamentStatus::Cancelled);
        assert!("Owner".parse::<AccountRole>().is_err());
    }

    #[test]
    fn test_choice_columns_accept_enum_spellings() {
        let tier = match Entity::Tournament.spec().column("tier").map(|c| c.kind) {
            Some(ColumnKind::Choice(set)) => set,
            other => panic!("tier is {:?}", other),
        };
        assert_eq!(tier.canonical("S").unwrap(), "S-Tier");
        assert_eq!(tier.canonical(" a-tier ").unwrap(), "A-Tier");
        assert!(tier.canonical("D").is_err());

        let best_of = Entity::Match.spec().column("best_of").unwrap();
        assert_eq!(best_of.kind, ColumnKind::Choice(&MatchFormat::CHOICES));
        assert_eq!(MatchFormat::CHOICES.canonical("3").unwrap(), "BO3");
        assert_eq!(PlayerRole::CHOICES.canonical("awp").unwrap(), "AWPer");
        assert_eq!(AccountRole::CHOICES.canonical("viewer").unwrap(), "Viewer");
    }
}
