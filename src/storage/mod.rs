//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - users(user_id, username, password_hash, role, email, created_at, last_login)
//! - teams(team_id, team_name, abbreviation, country, coach, founded_date, is_active)
//! - players(player_id, team_id, nickname, real_name, nationality, role, birth_date, is_active)
//! - tournaments(tournament_id, tournament_name, location, start_date, end_date, prize_pool, tier, status)
//! - matches(match_id, tournament_id, team1_id, team2_id, score_team1, score_team2, match_date, best_of, stage, winner_team_id)

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, SqliteStore, StoreTarget};
