//! Database schema definitions

/// SQL to create the users table
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'Viewer' CHECK (role IN ('Admin', 'Manager', 'Viewer')),
    email TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_login TEXT
)
"#;

/// SQL to create the teams table
pub const CREATE_TEAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    team_id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_name TEXT NOT NULL,
    abbreviation TEXT,
    country TEXT,
    coach TEXT,
    founded_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
)
"#;

/// SQL to create the players table
pub const CREATE_PLAYERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    player_id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id INTEGER REFERENCES teams(team_id) ON DELETE SET NULL,
    nickname TEXT NOT NULL,
    real_name TEXT,
    nationality TEXT,
    role TEXT CHECK (role IS NULL OR role IN ('IGL', 'AWPer', 'Entry Fragger', 'Support', 'Lurker', 'Rifler')),
    birth_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
)
"#;

/// SQL to create the tournaments table
///
/// `prize_pool` is decimal text so the fixed-point value survives exactly.
pub const CREATE_TOURNAMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tournaments (
    tournament_id INTEGER PRIMARY KEY AUTOINCREMENT,
    tournament_name TEXT NOT NULL,
    location TEXT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    prize_pool TEXT,
    tier TEXT NOT NULL DEFAULT 'B-Tier' CHECK (tier IN ('S-Tier', 'A-Tier', 'B-Tier', 'C-Tier')),
    status TEXT NOT NULL DEFAULT 'Upcoming' CHECK (status IN ('Upcoming', 'Ongoing', 'Completed', 'Cancelled'))
)
"#;

/// SQL to create the matches table
pub const CREATE_MATCHES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS matches (
    match_id INTEGER PRIMARY KEY AUTOINCREMENT,
    tournament_id INTEGER NOT NULL REFERENCES tournaments(tournament_id) ON DELETE CASCADE,
    team1_id INTEGER NOT NULL REFERENCES teams(team_id),
    team2_id INTEGER NOT NULL REFERENCES teams(team_id),
    score_team1 INTEGER NOT NULL DEFAULT 0 CHECK (score_team1 >= 0),
    score_team2 INTEGER NOT NULL DEFAULT 0 CHECK (score_team2 >= 0),
    match_date TEXT NOT NULL,
    best_of TEXT NOT NULL DEFAULT 'BO3' CHECK (best_of IN ('BO1', 'BO3', 'BO5')),
    stage TEXT,
    winner_team_id INTEGER REFERENCES teams(team_id),
    CHECK (team1_id <> team2_id),
    CHECK (winner_team_id IS NULL OR winner_team_id IN (team1_id, team2_id))
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_teams_name ON teams(team_name)",
    "CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id)",
    "CREATE INDEX IF NOT EXISTS idx_players_nickname ON players(nickname)",
    "CREATE INDEX IF NOT EXISTS idx_tournaments_start ON tournaments(start_date)",
    "CREATE INDEX IF NOT EXISTS idx_matches_tournament ON matches(tournament_id)",
    "CREATE INDEX IF NOT EXISTS idx_matches_team1 ON matches(team1_id)",
    "CREATE INDEX IF NOT EXISTS idx_matches_team2 ON matches(team2_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_USERS_TABLE,
        CREATE_TEAMS_TABLE,
        CREATE_PLAYERS_TABLE,
        CREATE_TOURNAMENTS_TABLE,
        CREATE_MATCHES_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
