//! esportdb CLI - E-sport organisation records from the command line

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use esportdb::cache::PickListCache;
use esportdb::config;
use esportdb::transfer::Format;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "esportdb")]
#[command(version)]
#[command(about = "E-sport organisation records - accounts, teams, players, tournaments and matches")]
#[command(long_about = r#"
esportdb keeps the records of an e-sport organisation in one SQLite file:
  • Teams and their player rosters (soft-deleted, never lost)
  • Tournaments with tier, status and prize pool
  • Matches, results and per-team statistics
  • JSON / CSV export and import

Example usage:
  esportdb init
  esportdb add team team_name="Natus Vincere" abbreviation=NAVI country=Ukraine
  esportdb add match tournament_id=1 team1_id=1 team2_id=2 match_date="2024-06-09 18:00"
  esportdb result 1 16 10
  esportdb tournaments --tier s --status completed
  esportdb export --format csv
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file (default: esportdb.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Format::Json,
            FormatArg::Csv => Format::Csv,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default esportdb.toml and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List rows of an entity (account, team, player, tournament, match)
    List {
        entity: String,

        /// Include deactivated teams and players
        #[arg(short, long)]
        all: bool,
    },

    /// Show one row by id
    Show { entity: String, id: i64 },

    /// Create a row from column=value pairs
    Add {
        entity: String,

        /// column=value pairs; unknown columns are ignored
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Change some columns of a row
    Update {
        entity: String,
        id: i64,

        /// column=value pairs; use column= to clear a value
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Delete a row (teams with active players and players are deactivated)
    Delete { entity: String, id: i64 },

    /// Free-text search over an entity's text columns
    Search { entity: String, term: String },

    /// Search tournaments by name/location, tier and status
    Tournaments {
        /// Matches name or location
        #[arg(short, long)]
        term: Option<String>,

        /// S, A, B or C
        #[arg(long)]
        tier: Option<String>,

        /// Upcoming, Ongoing, Completed or Cancelled
        #[arg(short, long)]
        status: Option<String>,

        /// Only upcoming tournaments, soonest first
        #[arg(short, long, conflicts_with_all = ["term", "tier", "status"])]
        upcoming: bool,
    },

    /// Active roster of a team
    Roster { team_id: i64 },

    /// Player count, matches and wins of one team, or all teams ranked by wins
    TeamStats { team_id: Option<i64> },

    /// List matches, optionally for one team or tournament
    Matches {
        #[arg(long, conflicts_with = "tournament")]
        team: Option<i64>,

        #[arg(long)]
        tournament: Option<i64>,
    },

    /// Record a match result; the winner follows from the scores
    Result {
        match_id: i64,
        score_team1: u32,
        score_team2: u32,
    },

    /// Export one entity, or every entity, to the export directory
    Export {
        entity: Option<String>,

        #[arg(short, long, value_enum, default_value = "json")]
        format: FormatArg,

        /// Target directory (overrides the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import rows into an entity from a JSON or CSV file
    Import {
        entity: String,

        /// File path; bare names are looked up in the import directory
        path: PathBuf,

        /// Format (default: from the file extension)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Row counts per table
    Stats,

    /// Show version information
    Version,
}

/// How results are printed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }
}

/// Print a `{"ok": true, "command": ..., "data": ...}` envelope in JSON mode
pub fn emit_success(mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let settings = config::load_config(Some(config_path.as_path()))?.unwrap_or_default();
    let database = settings.database_path(cli.database.as_deref());

    match cli.command {
        Commands::Init { force } => {
            return commands::run_init(mode, &config_path, &database, force);
        }
        Commands::Version => return commands::run_version(mode),
        _ => {}
    }

    // Connection failure is the one fatal error: nothing else can run
    let ctx = commands::Context::connect(mode, settings, database)?;
    let cache = PickListCache::new(ctx.repo());

    let outcome = match cli.command {
        Commands::List { entity, all } => commands::run_list(&ctx, &entity, all),
        Commands::Show { entity, id } => commands::run_show(&ctx, &entity, id),
        Commands::Add { entity, fields } => commands::run_add(&ctx, &cache, &entity, &fields),
        Commands::Update { entity, id, fields } => commands::run_update(&ctx, &cache, &entity, id, &fields),
        Commands::Delete { entity, id } => commands::run_delete(&ctx, &cache, &entity, id),
        Commands::Search { entity, term } => commands::run_search(&ctx, &entity, &term),
        Commands::Tournaments { term, tier, status, upcoming } => {
            commands::run_tournaments(&ctx, term.as_deref(), tier.as_deref(), status.as_deref(), upcoming)
        }
        Commands::Roster { team_id } => commands::run_roster(&ctx, team_id),
        Commands::TeamStats { team_id } => commands::run_team_stats(&ctx, &cache, team_id),
        Commands::Matches { team, tournament } => commands::run_matches(&ctx, &cache, team, tournament),
        Commands::Result { match_id, score_team1, score_team2 } => {
            commands::run_result(&ctx, &cache, match_id, score_team1, score_team2)
        }
        Commands::Export { entity, format, out } => {
            commands::run_export(&ctx, entity.as_deref(), format.into(), out)
        }
        Commands::Import { entity, path, format } => {
            commands::run_import(&ctx, &cache, &entity, &path, format.map(Into::into))
        }
        Commands::Stats => commands::run_stats(&ctx, &cache),
        Commands::Init { .. } | Commands::Version => Ok(()),
    };

    if let Err(e) = outcome {
        if e.downcast_ref::<esportdb::Error>().is_some_and(esportdb::Error::is_fatal) {
            return Err(e);
        }
        esportdb::ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
