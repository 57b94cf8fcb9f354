use crate::{OutputMode, emit_success};
use esportdb::cache::PickListCache;
use esportdb::config::{self, EsportConfig};
use esportdb::entity::{Tier, TournamentStatus};
use esportdb::repository::TeamStatistics;
use esportdb::serializer;
use esportdb::transfer::{ExportOutcome, Exporter, Format, Importer};
use esportdb::ui::{self, Icons, RowProgress, Spinner};
use esportdb::{Entity, Error, FieldMap, FilterSet, Repository, Row, SqliteStore};
use owo_colors::OwoColorize;
use serde_json::{Value as Json, json};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Teams shown by `stats`
const TOP_TEAMS: usize = 5;

/// Everything a handler needs once the store is open
pub struct Context {
    pub mode: OutputMode,
    pub config: EsportConfig,
    pub store: SqliteStore,
}

impl Context {
    pub fn connect(mode: OutputMode, config: EsportConfig, database: PathBuf) -> anyhow::Result<Self> {
        config::ensure_db_dir(&database)?;
        let store = SqliteStore::open(&database)?;
        tracing::debug!("Connected to {}", store.target());
        Ok(Self { mode, config, store })
    }

    pub fn repo(&self) -> Repository<'_> {
        Repository::new(&self.store)
    }
}

fn parse_entity(name: &str) -> anyhow::Result<Entity> {
    Ok(name.parse::<Entity>()?)
}

/// Columns never printed in tables
fn hidden_columns(entity: Entity) -> &'static [&'static str] {
    match entity {
        Entity::Account => &["password_hash"],
        _ => &[],
    }
}

/// Turn `column=value` arguments into typed fields.
///
/// Unknown columns are reported and left out; values are decoded the same
/// way as imported CSV cells, so `column=` clears a value.
fn parse_fields(entity: Entity, args: &[String]) -> anyhow::Result<FieldMap> {
    let spec = entity.spec();
    let mut fields = FieldMap::new();

    for arg in args {
        let Some((key, raw)) = arg.split_once('=') else {
            anyhow::bail!("Expected column=value, got '{}'", arg);
        };
        let key = key.trim();
        let Some(column) = spec.column(key) else {
            ui::warn(&format!("Ignoring unknown {} column '{}'", entity, key));
            continue;
        };
        fields.insert(column.name, serializer::from_text(column, raw)?);
    }

    Ok(fields)
}

fn rows_json(rows: &[Row]) -> anyhow::Result<Json> {
    let objects = rows
        .iter()
        .map(|row| serializer::row_to_object(row).map(Json::Object))
        .collect::<esportdb::Result<Vec<_>>>()?;
    Ok(Json::Array(objects))
}

fn print_rows(ctx: &Context, command: &str, entity: Entity, rows: &[Row]) -> anyhow::Result<()> {
    if ctx.mode.is_human() {
        if rows.is_empty() {
            ui::info(entity.table(), "no rows");
            return Ok(());
        }
        ui::block(&ui::rows_table(entity.spec(), rows, hidden_columns(entity)));
        ui::summary_row("Rows:", &rows.len().to_string());
    } else {
        let data = json!({
            "entity": entity.as_str(),
            "rows": rows_json(rows)?,
        });
        emit_success(ctx.mode, command, data)?;
    }
    Ok(())
}

/// Label of a team or tournament, falling back to its id
fn label_of(cache: &PickListCache<'_>, entity: Entity, id: Option<i64>) -> anyhow::Result<String> {
    let Some(id) = id else {
        return Ok("-".to_string());
    };
    Ok(cache.label(entity, id)?.unwrap_or_else(|| format!("#{}", id)))
}

// ========== Setup ==========

pub fn run_init(mode: OutputMode, config_path: &Path, database: &Path, force: bool) -> anyhow::Result<()> {
    let settings = EsportConfig::with_defaults();
    config::write_config(config_path, &settings, force)?;
    config::ensure_db_dir(database)?;

    let store = SqliteStore::open(database)?;
    drop(store);

    if mode.is_human() {
        ui::success(&format!("Wrote {}", config_path.display()));
        ui::status(Icons::DATABASE, "Database", &database.display().to_string());
        ui::status(Icons::EXPORT, "Export dir", &settings.export_dir(None).display().to_string());
        ui::status(Icons::IMPORT, "Import dir", &settings.import_dir(None).display().to_string());
    } else {
        let data = json!({
            "config": config_path.display().to_string(),
            "database": database.display().to_string(),
        });
        emit_success(mode, "init", data)?;
    }
    Ok(())
}

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        ui::banner(
            &format!("{}", "esportdb".bold().style(ui::theme().info.clone())),
            &format!("Version {}", env!("CARGO_PKG_VERSION").bold()),
        );
    } else {
        let data = json!({
            "version": env!("CARGO_PKG_VERSION"),
        });
        emit_success(output_mode, "version", data)?;
    }
    Ok(())
}

// ========== Generic CRUD ==========

pub fn run_list(ctx: &Context, entity: &str, all: bool) -> anyhow::Result<()> {
    let entity = parse_entity(entity)?;
    let repo = ctx.repo();
    let rows = repo.get_all(entity, &FilterSet::new().include_inactive(all))?;

    if !ctx.mode.is_human() {
        return print_rows(ctx, "list", entity, &rows);
    }

    ui::header(&format!("{} {}", Icons::for_entity(entity), entity.table()));
    print_rows(ctx, "list", entity, &rows)?;
    if !all && entity.spec().is_soft_deletable() {
        let hidden = repo
            .count(entity, &FilterSet::new().include_inactive(true))?
            .saturating_sub(rows.len());
        if hidden > 0 {
            ui::summary_row("Inactive:", &ui::dim(&format!("{} hidden, use --all to show", hidden)));
        }
    }
    Ok(())
}

pub fn run_show(ctx: &Context, entity: &str, id: i64) -> anyhow::Result<()> {
    let entity = parse_entity(entity)?;
    let row = ctx
        .repo()
        .get_by_id(entity, id)?
        .ok_or(Error::NotFound { entity, id })?;

    if ctx.mode.is_human() {
        ui::header(&format!("{} {} #{}", Icons::for_entity(entity), entity, id));
        ui::block(&ui::record_table(&row, hidden_columns(entity)));
    } else {
        let data = json!({
            "entity": entity.as_str(),
            "row": Json::Object(serializer::row_to_object(&row)?),
        });
        emit_success(ctx.mode, "show", data)?;
    }
    Ok(())
}

pub fn run_add(ctx: &Context, cache: &PickListCache<'_>, entity: &str, args: &[String]) -> anyhow::Result<()> {
    let entity = parse_entity(entity)?;
    let fields = parse_fields(entity, args)?;

    let repo = ctx.repo();
    let id = repo.create(entity, &fields)?;
    cache.invalidate();

    if ctx.mode.is_human() {
        ui::success(&format!("Created {} #{}", entity, id));
        if entity == Entity::Match {
            ui::summary_row(
                "Pairing:",
                &format!(
                    "{} vs {}",
                    label_of(cache, Entity::Team, fields.get_i64("team1_id"))?,
                    label_of(cache, Entity::Team, fields.get_i64("team2_id"))?
                ),
            );
        }
    } else {
        emit_success(ctx.mode, "add", json!({ "entity": entity.as_str(), "id": id }))?;
    }
    Ok(())
}

pub fn run_update(ctx: &Context, cache: &PickListCache<'_>, entity: &str, id: i64, args: &[String]) -> anyhow::Result<()> {
    let entity = parse_entity(entity)?;
    let fields = parse_fields(entity, args)?;

    let repo = ctx.repo();
    repo.update(entity, id, &fields)?;
    cache.invalidate();

    if ctx.mode.is_human() {
        let columns: Vec<&str> = fields.keys().collect();
        ui::success(&format!("Updated {} #{} ({})", entity, id, columns.join(", ")));
    } else {
        emit_success(ctx.mode, "update", json!({ "entity": entity.as_str(), "id": id }))?;
    }
    Ok(())
}

pub fn run_delete(ctx: &Context, cache: &PickListCache<'_>, entity: &str, id: i64) -> anyhow::Result<()> {
    let entity = parse_entity(entity)?;

    let repo = ctx.repo();
    let outcome = repo.delete(entity, id)?;
    cache.invalidate();

    if ctx.mode.is_human() {
        ui::deletion(&format!("{} #{}", entity, id), &outcome);
    } else {
        let data = json!({
            "entity": entity.as_str(),
            "id": id,
            "outcome": outcome.to_string(),
        });
        emit_success(ctx.mode, "delete", data)?;
    }
    Ok(())
}

// ========== Search ==========

pub fn run_search(ctx: &Context, entity: &str, term: &str) -> anyhow::Result<()> {
    let entity = parse_entity(entity)?;
    let rows = ctx.repo().search(entity, term)?;

    if ctx.mode.is_human() {
        ui::header(&format!("{} {} matching '{}'", Icons::SEARCH, entity.table(), term));
    }
    print_rows(ctx, "search", entity, &rows)
}

pub fn run_tournaments(
    ctx: &Context,
    term: Option<&str>,
    tier: Option<&str>,
    status: Option<&str>,
    upcoming: bool,
) -> anyhow::Result<()> {
    let repo = ctx.repo();
    let rows = if upcoming {
        repo.upcoming_tournaments()?
    } else {
        let tier = tier.map(str::parse::<Tier>).transpose()?;
        let status = status.map(str::parse::<TournamentStatus>).transpose()?;
        repo.search_tournaments(term, tier, status)?
    };

    if ctx.mode.is_human() {
        let title = if upcoming { "Upcoming tournaments" } else { "Tournaments" };
        ui::header(&format!("{} {}", Icons::CALENDAR, title));
    }
    print_rows(ctx, "tournaments", Entity::Tournament, &rows)
}

// ========== Teams and matches ==========

pub fn run_roster(ctx: &Context, team_id: i64) -> anyhow::Result<()> {
    let repo = ctx.repo();
    let team = repo
        .get_by_id(Entity::Team, team_id)?
        .ok_or(Error::NotFound { entity: Entity::Team, id: team_id })?;
    let players = repo.players_by_team(team_id)?;

    if ctx.mode.is_human() {
        let name = team.get_str("team_name").unwrap_or_default();
        ui::header(&format!("{} {} roster", Icons::TEAM, name));
    }
    print_rows(ctx, "roster", Entity::Player, &players)
}

fn stats_json(stats: &TeamStatistics) -> Json {
    json!({
        "team_id": stats.team.get_i64("team_id"),
        "team_name": stats.team.get_str("team_name"),
        "active_players": stats.active_players,
        "matches_played": stats.matches_played,
        "wins": stats.wins,
        "win_rate": stats.win_rate(),
    })
}

/// Statistics of every active team, most wins first
fn ranked_teams(repo: Repository<'_>, cache: &PickListCache<'_>) -> anyhow::Result<Vec<TeamStatistics>> {
    let mut ranking = cache
        .teams()?
        .iter()
        .map(|team| repo.team_statistics(team.id))
        .collect::<esportdb::Result<Vec<_>>>()?;
    ranking.sort_by(|a, b| b.wins.cmp(&a.wins).then(a.matches_played.cmp(&b.matches_played)));
    Ok(ranking)
}

fn ranking_table(ranking: &[TeamStatistics]) -> String {
    let rows = ranking
        .iter()
        .map(|s| {
            vec![
                s.team.get_i64("team_id").map(|id| id.to_string()).unwrap_or_default(),
                s.team.get_str("team_name").unwrap_or_default().to_string(),
                s.active_players.to_string(),
                s.matches_played.to_string(),
                s.wins.to_string(),
                format!("{:.0}%", s.win_rate() * 100.0),
            ]
        })
        .collect();
    ui::grid(&["id", "team", "players", "played", "wins", "win rate"], rows)
}

pub fn run_team_stats(ctx: &Context, cache: &PickListCache<'_>, team_id: Option<i64>) -> anyhow::Result<()> {
    let repo = ctx.repo();

    let Some(team_id) = team_id else {
        let ranking = ranked_teams(repo, cache)?;
        if ctx.mode.is_human() {
            ui::header(&format!("{} Team ranking", Icons::MEDAL));
            ui::block(&ranking_table(&ranking));
        } else {
            let data: Vec<Json> = ranking.iter().map(stats_json).collect();
            emit_success(ctx.mode, "team-stats", Json::Array(data))?;
        }
        return Ok(());
    };

    let stats = repo.team_statistics(team_id)?;
    if ctx.mode.is_human() {
        let name = stats.team.get_str("team_name").unwrap_or_default();
        ui::header(&format!("{} {}", Icons::STATS, name));
        ui::block(&ui::stats_table(&[
            ("Active players", &stats.active_players.to_string()),
            ("Matches played", &stats.matches_played.to_string()),
            ("Wins", &stats.wins.to_string()),
            ("Other results", &stats.non_wins().to_string()),
            ("Win rate", &format!("{:.1}%", stats.win_rate() * 100.0)),
        ]));
    } else {
        emit_success(ctx.mode, "team-stats", stats_json(&stats))?;
    }
    Ok(())
}

pub fn run_matches(
    ctx: &Context,
    cache: &PickListCache<'_>,
    team: Option<i64>,
    tournament: Option<i64>,
) -> anyhow::Result<()> {
    let repo = ctx.repo();
    let rows = match (team, tournament) {
        (Some(team_id), _) => repo.matches_by_team(team_id)?,
        (None, Some(tournament_id)) => repo.matches_by_tournament(tournament_id)?,
        (None, None) => repo.get_all(Entity::Match, &FilterSet::new())?,
    };

    if !ctx.mode.is_human() {
        return print_rows(ctx, "matches", Entity::Match, &rows);
    }

    ui::header(&format!("{} Matches", Icons::MATCH));
    let mut lines = Vec::with_capacity(rows.len());
    for row in &rows {
        let score = match (row.get_i64("score_team1"), row.get_i64("score_team2")) {
            (Some(a), Some(b)) => format!("{}:{}", a, b),
            _ => "-".to_string(),
        };
        let winner = match row.get_i64("winner_team_id") {
            Some(id) => ui::accent(&label_of(cache, Entity::Team, Some(id))?),
            None => ui::muted("-"),
        };
        lines.push(vec![
            row.get_i64("match_id").map(|id| id.to_string()).unwrap_or_default(),
            row.get("match_date").map(ToString::to_string).unwrap_or_default(),
            label_of(cache, Entity::Tournament, row.get_i64("tournament_id"))?,
            label_of(cache, Entity::Team, row.get_i64("team1_id"))?,
            score,
            label_of(cache, Entity::Team, row.get_i64("team2_id"))?,
            winner,
        ]);
    }

    if lines.is_empty() {
        ui::info("matches", "no rows");
    } else {
        ui::block(&ui::grid(
            &["id", "date", "tournament", "team 1", "score", "team 2", "winner"],
            lines,
        ));
    }
    Ok(())
}

pub fn run_result(
    ctx: &Context,
    cache: &PickListCache<'_>,
    match_id: i64,
    score_team1: u32,
    score_team2: u32,
) -> anyhow::Result<()> {
    let repo = ctx.repo();
    let outcome = repo.record_match_result(match_id, score_team1, score_team2)?;
    cache.invalidate();

    if ctx.mode.is_human() {
        ui::success(&format!(
            "Match #{}: {}:{}, {}",
            match_id, score_team1, score_team2, outcome
        ));
    } else {
        let data = json!({
            "match_id": match_id,
            "score_team1": score_team1,
            "score_team2": score_team2,
            "outcome": outcome.to_string(),
        });
        emit_success(ctx.mode, "result", data)?;
    }
    Ok(())
}

// ========== Export / Import ==========

pub fn run_export(ctx: &Context, entity: Option<&str>, format: Format, out: Option<PathBuf>) -> anyhow::Result<()> {
    let exporter = Exporter::new(ctx.repo(), ctx.config.export_dir(out.as_deref()));

    let spinner = Spinner::new(&format!("Exporting {} to {}", format, exporter.dir().display()));
    let started = Instant::now();
    let outcomes = match entity {
        Some(name) => {
            let entity = parse_entity(name)?;
            vec![(entity, exporter.export_entity(entity, format)?)]
        }
        None => exporter.export_all(format)?,
    };
    spinner.finish_and_clear();

    if ctx.mode.is_human() {
        ui::section("Export");
        for (entity, outcome) in &outcomes {
            match outcome {
                ExportOutcome::Written { skipped, .. } if *skipped > 0 => {
                    ui::warn(&format!("{}: {}", entity.table(), outcome));
                }
                ExportOutcome::Empty => ui::summary_row(&format!("{}:", entity.table()), &ui::dim(&outcome.to_string())),
                _ => ui::summary_row(&format!("{}:", entity.table()), &outcome.to_string()),
            }
        }
        ui::timing(&format!("{:.2?}", started.elapsed()));
    } else {
        let data: Vec<Json> = outcomes
            .iter()
            .map(|(entity, outcome)| match outcome {
                ExportOutcome::Written { path, rows, skipped } => json!({
                    "entity": entity.as_str(),
                    "path": path.display().to_string(),
                    "rows": rows,
                    "skipped": skipped,
                }),
                ExportOutcome::Empty => json!({ "entity": entity.as_str(), "rows": 0 }),
            })
            .collect();
        emit_success(ctx.mode, "export", Json::Array(data))?;
    }
    Ok(())
}

/// Relative paths that don't exist as given are looked up in the import dir
fn resolve_import_path(config: &EsportConfig, path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    config.import_dir(None).join(path)
}

pub fn run_import(
    ctx: &Context,
    cache: &PickListCache<'_>,
    entity: &str,
    path: &Path,
    format: Option<Format>,
) -> anyhow::Result<()> {
    let entity = parse_entity(entity)?;
    let path = resolve_import_path(&ctx.config, path);

    let repo = ctx.repo();
    let progress = RowProgress::new(&format!("{} <- {}", entity.table(), path.display()));
    let report = {
        let mut importer = Importer::new(repo).on_progress(|done, total| progress.update(done, total));
        importer.import_file(entity, &path, format)?
    };
    cache.invalidate();

    if ctx.mode.is_human() {
        progress.finish(&report.to_string());
        for failure in &report.failures {
            ui::warn(&failure.to_string());
        }
    } else {
        let (imported, total) = report.counts();
        let failures: Vec<String> = report.failures.iter().map(ToString::to_string).collect();
        let data = json!({
            "entity": entity.as_str(),
            "imported": imported,
            "total": total,
            "skipped": report.skipped,
            "failures": failures,
        });
        emit_success(ctx.mode, "import", data)?;
    }
    Ok(())
}

// ========== Statistics ==========

pub fn run_stats(ctx: &Context, cache: &PickListCache<'_>) -> anyhow::Result<()> {
    let repo = ctx.repo();
    let stats = ctx.store.stats()?;
    let mut ranking = ranked_teams(repo, cache)?;
    ranking.truncate(TOP_TEAMS);

    if ctx.mode.is_human() {
        ui::header(&format!("{} {}", Icons::DATABASE, ctx.store.target()));
        ui::block(&ui::stats_table(&[
            ("Accounts", &stats.accounts.to_string()),
            ("Teams", &stats.teams.to_string()),
            ("Players", &stats.players.to_string()),
            ("Tournaments", &stats.tournaments.to_string()),
            ("Matches", &stats.matches.to_string()),
        ]));
        if !ranking.is_empty() {
            ui::section("Top teams");
            ui::block(&ranking_table(&ranking));
        }
    } else {
        let data = json!({
            "accounts": stats.accounts,
            "teams": stats.teams,
            "players": stats.players,
            "tournaments": stats.tournaments,
            "matches": stats.matches,
            "top_teams": ranking.iter().map(stats_json).collect::<Vec<_>>(),
        });
        emit_success(ctx.mode, "stats", data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use esportdb::Value;

    #[test]
    fn test_parse_fields_decodes_and_skips_unknown() {
        let args = vec![
            "team_name=Natus Vincere".to_string(),
            "founded_date=2009-12-17".to_string(),
            "nonsense=1".to_string(),
            "country=".to_string(),
        ];
        let fields = parse_fields(Entity::Team, &args).unwrap();

        assert_eq!(fields.get_str("team_name"), Some("Natus Vincere"));
        assert!(matches!(fields.get("founded_date"), Some(Value::Date(_))));
        assert!(!fields.contains_key("nonsense"));
        assert_eq!(fields.get("country"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_fields_rejects_missing_equals() {
        assert!(parse_fields(Entity::Team, &["team_name".to_string()]).is_err());
    }

    #[test]
    fn test_import_path_falls_back_to_import_dir() {
        let config = EsportConfig {
            import_dir: Some("incoming".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_import_path(&config, Path::new("teams.json")),
            PathBuf::from("incoming/teams.json")
        );

        let dir = tempfile::tempdir().unwrap();
        let absolute = dir.path().join("teams.json");
        assert_eq!(resolve_import_path(&config, &absolute), absolute);
    }

    #[test]
    fn test_mutations_invalidate_the_shared_cache() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::connect(OutputMode::Json, EsportConfig::default(), dir.path().join("records.db")).unwrap();
        let cache = PickListCache::new(ctx.repo());

        run_add(&ctx, &cache, "team", &["team_name=MOUZ".to_string()]).unwrap();
        assert_eq!(cache.teams().unwrap().len(), 1);
        assert!(cache.is_loaded(Entity::Team));

        run_add(&ctx, &cache, "team", &["team_name=Aurora".to_string()]).unwrap();
        assert!(!cache.is_loaded(Entity::Team));
        let labels: Vec<_> = cache.teams().unwrap().into_iter().map(|item| item.label).collect();
        assert_eq!(labels, vec!["Aurora", "MOUZ"]);

        let aurora = cache.teams().unwrap()[0].id;
        run_delete(&ctx, &cache, "team", aurora).unwrap();
        assert!(!cache.is_loaded(Entity::Team));
        assert_eq!(cache.teams().unwrap().len(), 1);
    }

    #[test]
    fn test_accounts_hide_password_hash() {
        assert_eq!(hidden_columns(Entity::Account), &["password_hash"]);
        assert!(hidden_columns(Entity::Team).is_empty());
    }
}
