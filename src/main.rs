use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::anyhow;
use clap::Parser as ClapParser;
use clap::Subcommand;
use indexmap::IndexMap;
use joinscan::ast::JoinDescriptor;
use joinscan::catalog::Catalog;
use joinscan::cleaner::clean;
use joinscan::config::Config;
use joinscan::parser::extract_joins_many;
use joinscan::report::{Report, to_json};
use joinscan::validation::{ValidationOutcome, plan_validation};

#[derive(clap::Parser)]
#[command(name = "joinscan")]
#[command(about = "SQL join topology extractor and join validation planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract join descriptors from one or more SQL files.
    ExtractJoins(ExtractCommand),
    /// Plan integrity checks for the joins of one or more SQL files.
    PlanValidation(PlanCommand),
    /// Print the normalized text of a SQL file.
    Clean(CleanCommand),
}

#[derive(clap::Args)]
struct ExtractCommand {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Additional word that is never read as a table alias (repeatable).
    #[arg(long = "reserved-word", value_name = "WORD")]
    reserved_words: Vec<String>,
    /// Extract from the SQL text as is, without normalizing it first.
    #[arg(long)]
    no_clean: bool,
    /// Path to the SQL file or directory containing SQL files.
    #[arg(value_name = "SQL_[FILE|DIR]")]
    sql: PathBuf,
    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
struct PlanCommand {
    /// Path to the input file containing schema objects.
    #[arg(short, long)]
    catalog: PathBuf,
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Row limit of the spot-check queries.
    #[arg(long)]
    spot_check_limit: Option<usize>,
    /// Also plan LEFT, RIGHT and FULL joins.
    #[arg(long)]
    validate_non_inner: bool,
    /// Path to the SQL file or directory containing SQL files.
    #[arg(value_name = "SQL_[FILE|DIR]")]
    sql: PathBuf,
    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
struct CleanCommand {
    #[arg(value_name = "SQL_FILE")]
    sql: PathBuf,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_path(path),
        None => Ok(Config::default()),
    }
}

fn read_sql(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|_| anyhow!("Failed to read sql file {}", path.display()))
}

/// The `.sql` files of a directory in name order.
fn sql_files_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|_| anyhow!("Failed to read directory {}", dir.display()))?
        .filter_map(|res| res.ok())
        .map(|entry| entry.path())
        .filter(|file| file.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    files.sort();
    Ok(files)
}

/// Reads and extracts every input file, in parallel for directories.
/// Returns the absolute path and descriptors of each file.
fn extract_files(
    files: &[PathBuf],
    config: &Config,
) -> anyhow::Result<Vec<(String, Vec<JoinDescriptor>)>> {
    let sqls = files
        .iter()
        .map(|file| {
            let sql = read_sql(file)?;
            Ok::<_, anyhow::Error>(if config.clean { clean(&sql) } else { sql })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let extractor = config.extractor();
    let joins = extract_joins_many(&extractor, &sqls, files.len() > 1);

    files
        .iter()
        .zip(joins)
        .map(|(file, descriptors)| {
            let path = std::path::absolute(file)?.display().to_string();
            log::info!("{}: {} join(s)", path, descriptors.len());
            Ok::<_, anyhow::Error>((path, descriptors))
        })
        .collect()
}

fn plan_report(
    descriptors: &[JoinDescriptor],
    catalog: &Catalog,
    config: &Config,
) -> Report {
    let options = config.validation_options();
    let outcomes = descriptors
        .iter()
        .map(|descriptor| plan_validation(descriptor, catalog, &options))
        .collect::<Vec<ValidationOutcome>>();
    Report::from_outcomes(descriptors, &outcomes)
}

fn run_extract(command: &ExtractCommand) -> anyhow::Result<String> {
    let mut config = load_config(command.config.as_ref())?;
    config
        .extra_reserved_words
        .extend(command.reserved_words.iter().cloned());
    if command.no_clean {
        config.clean = false;
    }

    if command.sql.is_dir() {
        let files = sql_files_in_dir(&command.sql)?;
        let file_joins: IndexMap<String, Vec<JoinDescriptor>> =
            extract_files(&files, &config)?.into_iter().collect();
        to_json(&file_joins, command.pretty)
    } else {
        let descriptors = extract_files(std::slice::from_ref(&command.sql), &config)?
            .into_iter()
            .flat_map(|(_, descriptors)| descriptors)
            .collect::<Vec<_>>();
        to_json(&descriptors, command.pretty)
    }
}

fn run_plan(command: &PlanCommand) -> anyhow::Result<String> {
    let mut config = load_config(command.config.as_ref())?;
    if let Some(limit) = command.spot_check_limit {
        config.spot_check_limit = limit;
    }
    if command.validate_non_inner {
        config.validate_non_inner = true;
    }
    let catalog = Catalog::from_path(&command.catalog)?;

    if command.sql.is_dir() {
        let files = sql_files_in_dir(&command.sql)?;
        let reports: IndexMap<String, Report> = extract_files(&files, &config)?
            .into_iter()
            .map(|(path, descriptors)| (path, plan_report(&descriptors, &catalog, &config)))
            .collect();
        to_json(&reports, command.pretty)
    } else {
        let descriptors = extract_files(std::slice::from_ref(&command.sql), &config)?
            .into_iter()
            .flat_map(|(_, descriptors)| descriptors)
            .collect::<Vec<_>>();
        plan_report(&descriptors, &catalog, &config).to_json(command.pretty)
    }
}

fn main() -> anyhow::Result<()> {
    let now = Instant::now();

    env_logger::init();
    let cli = Cli::parse();

    let out_str = match &cli.command {
        Commands::ExtractJoins(extract_command) => run_extract(extract_command)?,
        Commands::PlanValidation(plan_command) => run_plan(plan_command)?,
        Commands::Clean(clean_command) => clean(&read_sql(&clean_command.sql)?),
    };
    println!("{}", out_str);

    let elapsed = now.elapsed();
    log::info!("Elapsed: {:.2?}", elapsed);

    Ok(())
}
