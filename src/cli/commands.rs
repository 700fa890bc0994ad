//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::load_records;
use crate::application::services::TreeService;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, OutputFormat, Settings};
use crate::util::path::PathExt;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Build {
            file,
            root,
            format,
            exclude,
        }) => cmd_build(cli, file, *root, *format, exclude),
        Some(Commands::Roots { file }) => cmd_roots(cli, file),
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => cmd_config_show(cli),
            ConfigCommands::Path => cmd_config_path(),
        },
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, run with --help".to_string(),
        )),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let local: Option<PathBuf> = cli.config.as_deref().map(Path::expand);
    Ok(Settings::load(local.as_deref())?)
}

#[instrument(skip(cli))]
fn cmd_build(
    cli: &Cli,
    file: &Path,
    root: Option<i64>,
    format: Option<OutputFormat>,
    exclude: &[String],
) -> CliResult<()> {
    let mut settings = load_settings(cli)?;
    if !exclude.is_empty() {
        settings.exclude = Settings::merge_array(&settings.exclude, exclude);
    }
    let format = format.unwrap_or(settings.output);
    debug!(?settings, ?format, "effective settings");

    let service = TreeService::new(&settings)?;
    let records = load_records(&file.expand())?;
    let trees = service.build(records, root)?;

    if trees.is_empty() {
        match root {
            Some(id) => output::warning(&format!("no root: {}", id)),
            None => output::warning("no trees"),
        }
        return Ok(());
    }

    let rendered = service.render(&trees, format)?;
    match format {
        OutputFormat::Text => print!("{}", rendered),
        OutputFormat::Json => output::info(&rendered),
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_roots(cli: &Cli, file: &Path) -> CliResult<()> {
    let settings = load_settings(cli)?;
    let service = TreeService::new(&settings)?;
    let roots = service.roots(load_records(&file.expand())?)?;

    if roots.is_empty() {
        output::warning("no roots");
    } else {
        output::info(&roots.iter().join("\n"));
    }
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> CliResult<()> {
    let settings = load_settings(cli)?;
    output::header("Effective settings");
    output::info(&settings.to_toml()?);
    Ok(())
}

fn cmd_config_path() -> CliResult<()> {
    match global_config_path() {
        Some(path) => {
            let status = if path.exists() { "exists" } else { "not found" };
            output::action("Global", &format!("{} ({})", path.display(), status));
        }
        None => output::warning("no config directory available"),
    }
    Ok(())
}
