use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use is_terminal::IsTerminal;
use tracing::info;

mod anchor;
mod backup;
mod confirm;
mod diff;
mod encoding;
mod files;
mod logging;
mod newline;
mod operation;
mod plan;
mod report;
mod runner;
mod transform;

use confirm::PromptConfirm;
use plan::{PartialFailure, load_plan};
use runner::{PatchRunner, RunMode, RunnerConfig};

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

/// Apply an anchor-based patch plan: preview by default, back up and write
/// with --apply.
#[derive(Debug, Parser)]
#[command(name = "anchorpatch", version)]
struct Cli {
    /// Plan definition (YAML, or JSON when the extension is .json).
    #[arg(value_name = "PLAN", value_hint = ValueHint::FilePath)]
    plan: PathBuf,
    /// Confirm, back up and write instead of only previewing.
    #[arg(long, action = ArgAction::SetTrue)]
    apply: bool,
    /// Directory that targets and the backup directory are relative to.
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    root: Option<PathBuf>,
    /// What to do with a file whose operations only partly succeeded.
    #[arg(long = "partial-failure", value_enum)]
    partial_failure: Option<PartialFailure>,
    /// Print the final report as JSON; prompts and diffs go to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    /// Colour preview diffs (auto: only when stdout is a terminal).
    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,
    /// Unchanged lines of context around each preview hunk.
    #[arg(long, default_value_t = 3)]
    context: usize,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); ANCHORPATCH_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let code = run(cli)?;
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let colorize = cli.color.should_color() && !cli.json;
    logging::init_logger(cli.verbose, io::stderr().is_terminal());

    let loaded = load_plan(&cli.plan)?;
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("resolving working directory")?,
    };
    info!(
        plan = %loaded.plan.id,
        files = loaded.plan.files.len(),
        root = %root.display(),
        "plan loaded"
    );

    let mode = if cli.apply {
        RunMode::Execute
    } else {
        RunMode::Preview
    };
    let mut config = RunnerConfig::new(root, mode);
    config.partial_failure = cli.partial_failure;
    config.diff = diff::DiffDisplayConfig {
        context: cli.context,
        colorize,
    };

    // With --json, stdout carries only the report.
    let report = if cli.json {
        let mut confirm = PromptConfirm::new(io::stdin().lock(), io::stderr());
        PatchRunner::new(&loaded, config).run(&mut confirm, &mut io::stderr())?
    } else {
        let mut confirm = PromptConfirm::stdio();
        PatchRunner::new(&loaded, config).run(&mut confirm, &mut io::stdout())?
    };

    let mut stdout = io::stdout().lock();
    if cli.json {
        writeln!(stdout, "{}", report.to_json()?)?;
    } else {
        write!(stdout, "{}", report.render())?;
    }
    stdout.flush()?;
    Ok(report.exit_code())
}
