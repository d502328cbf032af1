//! Command line entry point.

mod host;

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

pub use self::host::CliHost;
use crate::app::previewer::Previewer;
use crate::domain::model::{PreviewEvent, WatchTarget};
use crate::infra::config::Config;
use crate::infra::watch::NotifyWatch;

#[derive(Parser)]
#[command(name = "hbspreview", author, version, about = "Live HTML preview for Handlebars templates", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Render missing values as empty instead of failing
    #[arg(long, global = true)]
    lenient: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the template once and print the preview HTML
    Render(TargetArgs),
    /// Re-render whenever the template, its context file, or a fragment changes
    Watch(TargetArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// Template to preview; sample data is read from `<TEMPLATE>.json`
    template: PathBuf,
    /// Workspace root searched for fragments (defaults to the template's directory)
    #[arg(long)]
    workspace: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::init(cli.verbose);

    match cli.command {
        Commands::Render(args) => render_once(&args, cli.lenient),
        Commands::Watch(args) => watch(&args, cli.lenient),
    }
}

fn prepare(args: &TargetArgs, lenient: bool) -> Result<(PathBuf, PathBuf, Config)> {
    let template = args
        .template
        .canonicalize()
        .with_context(|| format!("template not found: {}", args.template.display()))?;
    let workspace = match &args.workspace {
        Some(dir) => dir
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", dir.display()))?,
        None => template
            .parent()
            .map(Path::to_path_buf)
            .context("template has no parent directory")?,
    };

    let mut config = Config::load(&workspace)?;
    if lenient {
        config.render.set_strict(false);
    }
    Ok((template, workspace, config))
}

fn render_once(args: &TargetArgs, lenient: bool) -> Result<()> {
    let (template, workspace, config) = prepare(args, lenient)?;
    let host = CliHost::new(workspace, &config, None)?;
    let mut previewer = Previewer::new(host, config)?;
    previewer.open(&template)?;
    previewer.shutdown();
    Ok(())
}

fn watch(args: &TargetArgs, lenient: bool) -> Result<()> {
    let (template, workspace, config) = prepare(args, lenient)?;
    let (tx, rx) = mpsc::channel();
    let host = CliHost::new(workspace, &config, Some(tx.clone()))?;
    let mut previewer = Previewer::new(host, config)?;
    previewer.open(&template)?;

    // Outside an editor, saving the template is the document-change signal.
    let document = template.clone();
    let _document_watch = NotifyWatch::start(&WatchTarget::File(template.clone()), move |_, _| {
        let _ = tx.send(PreviewEvent::DocumentChanged {
            path: document.clone(),
        });
    })?;
    tracing::info!(template = %template.display(), "watching for changes");

    for event in rx {
        previewer.handle(event);
    }
    previewer.shutdown();
    Ok(())
}
