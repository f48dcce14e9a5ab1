use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use simplelog::{Config, WriteLogger};

use pagefinder::activity::{ActivityMonitor, PresenceChange};
use pagefinder::clock::SystemClock;
use pagefinder::corpus;
use pagefinder::library::{resolve_log_path, resolve_work_paths};
use pagefinder::lookup::{Lookup, LookupError, LookupOutcome};
use pagefinder::panic_handler;
use pagefinder::pdf;
use pagefinder::session::{
    ChoiceList, ChunkView, Direction, OwnerId, Reaper, SessionError, SessionId, SessionRegistry,
    SlotId,
};
use pagefinder::settings::{Settings, load_settings};

#[derive(Parser)]
#[command(name = "pagefinder")]
#[command(about = "Find a term in a folder of PDFs and page through the matching page")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the per-user config file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `log_level` from the settings file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every page containing TERM
    Search {
        term: String,
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Render one page of a PDF into chunk images
    Render {
        pdf: PathBuf,
        /// Page number, starting at 1
        page: usize,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Search, pick a document and page through the rendered match
    Lookup {
        term: String,
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref());
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    let log_path = resolve_log_path()?;
    WriteLogger::init(
        settings.level_filter(),
        Config::default(),
        File::create(&log_path)?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting pagefinder");

    let result = match cli.command {
        Commands::Search { term, corpus } => run_search(&settings, &term, corpus),
        Commands::Render { pdf, page, out } => run_render(&pdf, page, out),
        Commands::Lookup { term, corpus } => run_lookup(&settings, &term, corpus),
    };

    if let Err(e) = &result {
        log::error!("Command failed: {e:?}");
    }
    info!("Shutting down pagefinder");
    result
}

fn run_search(settings: &Settings, term: &str, corpus: Option<PathBuf>) -> Result<()> {
    let root = corpus.unwrap_or_else(|| settings.corpus_dir.clone());
    let matches = corpus::search(&root, term)
        .with_context(|| format!("Search of {root:?} failed"))?;

    if matches.is_empty() {
        println!("No results found for '{term}'.");
    }
    for found in matches {
        println!(
            "{}\t{}\t{}",
            found.display_name,
            found.page_index + 1,
            found.source_path.display()
        );
    }
    Ok(())
}

fn run_render(source: &Path, page: usize, out: Option<PathBuf>) -> Result<()> {
    if page == 0 {
        bail!("Pages are numbered from 1");
    }
    let out = out.unwrap_or_else(|| {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());
        PathBuf::from(format!("{stem}_page{page}"))
    });

    let chunks = pdf::render(source, page - 1, &out)
        .with_context(|| format!("Failed to render {source:?}"))?;
    for chunk in chunks {
        println!("{}", chunk.display());
    }
    Ok(())
}

enum Prompt {
    Choosing(ChoiceList),
    Viewing(SessionId),
    Done,
}

fn run_lookup(settings: &Settings, term: &str, corpus: Option<PathBuf>) -> Result<()> {
    let corpus = corpus.unwrap_or_else(|| settings.corpus_dir.clone());
    let paths = resolve_work_paths(&corpus, &settings.output_dir)?;

    let clock = SystemClock::shared();
    let registry = SessionRegistry::new(clock.clone(), settings.timeouts());
    let reaper = Reaper::spawn_with(registry.clone(), settings.sweep_interval(), |report| {
        for id in &report.ended_sessions {
            eprintln!("[session {id} timed out, files removed]");
        }
        for id in &report.expired_selections {
            eprintln!("[selection {id} expired]");
        }
    })
    .context("Failed to start session reaper")?;

    let activity = ActivityMonitor::new(clock, settings.idle_threshold());
    let monitor = activity
        .spawn(settings.idle_check_interval(), |change| match change {
            PresenceChange::BecameIdle => info!("No activity, going idle"),
            PresenceChange::BecameActive => info!("Back to active"),
        })
        .context("Failed to start activity monitor")?;

    let lookup = Lookup::new(paths.corpus_dir, paths.output_dir, registry.clone())
        .with_activity(activity);
    let owner = OwnerId::new(std::env::var("USER").unwrap_or_else(|_| "operator".to_string()));
    let slot = SlotId::new("terminal");

    let result = interact(&lookup, term, &owner, &slot);

    let ended = registry.shutdown();
    if ended > 0 {
        info!("Ended {ended} sessions on exit");
    }
    reaper.stop();
    monitor.stop();
    result
}

fn interact(lookup: &Lookup, term: &str, owner: &OwnerId, slot: &SlotId) -> Result<()> {
    let mut prompt = match lookup.lookup(term, owner, slot) {
        Ok(LookupOutcome::NoResults) => {
            println!("No results found for '{term}'.");
            Prompt::Done
        }
        Ok(LookupOutcome::View(opened)) => {
            show_chunk(&opened.view);
            Prompt::Viewing(opened.view.session_id)
        }
        Ok(LookupOutcome::Choose(choices)) => {
            show_choices(&choices);
            Prompt::Choosing(choices)
        }
        Err(LookupError::Corpus(e)) => return Err(e).context("Lookup failed"),
        Err(e) => {
            println!("{e}");
            Prompt::Done
        }
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while !matches!(prompt, Prompt::Done) {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let input = line?;
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        prompt = match prompt {
            Prompt::Choosing(choices) => choose(lookup, owner, choices, input),
            Prompt::Viewing(session_id) => view(lookup, owner, session_id, input),
            Prompt::Done => Prompt::Done,
        };
    }
    Ok(())
}

fn choose(lookup: &Lookup, owner: &OwnerId, choices: ChoiceList, input: &str) -> Prompt {
    if matches!(input, "q" | "quit") {
        return Prompt::Done;
    }

    let name = match input.parse::<usize>() {
        Ok(n) if (1..=choices.names.len()).contains(&n) => choices.names[n - 1].clone(),
        _ => input.to_string(),
    };

    match lookup.choose(&choices.selection_id, owner, &name) {
        Ok(opened) => {
            show_chunk(&opened.view);
            Prompt::Viewing(opened.view.session_id)
        }
        Err(LookupError::Session(e @ SessionError::UnknownChoice { .. })) => {
            println!("{e}");
            Prompt::Choosing(choices)
        }
        Err(e) => {
            println!("{e}");
            Prompt::Done
        }
    }
}

fn view(lookup: &Lookup, owner: &OwnerId, session_id: SessionId, input: &str) -> Prompt {
    let direction = match input {
        "n" | "next" => Direction::Forward,
        "p" | "prev" => Direction::Backward,
        "q" | "close" => {
            match lookup.close(&session_id, owner) {
                Ok(report) if !report.is_clean() => {
                    warn!(
                        "Session {session_id} closed with {} cleanup warnings",
                        report.warnings.len()
                    );
                }
                Ok(_) => {}
                Err(e) => println!("{e}"),
            }
            return Prompt::Done;
        }
        _ => {
            println!("n/next, p/prev or q/close");
            return Prompt::Viewing(session_id);
        }
    };

    match lookup.navigate(&session_id, owner, direction) {
        Ok(chunk) => {
            show_chunk(&chunk);
            Prompt::Viewing(session_id)
        }
        Err(e) => {
            println!("{e}");
            Prompt::Done
        }
    }
}

fn show_chunk(view: &ChunkView) {
    println!("{}", view.caption);
    println!("  {}  [{}/{}]", view.path.display(), view.index + 1, view.count);
}

fn show_choices(choices: &ChoiceList) {
    println!("Several documents match, pick one by number or name:");
    for (i, name) in choices.names.iter().enumerate() {
        println!("  {:>2}. {name}", i + 1);
    }
    if choices.is_truncated() {
        println!(
            "Showing only first {} of {} matching documents.",
            choices.names.len(),
            choices.total
        );
    }
}
