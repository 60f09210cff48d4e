//! CLI for the persisted quiz form
//!
//! Each route (`CRM`, `ATS`) keeps its own quiz state in a slot file. Every
//! edit is written to the slot and survives restarts, and `watch` follows
//! changes made to the slot by other processes.
//!
//! # Examples
//!
//! ```bash
//! # help menu
//! slotcli --help
//!
//! # answer and finish the CRM quiz
//! slotcli edit CRM Ada
//! slotcli finish CRM
//!
//! # print both routes
//! slotcli list
//!
//! # follow changes made from another terminal
//! slotcli watch CRM --interval 250ms
//! ```
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use directories::ProjectDirs;
use log::*;
use slotstore::{
    persisted::{PersistOptions, PersistedObservers},
    quiz::{Quiz, QuizAction, QuizRoute, QuizState},
    storage::{FileSlotStorage, SlotStorage},
    store::LoggingObserver,
};
use std::{fs, io, io::Write, path::PathBuf, rc::Rc, thread};

use crate::{
    config::{ConfigManager, DEFAULT_CONFIG_FILE, DEFAULT_SLOTS_DIR},
    view::QuizView,
};

#[doc(hidden)]
mod config;
#[doc(hidden)]
mod view;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// CLI for the persisted quiz form
struct Args {
    /// Directory holding slot files, overrides the config file
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show the initial state first and apply the persisted value afterwards
    #[arg(long, default_value_t = false)]
    defer_hydration: bool,

    /// Output state in json instead of table text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Only print final output nothing else
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Prints debug logs including every dispatched action
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Print the quiz state of a route
    Show {
        /// CRM or ATS
        route: QuizRoute,
    },
    /// Print the quiz state of every route
    List,
    /// Replace the name answered for a route
    Edit {
        /// CRM or ATS
        route: QuizRoute,
        /// The new name
        name: String,
    },
    /// Mark the quiz of a route finished
    Finish {
        /// CRM or ATS
        route: QuizRoute,
    },
    /// Print the quiz state of a route every time its slot changes
    Watch {
        /// CRM or ATS
        route: QuizRoute,
        /// How often to check the slot for changes
        #[arg(long, default_value = "500ms")]
        interval: humantime::Duration,
        /// Stop after this many changes
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Save settings to the config file
    Configure {
        /// Directory holding slot files
        #[arg(long)]
        storage_dir: Option<String>,
        /// Whether quizzes start out with the persisted value
        #[arg(long)]
        initialize_with_value: Option<bool>,
    },
}

/// Settings resolved from the config file and command line flags
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    storage_dir: PathBuf,
    options: PersistOptions,
}

#[doc(hidden)]
fn initialize_logger(args: &Args) -> Result<()> {
    let filter = if args.quiet {
        simplelog::LevelFilter::Error
    } else if args.debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    simplelog::TermLogger::init(
        filter,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[doc(hidden)]
fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "slotcli")
        .ok_or(eyre!("failed to get project directory"))
}

#[doc(hidden)]
fn create_config_manager(args: &Args) -> Result<ConfigManager> {
    let project_dirs = get_project_dirs()?;

    let config_path = match args.config.as_ref() {
        Some(path) => path.clone(),
        None => {
            let config_dir = project_dirs.config_dir();
            fs::create_dir_all(config_dir)?;
            config_dir.join(DEFAULT_CONFIG_FILE)
        }
    };

    let default_storage_dir = project_dirs.data_dir().join(DEFAULT_SLOTS_DIR);

    let config_manager = ConfigManager::builder()
        .default_storage_dir(path_to_string(&default_storage_dir)?)
        .path(path_to_string(&config_path)?)
        .build()?;

    Ok(config_manager)
}

#[doc(hidden)]
fn path_to_string(path: &std::path::Path) -> Result<String> {
    Ok(path
        .to_str()
        .ok_or(eyre!("unable to construct path: {}", path.display()))?
        .to_string())
}

#[doc(hidden)]
fn resolve_settings(args: &Args, manager: &ConfigManager) -> Result<Settings> {
    let config = manager.get();

    let storage_dir = args
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage_dir));

    let options = PersistOptions::builder()
        .initialize_with_value(
            config.initialize_with_value && !args.defer_hydration,
        )
        .build()?;

    Ok(Settings {
        storage_dir,
        options,
    })
}

#[doc(hidden)]
fn print_settings(settings: &Settings) {
    debug!("configuration:");
    debug!("storage_dir:           {}", settings.storage_dir.display());
    debug!(
        "initialize_with_value: {}",
        settings.options.initialize_with_value
    );
}

type QuizObservers = PersistedObservers<QuizState, QuizAction>;

#[doc(hidden)]
fn observers(args: &Args) -> (QuizObservers, QuizObservers) {
    if args.debug {
        (
            vec![LoggingObserver::boxed("before")],
            vec![LoggingObserver::boxed("after")],
        )
    } else {
        (vec![], vec![])
    }
}

#[doc(hidden)]
fn open_quiz(
    args: &Args,
    settings: &Settings,
    storage: Rc<dyn SlotStorage>,
    route: QuizRoute,
) -> Result<Quiz> {
    let (before, after) = observers(args);
    let quiz = Quiz::open_with_observers(
        route,
        storage,
        before,
        after,
        settings.options.clone(),
    )?;
    Ok(quiz)
}

#[doc(hidden)]
fn render_quiz<W: Write>(out: &mut W, args: &Args, quiz: &Quiz) -> Result<()> {
    view::render(out, &[QuizView::new(quiz.route(), &quiz.state())], args.json)
}

#[doc(hidden)]
fn show<W: Write>(out: &mut W, args: &Args, quiz: &Quiz) -> Result<()> {
    render_quiz(out, args, quiz)?;

    // with deferred hydration the first render always shows the initial
    // state, the persisted value only appears once hydrated
    if !quiz.store().is_hydrated() {
        quiz.hydrate();
        render_quiz(out, args, quiz)?;
    }

    Ok(())
}

#[doc(hidden)]
fn watch<W: Write>(
    out: &mut W,
    args: &Args,
    storage: &FileSlotStorage,
    quiz: &Quiz,
    interval: humantime::Duration,
    limit: Option<usize>,
) -> Result<()> {
    quiz.hydrate();
    render_quiz(out, args, quiz)?;

    let mut changes = 0;
    let mut last = quiz.state();

    while limit.is_none_or(|l| changes < l) {
        thread::sleep(*interval);

        if storage.poll()? == 0 {
            continue;
        }

        let current = quiz.state();
        if current == last {
            continue;
        }

        info!("slot {} changed", quiz.route().slot_key());
        render_quiz(out, args, quiz)?;
        last = current;
        changes += 1;
    }

    Ok(())
}

#[doc(hidden)]
fn configure(
    manager: &mut ConfigManager,
    storage_dir: Option<String>,
    initialize_with_value: Option<bool>,
) -> Result<()> {
    let mut config = manager.get();

    if let Some(dir) = storage_dir {
        config.storage_dir = dir;
    }

    if let Some(value) = initialize_with_value {
        config.initialize_with_value = value;
    }

    info!("saving configuration: {:?}", config);
    manager.update_config(config)
}

#[doc(hidden)]
fn run<W: Write>(
    out: &mut W,
    args: &Args,
    manager: &mut ConfigManager,
) -> Result<()> {
    if let Command::Configure {
        storage_dir,
        initialize_with_value,
    } = args.command.clone()
    {
        return configure(manager, storage_dir, initialize_with_value);
    }

    let settings = resolve_settings(args, manager)?;
    print_settings(&settings);

    let file_storage = Rc::new(FileSlotStorage::new(&settings.storage_dir)?);
    let storage: Rc<dyn SlotStorage> = file_storage.clone();

    match args.command.clone() {
        Command::Show { route } => {
            let quiz = open_quiz(args, &settings, storage, route)?;
            show(out, args, &quiz)
        }
        Command::List => {
            let quizzes = QuizRoute::all()
                .into_iter()
                .map(|route| {
                    open_quiz(args, &settings, Rc::clone(&storage), route)
                })
                .collect::<Result<Vec<Quiz>>>()?;

            let views: Vec<QuizView> = quizzes
                .iter()
                .map(|quiz| {
                    quiz.hydrate();
                    QuizView::new(quiz.route(), &quiz.state())
                })
                .collect();

            view::render(out, &views, args.json)
        }
        Command::Edit { route, name } => {
            let quiz = open_quiz(args, &settings, storage, route)?;
            quiz.change_name(name);
            render_quiz(out, args, &quiz)
        }
        Command::Finish { route } => {
            let quiz = open_quiz(args, &settings, storage, route)?;
            quiz.finish();
            render_quiz(out, args, &quiz)
        }
        Command::Watch {
            route,
            interval,
            limit,
        } => {
            let quiz = open_quiz(args, &settings, storage, route)?;
            watch(out, args, &file_storage, &quiz, interval, limit)
        }
        // handled before resolving settings
        Command::Configure { .. } => Ok(()),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    initialize_logger(&args)?;

    let mut manager = create_config_manager(&args)?;

    let mut stdout = io::stdout();

    run(&mut stdout, &args, &mut manager)
}

#[cfg(test)]
#[path = "./main_tests.rs"]
mod tests;
