pub mod actions;
pub mod error;
pub mod events;
pub mod models;
pub mod service;
pub mod settings;
pub mod sync;
pub mod timer;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

pub use actions::{ActionManager, ActionOutcome, PendingAction};
pub use error::{ServiceError, SessionError, ValidationError};
pub use events::{Notice, NoticeKind, TimerBoard, TimerView};
pub use service::{GoalDirectory, HttpSessionService, SessionService};
pub use timer::TimerController;

use settings::SettingsStore;
use timer::{
    clock::SystemClock,
    commands::{describe, Command, CommandContext},
};

/// Runs the timer against the configured session service and reads
/// commands from stdin until `quit`, EOF or Ctrl-C.
pub async fn run() -> Result<()> {
    let settings = SettingsStore::new(SettingsStore::default_path())?;
    let engine = settings.engine();

    // Initialize logging (reads RUST_LOG env var)
    let level = if engine.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("goaltimer starting up (settings: {})", settings.path().display());

    let user_id = engine
        .user_id
        .clone()
        .context("no user configured; set user_id in the settings file or GOALTIMER_USER_ID")?;

    let service = Arc::new(HttpSessionService::new(engine.service_url.clone()));
    let controller = TimerController::with_goals(
        service.clone(),
        service.clone(),
        Arc::new(SystemClock),
        &engine,
    );

    // A failed sweep is not fatal; reconciliation takes over once sessions exist.
    if let Err(err) = controller.init().await {
        warn!("starting without server state: {err}");
    }

    let manager = ActionManager::new(controller.clone(), engine.confirm_actions);
    let context = CommandContext::new(manager, service, user_id.clone());

    let mut board = controller.subscribe();
    let mut notices = controller.notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => match context.execute(command).await {
                        Ok(reply) => println!("{reply}"),
                        Err(err) => println!("error: {err}"),
                    },
                    Err(err) => println!("error: {err}"),
                }
            }
            changed = board.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(view) = board.borrow_and_update().get(&user_id) {
                    log::debug!("{}", describe(view));
                }
            }
            notice = notices.recv() => {
                if let Ok(notice) = notice {
                    println!("{}", notice.message);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}
