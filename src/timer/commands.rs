use std::{str::FromStr, sync::Arc};

use crate::{
    actions::ActionManager,
    events::TimerView,
    models::UserId,
    service::GoalDirectory,
    sync::reconcile_once,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        goal_id: String,
        sub_task_id: Option<String>,
    },
    Pause,
    Resume,
    Stop {
        confirmed: bool,
    },
    Complete,
    Status,
    Sync,
    Reset,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("start", [goal]) => Command::Start {
                goal_id: goal.to_string(),
                sub_task_id: None,
            },
            ("start", [goal, sub_task]) => Command::Start {
                goal_id: goal.to_string(),
                sub_task_id: Some(sub_task.to_string()),
            },
            ("start", _) => return Err("usage: start <goal> [sub-task]".into()),
            ("pause", []) => Command::Pause,
            ("resume", []) => Command::Resume,
            ("stop", []) => Command::Stop { confirmed: false },
            ("stop", ["--yes"]) => Command::Stop { confirmed: true },
            ("complete", []) => Command::Complete,
            ("status", []) => Command::Status,
            ("sync", []) => Command::Sync,
            ("reset", []) => Command::Reset,
            ("quit" | "exit", []) => Command::Quit,
            (other, _) => return Err(format!("unknown command '{other}'")),
        };
        Ok(command)
    }
}

/// Runs commands typed by one signed-in user against their own timer.
pub struct CommandContext {
    manager: ActionManager,
    goals: Arc<dyn GoalDirectory>,
    user_id: UserId,
}

impl CommandContext {
    pub fn new(manager: ActionManager, goals: Arc<dyn GoalDirectory>, user_id: UserId) -> Self {
        Self {
            manager,
            goals,
            user_id,
        }
    }

    /// Requests are sent in the background; their outcome arrives as a notice.
    pub async fn execute(&self, command: Command) -> Result<String, String> {
        let user = self.user_id.as_str();
        let controller = self.manager.controller();

        match command {
            Command::Start {
                goal_id,
                sub_task_id,
            } => {
                let goal = self
                    .goals
                    .fetch_goal(&goal_id)
                    .await
                    .map_err(|e| e.to_string())?;
                self.manager
                    .start(user, &goal, sub_task_id)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(format!("starting {goal_id}"))
            }
            Command::Pause => {
                self.manager.pause(user, user).await.map_err(|e| e.to_string())?;
                Ok("pausing".into())
            }
            Command::Resume => {
                self.manager.resume(user, user).await.map_err(|e| e.to_string())?;
                Ok("resuming".into())
            }
            Command::Stop { confirmed: false } => Err(
                "stopping ends today's session and cannot be resumed; run `stop --yes` to confirm"
                    .into(),
            ),
            Command::Stop { confirmed: true } => {
                self.manager.stop(user, user).await.map_err(|e| e.to_string())?;
                Ok("stopping".into())
            }
            Command::Complete => {
                self.manager
                    .complete_sub_task(user, user)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok("sub-task completed; timer restarted".into())
            }
            Command::Status => Ok(match controller.view(user).await {
                Some(view) => describe(&view),
                None => "no timer running".into(),
            }),
            Command::Sync => {
                let report = reconcile_once(controller).await.map_err(|e| e.to_string())?;
                Ok(format!(
                    "synced: {} updated, {} restored, {} finished, {} dropped",
                    report.updated.len(),
                    report.restored.len(),
                    report.finished.len(),
                    report.dropped.len()
                ))
            }
            Command::Reset => Ok(match controller.unregister_session(user).await {
                Some(_) => "timer cleared locally".into(),
                None => "no timer to clear".into(),
            }),
            Command::Quit => Ok("bye".into()),
        }
    }
}

pub fn format_clock(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub fn describe(view: &TimerView) -> String {
    let mut line = format!(
        "{} {} {}",
        view.goal_id,
        view.status.as_str(),
        format_clock(view.elapsed_seconds)
    );
    if let Some(target) = view.target_seconds {
        line.push_str(&format!(" / {}", format_clock(target)));
    }
    if let Some(sub_task) = &view.sub_task_id {
        line.push_str(&format!(" [{sub_task}]"));
    }
    if view.target_reached {
        line.push_str(" (target reached)");
    }
    if !view.confirmed {
        line.push_str(" *");
    }
    line
}
