use serde::{Deserialize, Serialize};

use super::session::{GoalId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub name: String,
    pub duration_seconds: u64,
}

/// The slice of a goal the timer needs: who owns it and how long a day's
/// work on it should take.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalId,
    pub user_id: UserId,
    pub daily_duration_seconds: u64,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
}

impl Goal {
    pub fn has_sub_tasks(&self) -> bool {
        !self.sub_tasks.is_empty()
    }

    pub fn sub_task(&self, sub_task_id: &str) -> Option<&SubTask> {
        self.sub_tasks.iter().find(|task| task.id == sub_task_id)
    }

    /// A sub-task's own duration wins over the goal's daily duration.
    pub fn target_seconds(&self, sub_task_id: Option<&str>) -> u64 {
        sub_task_id
            .and_then(|id| self.sub_task(id))
            .map(|task| task.duration_seconds)
            .unwrap_or(self.daily_duration_seconds)
    }
}
