use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub service_url: String,
    pub user_id: Option<String>,
    pub tick_interval_ms: u64,
    pub sync_interval_secs: u64,
    pub confirm_actions: bool,
    #[serde(skip)]
    pub debug: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:3000/api".into(),
            user_id: None,
            tick_interval_ms: 1000,
            sync_interval_secs: 30,
            confirm_actions: true,
            debug: false,
        }
    }
}

impl EngineSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = env::var("GOALTIMER_SERVICE_URL") {
            self.service_url = url;
        }
        if let Ok(user) = env::var("GOALTIMER_USER_ID") {
            self.user_id = Some(user);
        }
        self.debug = env::var("GOALTIMER_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: EngineSettings,
}

impl SettingsStore {
    /// Loads `path`, writing defaults there when it does not exist yet.
    /// Environment variables override whatever the file says.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            let defaults = EngineSettings::default();
            persist(&path, &defaults)?;
            defaults
        };
        data.apply_env();

        Ok(Self { path, data })
    }

    pub fn default_path() -> PathBuf {
        env::var_os("GOALTIMER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("goaltimer.json"))
    }

    pub fn engine(&self) -> EngineSettings {
        self.data.clone()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

fn persist(path: &PathBuf, data: &EngineSettings) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(data)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}
