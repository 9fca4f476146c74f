//! Run State Tracking
//!
//! Persists the date of the last successful run so a scheduled invocation
//! can skip a day that was already processed.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    last_run: NaiveDate,
}

pub struct RunState {
    path: PathBuf,
}

impl RunState {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn save_run(&self, date: NaiveDate) -> Result<()> {
        let json = serde_json::to_string_pretty(&StateFile { last_run: date })?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write run state to {:?}", self.path))?;
        Ok(())
    }

    /// Date of the last successful run; None when missing or unreadable.
    pub fn last_run_date(&self) -> Option<NaiveDate> {
        let content = fs::read_to_string(&self.path).ok()?;
        let state: StateFile = serde_json::from_str(&content).ok()?;
        Some(state.last_run)
    }

    pub fn should_run_today(&self) -> bool {
        self.last_run_date() != Some(Local::now().date_naive())
    }
}
