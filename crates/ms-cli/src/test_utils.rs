//! Shared test utilities for ms-cli

use crate::progress::{ProgressReporter, ProgressTask};
use crate::prompt::Prompter;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Prompter that replays canned answers and records everything shown
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub output: Vec<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    /// Answers are consumed in order; once exhausted, input reads as closed.
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Whether any printed line contains `needle`
    pub fn said(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn read_line(&mut self, label: &str) -> Result<Option<String>> {
        self.asked.push(label.to_string());
        Ok(self.answers.pop_front())
    }

    fn say(&mut self, text: &str) {
        self.output.push(text.to_string());
    }
}

/// Reporter that records `(label, outcome)` pairs; `None` until finished
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<(String, Option<bool>)>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<(String, Option<bool>)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn start(&self, label: &str) -> Box<dyn ProgressTask> {
        let mut events = self.events.lock().unwrap();
        events.push((label.to_string(), None));
        Box::new(RecordedTask {
            events: Arc::clone(&self.events),
            index: events.len() - 1,
        })
    }
}

struct RecordedTask {
    events: Arc<Mutex<Vec<(String, Option<bool>)>>>,
    index: usize,
}

impl ProgressTask for RecordedTask {
    fn finish(self: Box<Self>, success: bool) {
        self.events.lock().unwrap()[self.index].1 = Some(success);
    }
}
