//! Query and filter layer
//!
//! A [`LogFilter`] names the sessions and severity levels a caller wants.
//! [`Predicate`] is its compiled form, with redundant clauses dropped.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use logvault_core::{LogLevel, MessageRecord, NetworkTaskRecord, RequestState, SessionId};

/// Sessions and severity levels to include
///
/// An empty session set means every session. The default filter selects
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub sessions: BTreeSet<SessionId>,
    pub levels: BTreeSet<LogLevel>,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            sessions: BTreeSet::new(),
            levels: LogLevel::ALL.into_iter().collect(),
        }
    }
}

impl LogFilter {
    /// Everything in the store
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given sessions (all levels)
    pub fn sessions(sessions: impl IntoIterator<Item = SessionId>) -> Self {
        Self {
            sessions: sessions.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.sessions.insert(session);
        self
    }

    /// Compile into a predicate
    pub fn predicate(&self) -> Predicate {
        Predicate {
            sessions: (!self.sessions.is_empty()).then(|| self.sessions.clone()),
            levels: (self.levels.len() < LogLevel::ALL.len()).then(|| self.levels.clone()),
        }
    }

    /// Human-readable label for the level selection
    pub fn level_summary(&self) -> String {
        level_summary(&self.levels)
    }
}

/// A compiled filter; `None` clauses impose no restriction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    sessions: Option<BTreeSet<SessionId>>,
    levels: Option<BTreeSet<LogLevel>>,
}

impl Predicate {
    pub fn has_session_clause(&self) -> bool {
        self.sessions.is_some()
    }

    pub fn has_level_clause(&self) -> bool {
        self.levels.is_some()
    }

    pub fn matches_session(&self, session: &SessionId) -> bool {
        self.sessions.as_ref().is_none_or(|s| s.contains(session))
    }

    pub fn matches_level(&self, level: LogLevel) -> bool {
        self.levels.as_ref().is_none_or(|l| l.contains(&level))
    }

    pub fn matches_message(&self, message: &MessageRecord) -> bool {
        self.matches_session(&message.session) && self.matches_level(message.level)
    }

    /// Tasks are filtered by the level of their lifecycle message
    pub fn matches_task(&self, task: &NetworkTaskRecord) -> bool {
        self.matches_session(&task.session) && self.matches_level(task_level(task))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses = Vec::new();
        if let Some(sessions) = &self.sessions {
            let ids: Vec<String> = sessions.iter().map(|s| s.to_string()).collect();
            clauses.push(format!("session IN ({})", ids.join(", ")));
        }
        if let Some(levels) = &self.levels {
            let raws: Vec<String> = levels.iter().map(|l| l.raw().to_string()).collect();
            clauses.push(format!("level IN ({})", raws.join(", ")));
        }
        if clauses.is_empty() {
            f.write_str("TRUE")
        } else {
            f.write_str(&clauses.join(" AND "))
        }
    }
}

/// Severity of a task's lifecycle message
pub fn task_level(task: &NetworkTaskRecord) -> LogLevel {
    match task.state {
        RequestState::Failure => LogLevel::Error,
        RequestState::Pending | RequestState::Success => LogLevel::Debug,
    }
}

/// Human-readable label for a level selection
pub fn level_summary(levels: &BTreeSet<LogLevel>) -> String {
    use LogLevel::*;

    let is = |set: &[LogLevel]| levels.len() == set.len() && set.iter().all(|l| levels.contains(l));

    if levels.is_empty() {
        return "–".to_string();
    }
    if levels.len() == LogLevel::ALL.len() {
        return "All".to_string();
    }
    if levels.len() == 1 {
        if let Some(level) = levels.first() {
            return level.title().to_string();
        }
    }
    if is(&[Error, Critical]) {
        return "Errors".to_string();
    }
    if is(&[Warning, Error, Critical]) {
        return "Warnings & Errors".to_string();
    }
    levels.len().to_string()
}
