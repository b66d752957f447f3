// src/models/paper.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{question::QuestionType, record::Record, user::User};

/// Question ids of a paper, grouped by type. Order inside each list is the
/// order of presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperQuestions {
    #[serde(default)]
    pub single: Vec<i64>,
    #[serde(default)]
    pub multiple: Vec<i64>,
    #[serde(default)]
    pub judge: Vec<i64>,
}

impl PaperQuestions {
    pub fn ids_of(&self, question_type: QuestionType) -> &[i64] {
        match question_type {
            QuestionType::Single => &self.single,
            QuestionType::Multiple => &self.multiple,
            QuestionType::Judge => &self.judge,
        }
    }

    /// All ids in presentation order: single, then multiple, then judge.
    pub fn ordered_ids(&self) -> Vec<i64> {
        QuestionType::ALL
            .iter()
            .flat_map(|t| self.ids_of(*t).iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.single.len() + self.multiple.len() + self.judge.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Represents the 'papers' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub id: i64,
    pub name: String,
    pub questions: PaperQuestions,

    /// Raw scoring rules as authored. Read through `services::rules::resolve`,
    /// never directly, since the stored shape is not trusted.
    pub rules: serde_json::Value,

    pub published: bool,
    pub target_groups: Vec<i64>,
    pub target_users: Vec<i64>,
    pub deadline: Option<DateTime<Utc>>,

    /// Start of the current publish cycle.
    pub publish_date: Option<DateTime<Utc>>,
}

impl Paper {
    pub fn is_deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Published and not past its deadline.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.published && !self.is_deadline_passed(now)
    }

    pub fn targets(&self, user: &User) -> bool {
        let by_group = user
            .group_id
            .is_some_and(|group_id| self.target_groups.contains(&group_id));
        by_group || self.target_users.contains(&user.id)
    }

    /// Whether something that started at `started_at` belongs to an earlier
    /// publish cycle.
    pub fn predates_cycle(&self, started_at: DateTime<Utc>) -> bool {
        self.publish_date.is_some_and(|p| started_at < p)
    }

    /// Whether `record` was submitted in the current publish cycle and so
    /// blocks another attempt.
    pub fn is_completed_by(&self, record: &Record) -> bool {
        match self.publish_date {
            Some(publish_date) => record.submit_time >= publish_date,
            None => true,
        }
    }
}

/// Resolved scoring policy for one question type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub full_score: f64,
    pub partial_score: f64,
    pub time_limit_seconds: i64,
}

/// Policy for every question type. Always complete, see `services::rules`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleMap {
    pub single: RuleEntry,
    pub multiple: RuleEntry,
    pub judge: RuleEntry,
}

impl RuleMap {
    pub fn get(&self, question_type: QuestionType) -> &RuleEntry {
        match question_type {
            QuestionType::Single => &self.single,
            QuestionType::Multiple => &self.multiple,
            QuestionType::Judge => &self.judge,
        }
    }

    pub fn get_mut(&mut self, question_type: QuestionType) -> &mut RuleEntry {
        match question_type {
            QuestionType::Single => &mut self.single,
            QuestionType::Multiple => &mut self.multiple,
            QuestionType::Judge => &mut self.judge,
        }
    }
}

/// Paper metadata shipped with the exam payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaperInfo {
    pub id: i64,
    pub name: String,
    pub rules: RuleMap,
    pub deadline: Option<DateTime<Utc>>,
    pub publish_date: Option<DateTime<Utc>>,
}

/// Row of the "papers available to me" listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: i64,
    pub name: String,
    pub question_count: usize,
    pub deadline: Option<DateTime<Utc>>,
    pub publish_date: Option<DateTime<Utc>>,
    pub expired: bool,
    pub completed: bool,
}
