//! Per-student history of recently served questions.
//!
//! Within a session, uniqueness is enforced by the session itself. This
//! tracker only feeds the soft preferences: questions a student saw in recent
//! sessions, and a global least-recently-used clock used to rotate the pool.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::RwLock;

use crate::config::HistoryConfig;
use crate::types::{Question, QuestionId, StudentId};

/// Bounded history of one student.
#[derive(Debug, Default)]
struct StudentHistory {
    recent: VecDeque<QuestionId>,
}

/// Global serving clock, one tick per served question.
#[derive(Debug, Default)]
struct UsageClock {
    tick: u64,
    last_used: HashMap<QuestionId, u64>,
}

/// Tracks served questions per student and globally.
#[derive(Debug)]
pub struct AntiRepetitionTracker {
    capacity: usize,
    students: RwLock<HashMap<StudentId, StudentHistory>>,
    usage: RwLock<UsageClock>,
}

impl AntiRepetitionTracker {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            capacity: config.capacity,
            students: RwLock::new(HashMap::new()),
            usage: RwLock::new(UsageClock::default()),
        }
    }

    /// Record that `question` was served to `student`.
    pub async fn record_served(&self, student: &StudentId, question: &Question) {
        {
            let mut students = self.students.write().await;
            let history = students.entry(student.clone()).or_default();
            history.recent.push_back(question.id.clone());
            while history.recent.len() > self.capacity {
                history.recent.pop_front();
            }
        }

        let mut usage = self.usage.write().await;
        usage.tick += 1;
        let tick = usage.tick;
        usage.last_used.insert(question.id.clone(), tick);
    }

    /// Question ids served to `student` within the retained window.
    pub async fn recent_ids(&self, student: &StudentId) -> HashSet<QuestionId> {
        let students = self.students.read().await;
        students
            .get(student)
            .map(|h| h.recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Global last-served tick for each id; never-served ids map to 0.
    pub async fn last_used(&self, ids: &[QuestionId]) -> HashMap<QuestionId, u64> {
        let usage = self.usage.read().await;
        ids.iter()
            .map(|id| (id.clone(), usage.last_used.get(id).copied().unwrap_or(0)))
            .collect()
    }
}

impl Default for AntiRepetitionTracker {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}
