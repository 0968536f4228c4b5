//! Room-scoped bounded message log.

use std::collections::{HashMap, VecDeque};

use crate::domain::{LogEntry, RoomId};

/// Default maximum number of entries kept per room.
pub const DEFAULT_MAX_LOG_SIZE: usize = 100;

/// Per-room FIFO logs. `None` keys the global scope.
///
/// A room's log is created on its first entry and never removed; once a log
/// holds `max_entries`, each new entry evicts the oldest one.
#[derive(Debug)]
pub struct MessageHistory {
    max_entries: usize,
    logs: HashMap<Option<RoomId>, VecDeque<LogEntry>>,
}

impl MessageHistory {
    /// A bound of zero is raised to one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            logs: HashMap::new(),
        }
    }

    pub fn record(&mut self, entry: LogEntry) {
        let log = self.logs.entry(entry.room.clone()).or_default();
        log.push_back(entry);
        while log.len() > self.max_entries {
            log.pop_front();
        }
    }

    /// Copy of one scope's log, oldest first. Empty if nothing was recorded.
    pub fn entries(&self, scope: &Option<RoomId>) -> Vec<LogEntry> {
        self.logs
            .get(scope)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.logs.values().all(VecDeque::is_empty)
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> Option<RoomId> {
        RoomId::parse_optional("lobby")
    }

    #[test]
    fn test_bound_evicts_oldest_first() {
        // テスト項目: 上限 3 で 5 件記録すると 3, 4, 5 件目が記録順に残る
        // given (前提条件):
        let mut history = MessageHistory::new(3);

        // when (操作):
        for n in 1..=5 {
            history.record(LogEntry::data(format!("message {}", n), lobby(), n));
        }

        // then (期待する結果):
        let contents: Vec<String> = history
            .entries(&lobby())
            .into_iter()
            .map(|entry| entry.content)
            .collect();
        assert_eq!(contents, vec!["message 3", "message 4", "message 5"]);
    }

    #[test]
    fn test_scopes_are_independent() {
        // テスト項目: ルームごと・グローバルの履歴は互いに影響しない
        // given (前提条件):
        let mut history = MessageHistory::new(1);

        // when (操作):
        history.record(LogEntry::data("room", lobby(), 1));
        history.record(LogEntry::data("global", None, 2));

        // then (期待する結果):
        assert_eq!(history.entries(&lobby())[0].content, "room");
        assert_eq!(history.entries(&None)[0].content, "global");
    }

    #[test]
    fn test_unknown_scope_is_empty() {
        // テスト項目: 記録のないルームの履歴は空
        // given (前提条件):
        let history = MessageHistory::default();

        // when (操作):
        let entries = history.entries(&lobby());

        // then (期待する結果):
        assert!(entries.is_empty());
        assert!(history.is_empty());
    }

    #[test]
    fn test_zero_bound_is_raised_to_one() {
        // テスト項目: 上限 0 は 1 として扱われる
        // given (前提条件):
        let mut history = MessageHistory::new(0);

        // when (操作):
        history.record(LogEntry::data("a", None, 1));
        history.record(LogEntry::data("b", None, 2));

        // then (期待する結果):
        assert_eq!(history.entries(&None).len(), 1);
        assert_eq!(history.entries(&None)[0].content, "b");
    }
}
