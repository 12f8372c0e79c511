use std::collections::VecDeque;

/// Number of entries retained by [`BattleLog::default`].
pub const DEFAULT_LOG_CAPACITY: usize = 20;

/// Category used to colour and prefix a narration line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Damage dealt and kills.
    Damage,
    /// Slow effects and support links.
    Effect,
    /// Phase changes, construction and outcome.
    System,
    /// Rejected player intents and breaches.
    Warning,
    /// Income.
    Money,
}

impl LogCategory {
    /// Short prefix shown in front of the narrated text.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Damage => "HIT",
            Self::Effect => "EFFECT",
            Self::System => "SYSTEM",
            Self::Warning => "!",
            Self::Money => "+$",
        }
    }
}

/// Single narrated line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Category of the line.
    pub category: LogCategory,
    /// Human-readable text.
    pub text: String,
}

/// Bounded history of narrated events, oldest first.
#[derive(Clone, Debug)]
pub struct BattleLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for BattleLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl BattleLog {
    /// Creates an empty log that keeps at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Appends a line, evicting the oldest one when full.
    pub fn push(&mut self, category: LogCategory, text: impl Into<String>) {
        if self.entries.len() >= self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            category,
            text: text.into(),
        });
    }

    /// Iterator over the retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Most recent entry, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
