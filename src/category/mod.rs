//! Request categories and their rate-limit clocks.
//!
//! Every outbound call belongs to exactly one category, and each category
//! keeps its own cool-down on the server side. The table is fixed at compile
//! time.

use std::fmt;
use std::time::Duration;

/// A class of remote operation with its own rate-limit clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Puzzle input download.
    InputFetch,
    /// Task page for a specific day.
    TaskPageFetch,
    /// Event overview page.
    EventPageFetch,
    /// Answer submission.
    Submit,
    /// Personal leaderboard page.
    PersonalStats,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 5] = [
        Category::InputFetch,
        Category::TaskPageFetch,
        Category::EventPageFetch,
        Category::Submit,
        Category::PersonalStats,
    ];

    /// Human-readable label used in log output.
    pub fn label(self) -> &'static str {
        match self {
            Category::InputFetch => "input fetch",
            Category::TaskPageFetch => "task page fetch",
            Category::EventPageFetch => "event page fetch",
            Category::Submit => "solution submit",
            Category::PersonalStats => "personal leaderboard",
        }
    }

    /// Stable key under which the category's cool-down is persisted.
    pub fn key(self) -> &'static str {
        match self {
            Category::InputFetch => "INPUT_FETCH",
            Category::TaskPageFetch => "TASKPAGE_FETCH",
            Category::EventPageFetch => "EVENTPAGE_FETCH",
            Category::Submit => "SUBMIT",
            Category::PersonalStats => "PERSONAL_STATS",
        }
    }

    /// Cool-down applied after a call when the server gave no explicit hint.
    pub fn default_cooldown(self) -> Duration {
        let ms = match self {
            Category::InputFetch => 10_000,
            Category::TaskPageFetch => 1_000,
            Category::EventPageFetch => 1_000,
            Category::Submit => 5_000,
            Category::PersonalStats => 5_000,
        };
        Duration::from_millis(ms)
    }

    /// Whether responses in this category can carry an explicit wait hint
    /// that overrides the default cool-down.
    pub fn carries_hint(self) -> bool {
        matches!(self, Category::Submit)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
