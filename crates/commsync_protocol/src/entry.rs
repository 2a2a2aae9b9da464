//! Calendar entries and calendar queries.

use crate::ids::{EntryId, ThreadId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A filter narrowing which entries a calendar query returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarFilter {
    /// Exclude deleted entries.
    NotDeleted,
    /// Only entries in these threads.
    ThreadList {
        /// Allowed threads.
        #[serde(rename = "threadIDs")]
        thread_ids: Vec<ThreadId>,
    },
}

/// The calendar view the client currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarQuery {
    /// `"home"` or the id of a thread the viewer can see.
    #[serde(rename = "navID")]
    pub nav_id: String,
    /// First day of the range (`YYYY-MM-DD`, inclusive).
    pub start_date: String,
    /// Last day of the range (`YYYY-MM-DD`, inclusive).
    pub end_date: String,
    /// Additional filters.
    #[serde(default)]
    pub filters: Vec<CalendarFilter>,
}

impl CalendarQuery {
    /// Creates a home query over a date range that hides deleted entries.
    pub fn home(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            nav_id: crate::HOME_NAV_ID.to_string(),
            start_date: start_date.into(),
            end_date: end_date.into(),
            filters: vec![CalendarFilter::NotDeleted],
        }
    }

    /// Returns true if `entry` falls in this query's range and filters.
    pub fn matches(&self, entry: &RawEntryInfo) -> bool {
        let date = entry.date();
        if date.as_str() < self.start_date.as_str() || date.as_str() > self.end_date.as_str() {
            return false;
        }
        self.filters.iter().all(|filter| match filter {
            CalendarFilter::NotDeleted => !entry.deleted,
            CalendarFilter::ThreadList { thread_ids } => thread_ids.contains(&entry.thread_id),
        })
    }
}

/// A calendar entry as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntryInfo {
    /// Entry id.
    pub id: EntryId,
    /// Owning thread.
    #[serde(rename = "threadID")]
    pub thread_id: ThreadId,
    /// Entry text.
    pub text: String,
    /// Calendar year.
    pub year: u16,
    /// Calendar month (1-12).
    pub month: u8,
    /// Day of month (1-31).
    pub day: u8,
    /// Creation time.
    pub creation_time: Timestamp,
    /// Author.
    #[serde(rename = "creatorID")]
    pub creator_id: UserId,
    /// Soft-deletion flag.
    pub deleted: bool,
}

impl RawEntryInfo {
    /// Returns the entry date as `YYYY-MM-DD`.
    pub fn date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}
