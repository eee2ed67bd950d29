//! Filter and sort pipeline for board task lists.
//!
//! Pure functions over task slices: given a snapshot's task list, produce
//! the filtered and sorted view a column renderer would display. Nothing
//! here touches the store; callers pass in the tasks from whichever
//! snapshot they hold.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use syncboard_proto::board::{Priority, StatusKind, TagId, Task, UserId};

/// Conjunction of optional task predicates.
///
/// A field left as `None` does not constrain the result. All present
/// predicates must match for a task to pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Keep only tasks in this column.
    pub status: Option<StatusKind>,
    /// Keep only tasks at exactly this priority.
    pub priority: Option<Priority>,
    /// Keep only tasks assigned to this user.
    pub assignee: Option<UserId>,
    /// Keep only tasks carrying this tag.
    pub tag: Option<TagId>,
    /// Keep only tasks due on or after this date.
    pub due_from: Option<NaiveDate>,
    /// Keep only tasks due on or before this date (inclusive of the
    /// whole day).
    pub due_to: Option<NaiveDate>,
    /// Keep only tasks whose title or description contains this text,
    /// case-insensitively.
    pub search: Option<String>,
}

impl TaskFilter {
    /// Returns true when no predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true when the task passes every present predicate.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(assignee) = &self.assignee {
            if task.assignee.as_ref() != Some(assignee) {
                return false;
            }
        }
        if let Some(tag) = self.tag {
            if !task.tags.contains(&tag) {
                return false;
            }
        }
        if let Some(from) = self.due_from {
            let Some(due) = task.due_date else {
                return false;
            };
            let floor = Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN));
            if due < floor {
                return false;
            }
        }
        if let Some(to) = self.due_to {
            let Some(due) = task.due_date else {
                return false;
            };
            // Inclusive of the entire end day.
            let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
                .unwrap_or(NaiveTime::MIN);
            let ceiling = Utc.from_utc_datetime(&to.and_time(end_of_day));
            if due > ceiling {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

/// Applies a filter to a task slice, preserving input order.
#[must_use]
pub fn filter_tasks<'a>(tasks: &'a [Task], filter: &TaskFilter) -> Vec<&'a Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

/// Field a task list can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Lexicographic by title.
    Title,
    /// Column order as laid out on the board.
    Status,
    /// Priority, low to high when ascending.
    Priority,
    /// Due date; tasks without one sort last when ascending.
    DueDate,
    /// Creation timestamp.
    CreatedAt,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Rank of a status kind in board column order.
fn status_rank(kind: StatusKind) -> usize {
    StatusKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(StatusKind::ALL.len())
}

/// Sorts a filtered task view in place.
///
/// The sort is stable: tasks that compare equal under the key keep their
/// relative order from the input. `Descending` reverses the comparison,
/// which for due dates puts tasks without one first.
pub fn sort_tasks(tasks: &mut [&Task], key: SortKey, direction: SortDirection) {
    tasks.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::Status => status_rank(a.status).cmp(&status_rank(b.status)),
            SortKey::Priority => a.priority.cmp(&b.priority),
            SortKey::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            },
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}
