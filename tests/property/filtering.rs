//! Property-based tests for the filter/sort pipeline.
//!
//! Uses proptest to verify:
//! 1. Filtering with several predicates equals intersecting the results
//!    of each predicate applied alone.
//! 2. Filtering preserves the relative order of the input.
//! 3. Sorting is a permutation of its input and is ordered under the key.

use proptest::prelude::*;
use syncboard::filter::{SortDirection, SortKey, TaskFilter, filter_tasks, sort_tasks};
use syncboard_proto::board::{BoardId, Priority, StatusKind, Task, TaskId, UserId};
use uuid::Uuid;

fn arb_status_kind() -> impl Strategy<Value = StatusKind> {
    prop::sample::select(StatusKind::ALL.to_vec())
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop::sample::select(vec![
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ])
}

/// Small assignee pool so filters actually match some tasks.
fn arb_assignee() -> impl Strategy<Value = Option<UserId>> {
    prop::option::of(prop::sample::select(vec!["alice", "bob", "carol"]).prop_map(UserId::new))
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        any::<u128>(),
        "[a-z ]{0,24}",
        arb_status_kind(),
        arb_priority(),
        arb_assignee(),
        any::<u32>(),
        any::<u64>(),
    )
        .prop_map(|(id, title, status, priority, assignee, order, created_at)| Task {
            id: TaskId::from_uuid(Uuid::from_u128(id)),
            board_id: BoardId::from_uuid(Uuid::from_u128(1)),
            title,
            description: None,
            status,
            priority,
            assignee,
            order,
            due_date: None,
            tags: Vec::new(),
            created_at,
        })
}

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_task(), 0..32)
}

fn ids(tasks: &[&Task]) -> Vec<TaskId> {
    tasks.iter().map(|t| t.id).collect()
}

proptest! {
    #[test]
    fn conjunction_equals_intersection(
        tasks in arb_tasks(),
        status in arb_status_kind(),
        priority in arb_priority(),
    ) {
        let combined = TaskFilter {
            status: Some(status),
            priority: Some(priority),
            ..Default::default()
        };
        let status_only = TaskFilter { status: Some(status), ..Default::default() };
        let priority_only = TaskFilter { priority: Some(priority), ..Default::default() };

        let combined_ids = ids(&filter_tasks(&tasks, &combined));
        let status_ids = ids(&filter_tasks(&tasks, &status_only));
        let priority_ids = ids(&filter_tasks(&tasks, &priority_only));

        let intersection: Vec<TaskId> = status_ids
            .iter()
            .copied()
            .filter(|id| priority_ids.contains(id))
            .collect();
        prop_assert_eq!(combined_ids, intersection);
    }

    #[test]
    fn filtering_preserves_relative_order(tasks in arb_tasks(), status in arb_status_kind()) {
        let filter = TaskFilter { status: Some(status), ..Default::default() };
        let filtered = ids(&filter_tasks(&tasks, &filter));

        // The filtered ids appear in the same order as in the input.
        let expected: Vec<TaskId> = tasks
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.id)
            .collect();
        prop_assert_eq!(filtered, expected);
    }

    #[test]
    fn empty_filter_is_identity(tasks in arb_tasks()) {
        let out = filter_tasks(&tasks, &TaskFilter::default());
        prop_assert_eq!(out.len(), tasks.len());
        let input_ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        prop_assert_eq!(ids(&out), input_ids);
    }

    #[test]
    fn sort_is_a_permutation(tasks in arb_tasks()) {
        let mut view: Vec<&Task> = tasks.iter().collect();
        sort_tasks(&mut view, SortKey::CreatedAt, SortDirection::Ascending);

        prop_assert_eq!(view.len(), tasks.len());
        let mut sorted_ids = ids(&view);
        sorted_ids.sort_by_key(|id| *id.as_uuid());
        let mut input_ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        input_ids.sort_by_key(|id| *id.as_uuid());
        prop_assert_eq!(sorted_ids, input_ids);
    }

    #[test]
    fn sort_orders_by_created_at(tasks in arb_tasks()) {
        let mut view: Vec<&Task> = tasks.iter().collect();
        sort_tasks(&mut view, SortKey::CreatedAt, SortDirection::Ascending);
        for pair in view.windows(2) {
            prop_assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn descending_reverses_ascending_for_distinct_keys(tasks in arb_tasks()) {
        // Make keys distinct so reversal is exact.
        let tasks: Vec<Task> = tasks
            .into_iter()
            .enumerate()
            .map(|(i, mut t)| {
                t.created_at = i as u64;
                t
            })
            .collect();

        let mut ascending: Vec<&Task> = tasks.iter().collect();
        sort_tasks(&mut ascending, SortKey::CreatedAt, SortDirection::Ascending);
        let mut descending: Vec<&Task> = tasks.iter().collect();
        sort_tasks(&mut descending, SortKey::CreatedAt, SortDirection::Descending);

        let mut reversed = ids(&descending);
        reversed.reverse();
        prop_assert_eq!(ids(&ascending), reversed);
    }
}
