//! Task tree manager behaviour against the in-memory gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tasknest::gateway::{GatewayError, MemoryGateway};
use tasknest::models::*;
use tasknest::tree::{Draft, TaskTreeManager};
use tasknest::Error;

fn alice() -> Identity {
    Identity {
        user_id: 1,
        username: "alice".to_string(),
    }
}

fn manager(gateway: &MemoryGateway) -> Arc<TaskTreeManager> {
    Arc::new(TaskTreeManager::new(Arc::new(gateway.clone()), Some(alice())))
}

/// List 1 "Groceries" with a single root task 10 "Buy milk", already loaded.
async fn groceries() -> (MemoryGateway, Arc<TaskTreeManager>) {
    let gateway = MemoryGateway::signed_in(alice());
    gateway.seed_list(1, "Groceries");
    gateway.seed_task(1, None, 10, "Buy milk");
    let tree = manager(&gateway);
    tree.load(1).await.expect("Failed to load groceries");
    (gateway, tree)
}

mod load {
    use super::*;

    #[tokio::test]
    async fn test_load_builds_nested_forest() {
        let gateway = MemoryGateway::signed_in(alice());
        gateway.seed_list(1, "Groceries");
        gateway.seed_task(1, None, 10, "Buy milk");
        gateway.seed_task(1, Some(10), 11, "2% milk");
        gateway.seed_task(1, Some(11), 12, "Check the date");
        gateway.seed_task(1, None, 13, "Bake bread");
        let tree = manager(&gateway);

        tree.load(1).await.unwrap();

        assert_eq!(tree.loaded_list(), Some(1));
        assert_eq!(tree.task_count(), 4);
        assert_eq!(tree.depth_of(12), Some(2));
        assert_eq!(tree.find_parent_of(12).unwrap().id, 11);
        assert_eq!(tree.children_of(None).unwrap(), vec![10, 13]);

        let flat: Vec<(TaskId, usize)> = tree.flatten().iter().map(|(t, d)| (t.id, *d)).collect();
        assert_eq!(flat, vec![(10, 0), (11, 1), (12, 2), (13, 0)]);
    }

    #[tokio::test]
    async fn test_load_twice_is_idempotent() {
        let (_gateway, tree) = groceries().await;
        let first = tree.snapshot();
        tree.load(1).await.unwrap();
        assert_eq!(tree.snapshot(), first);
    }

    #[tokio::test]
    async fn test_load_unknown_list_keeps_previous_forest() {
        let (_gateway, tree) = groceries().await;
        let result = tree.load(404).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(tree.loaded_list(), Some(1));
        assert!(tree.find_by_id(10).is_some());
    }

    #[tokio::test]
    async fn test_load_other_users_list_is_not_found() {
        let gateway = MemoryGateway::signed_in(Identity {
            user_id: 2,
            username: "bob".to_string(),
        });
        gateway.seed_list(5, "Bob's");
        gateway.sign_in(alice());
        let tree = manager(&gateway);

        assert!(matches!(tree.load(5).await, Err(Error::NotFound(_))));
        assert_eq!(tree.loaded_list(), None);
    }

    #[tokio::test]
    async fn test_load_without_identity_is_unauthenticated() {
        let gateway = MemoryGateway::signed_in(alice());
        gateway.seed_list(1, "Groceries");
        let tree = TaskTreeManager::new(Arc::new(gateway.clone()), None);

        assert_eq!(tree.load(1).await, Err(Error::Unauthenticated));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthenticated() {
        let (gateway, tree) = groceries().await;
        gateway.sign_out();
        assert_eq!(tree.load(1).await, Err(Error::Unauthenticated));
    }

    #[tokio::test]
    async fn test_mutation_before_load_fails() {
        let gateway = MemoryGateway::signed_in(alice());
        let tree = manager(&gateway);
        assert_eq!(tree.create_task(None, "Eggs").await, Err(Error::NoListLoaded));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_unload_clears_everything() {
        let (_gateway, tree) = groceries().await;
        tree.unload();
        assert_eq!(tree.loaded_list(), None);
        assert!(tree.snapshot().is_empty());
        assert_eq!(tree.task_count(), 0);
        assert!(tree.find_by_id(10).is_none());
    }
}

mod create_task {
    use super::*;

    #[tokio::test]
    async fn test_create_subtask_under_root() {
        let (_gateway, tree) = groceries().await;

        let task = tree.create_task(Some(10), "2% milk").await.unwrap();

        assert_eq!(task.id, 11);
        assert_eq!(task.parent_id, Some(10));
        assert_eq!(task.list_id, 1);
        assert_eq!(tree.depth_of(11), Some(1));
        assert_eq!(tree.children_of(Some(10)).unwrap(), vec![11]);
    }

    #[tokio::test]
    async fn test_create_root_appends_last() {
        let (_gateway, tree) = groceries().await;
        let task = tree.create_task(None, "Bake bread").await.unwrap();
        assert_eq!(task.parent_id, None);
        assert_eq!(tree.children_of(None).unwrap(), vec![10, task.id]);
    }

    #[tokio::test]
    async fn test_create_trims_name() {
        let (_gateway, tree) = groceries().await;
        let task = tree.create_task(None, "  Eggs  ").await.unwrap();
        assert_eq!(task.name, "Eggs");
    }

    #[tokio::test]
    async fn test_whitespace_name_never_reaches_gateway() {
        let (gateway, tree) = groceries().await;
        let before = tree.snapshot();
        let calls = gateway.calls();

        assert_eq!(tree.create_task(None, "   ").await, Err(Error::InvalidName));

        assert_eq!(tree.snapshot(), before);
        assert_eq!(gateway.calls(), calls);
    }

    #[tokio::test]
    async fn test_unknown_parent_is_rejected_locally() {
        let (gateway, tree) = groceries().await;
        let calls = gateway.calls();

        assert_eq!(
            tree.create_task(Some(404), "orphan").await,
            Err(Error::ParentNotFound(404))
        );
        assert_eq!(gateway.calls(), calls);
    }

    #[tokio::test]
    async fn test_parent_deleted_on_server_maps_to_parent_not_found() {
        let (gateway, tree) = groceries().await;
        gateway.fail_next(GatewayError::NotFound("Parent task 10 not found".into()));

        assert_eq!(
            tree.create_task(Some(10), "2% milk").await,
            Err(Error::ParentNotFound(10))
        );
    }

    #[tokio::test]
    async fn test_failed_create_leaves_forest_unchanged() {
        let (gateway, tree) = groceries().await;
        let before = tree.snapshot();
        gateway.fail_next(GatewayError::Server("Internal server error".into()));

        let result = tree.create_task(Some(10), "2% milk").await;

        assert!(matches!(result, Err(Error::SyncFailure(_))));
        assert_eq!(tree.snapshot(), before);
        assert_eq!(tree.pending(), None);
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out() {
        let gateway = MemoryGateway::signed_in(alice());
        gateway.seed_list(1, "Groceries");
        let tree = TaskTreeManager::new(Arc::new(gateway.clone()), Some(alice()))
            .with_timeout(Duration::from_millis(50));
        tree.load(1).await.unwrap();
        gateway.set_latency(Duration::from_millis(500));

        let result = tree.create_task(None, "Eggs").await;

        assert_eq!(result, Err(Error::Timeout(Duration::from_millis(50))));
        assert!(tree.snapshot().is_empty());
        assert_eq!(tree.pending(), None);
    }
}

mod drafts {
    use super::*;

    #[tokio::test]
    async fn test_blank_draft_is_not_persisted() {
        let (gateway, tree) = groceries().await;
        let calls = gateway.calls();
        let mut draft = Draft::child_of(10);
        draft.set_text("  ");

        assert_eq!(tree.submit_draft(draft).await, Err(Error::InvalidName));
        assert_eq!(gateway.calls(), calls);
        assert_eq!(tree.task_count(), 1);
    }

    #[tokio::test]
    async fn test_draft_is_persisted_under_its_parent() {
        let (_gateway, tree) = groceries().await;
        let mut draft = Draft::child_of(10);
        draft.push_str("Oat");
        draft.push_str(" milk");

        let task = tree.submit_draft(draft).await.unwrap();

        assert_eq!(task.name, "Oat milk");
        assert_eq!(tree.find_parent_of(task.id).unwrap().id, 10);
    }
}

mod update_task {
    use super::*;

    #[tokio::test]
    async fn test_rename_task() {
        let (gateway, tree) = groceries().await;
        let task = tree.rename_task(10, "Buy oat milk").await.unwrap();
        assert_eq!(task.name, "Buy oat milk");
        assert_eq!(tree.find_by_id(10).unwrap().name, "Buy oat milk");
        assert_eq!(gateway.stored_forest(1).unwrap()[0].task.name, "Buy oat milk");
    }

    #[tokio::test]
    async fn test_rename_to_blank_keeps_prior_name() {
        let (_gateway, tree) = groceries().await;
        assert_eq!(tree.rename_task(10, "").await, Err(Error::InvalidName));
        assert_eq!(tree.find_by_id(10).unwrap().name, "Buy milk");
    }

    #[tokio::test]
    async fn test_set_and_clear_date() {
        let (_gateway, tree) = groceries().await;
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let task = tree.set_date(10, Some(date)).await.unwrap();
        assert_eq!(task.date, Some(date));

        let task = tree.set_date(10, None).await.unwrap();
        assert_eq!(task.date, None);
        assert_eq!(tree.find_by_id(10).unwrap().date, None);
    }

    #[tokio::test]
    async fn test_toggle_does_not_cascade() {
        let (gateway, tree) = groceries().await;
        gateway.seed_task(1, Some(10), 11, "2% milk");
        tree.load(1).await.unwrap();

        let task = tree.toggle_completion(10).await.unwrap();
        assert!(task.is_completed);
        assert!(!tree.find_by_id(11).unwrap().is_completed);

        let task = tree.toggle_completion(10).await.unwrap();
        assert!(!task.is_completed);
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_not_found() {
        let (_gateway, tree) = groceries().await;
        assert!(matches!(tree.toggle_completion(404).await, Err(Error::NotFound(_))));
        assert!(matches!(tree.rename_task(404, "x").await, Err(Error::NotFound(_))));
    }
}

mod delete_task {
    use super::*;

    #[tokio::test]
    async fn test_delete_removes_subtree() {
        let (gateway, tree) = groceries().await;
        tree.create_task(Some(10), "2% milk").await.unwrap();

        tree.delete_task(10).await.unwrap();

        assert!(tree.find_by_id(10).is_none());
        assert!(tree.find_by_id(11).is_none());
        assert_eq!(tree.task_count(), 0);
        assert!(gateway.stored_forest(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_subtask_keeps_parent() {
        let (_gateway, tree) = groceries().await;
        let child = tree.create_task(Some(10), "2% milk").await.unwrap();

        tree.delete_task(child.id).await.unwrap();

        assert!(tree.find_by_id(10).is_some());
        assert!(tree.children_of(Some(10)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_task() {
        let (gateway, tree) = groceries().await;
        let calls = gateway.calls();
        assert!(matches!(tree.delete_task(404).await, Err(Error::NotFound(_))));
        assert_eq!(gateway.calls(), calls);
    }
}

mod move_task {
    use super::*;

    async fn two_lists() -> (MemoryGateway, Arc<TaskTreeManager>) {
        let gateway = MemoryGateway::signed_in(alice());
        gateway.seed_list(1, "Work");
        gateway.seed_list(2, "Home");
        gateway.seed_task(1, None, 20, "Tax return");
        gateway.seed_task(1, Some(20), 21, "Find receipts");
        let tree = manager(&gateway);
        tree.load(1).await.unwrap();
        (gateway, tree)
    }

    #[tokio::test]
    async fn test_move_root_to_other_list() {
        let (gateway, tree) = two_lists().await;

        tree.move_task(20, 2).await.unwrap();

        assert!(tree.find_by_id(20).is_none());
        assert!(tree.find_by_id(21).is_none());
        tree.load(1).await.unwrap();
        assert!(tree.find_by_id(20).is_none());

        let target = gateway.stored_forest(2).unwrap();
        assert_eq!(target[0].task.id, 20);
        assert_eq!(target[0].subtasks[0].task.id, 21);
    }

    #[tokio::test]
    async fn test_moved_task_shows_up_in_target() {
        let (_gateway, tree) = two_lists().await;
        tree.move_task(20, 2).await.unwrap();

        tree.load(2).await.unwrap();

        let task = tree.find_by_id(20).unwrap();
        assert_eq!(task.list_id, 2);
        assert_eq!(task.parent_id, None);
        assert_eq!(tree.depth_of(21), Some(1));
    }

    #[tokio::test]
    async fn test_moving_subtask_is_rejected_and_retry_is_safe() {
        let (gateway, tree) = two_lists().await;
        let before = tree.snapshot();
        let calls = gateway.calls();

        for _ in 0..2 {
            assert!(matches!(tree.move_task(21, 2).await, Err(Error::InvalidMove(_))));
        }

        assert_eq!(tree.snapshot(), before);
        assert_eq!(gateway.calls(), calls);
    }

    #[tokio::test]
    async fn test_move_to_same_list_is_invalid() {
        let (_gateway, tree) = two_lists().await;
        assert!(matches!(tree.move_task(20, 1).await, Err(Error::InvalidMove(_))));
    }

    #[tokio::test]
    async fn test_move_to_unknown_list_keeps_task() {
        let (_gateway, tree) = two_lists().await;
        assert!(matches!(tree.move_task(20, 404).await, Err(Error::NotFound(_))));
        assert!(tree.find_by_id(20).is_some());
    }
}

mod reorder_sibling {
    use super::*;

    async fn three_roots() -> (MemoryGateway, Arc<TaskTreeManager>) {
        let gateway = MemoryGateway::signed_in(alice());
        gateway.seed_list(1, "Groceries");
        gateway.seed_task(1, None, 1, "Milk");
        gateway.seed_task(1, None, 2, "Bread");
        gateway.seed_task(1, None, 3, "Eggs");
        gateway.seed_task(1, Some(1), 4, "Whole");
        gateway.seed_task(1, Some(1), 5, "Skim");
        let tree = manager(&gateway);
        tree.load(1).await.unwrap();
        (gateway, tree)
    }

    #[tokio::test]
    async fn test_reorder_roots() {
        let (gateway, tree) = three_roots().await;

        assert_eq!(tree.reorder_sibling(3, 0).await.unwrap(), 0);

        assert_eq!(tree.children_of(None).unwrap(), vec![3, 1, 2]);
        let stored: Vec<TaskId> = gateway
            .stored_forest(1)
            .unwrap()
            .iter()
            .map(|n| n.task.id)
            .collect();
        assert_eq!(stored, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_reorder_clamps_and_keeps_sibling_set() {
        let (_gateway, tree) = three_roots().await;

        assert_eq!(tree.reorder_sibling(1, 99).await.unwrap(), 2);

        let roots = tree.children_of(None).unwrap();
        assert_eq!(roots, vec![2, 3, 1]);
        let mut sorted = roots.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 3]);
        assert_eq!(tree.children_of(Some(1)).unwrap(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_reorder_nested_siblings() {
        let (_gateway, tree) = three_roots().await;
        tree.reorder_sibling(5, 0).await.unwrap();
        assert_eq!(tree.children_of(Some(1)).unwrap(), vec![5, 4]);
        assert_eq!(tree.children_of(None).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reorder_to_same_position_skips_gateway() {
        let (gateway, tree) = three_roots().await;
        let calls = gateway.calls();
        assert_eq!(tree.reorder_sibling(2, 1).await.unwrap(), 1);
        assert_eq!(gateway.calls(), calls);
    }
}

mod refresh_task {
    use super::*;

    #[tokio::test]
    async fn test_refresh_splices_server_subtree() {
        let (gateway, tree) = groceries().await;
        tree.create_task(None, "Bake bread").await.unwrap();
        gateway.seed_task(1, Some(10), 50, "Added elsewhere");

        let node = tree.refresh_task(10).await.unwrap();

        assert_eq!(node.subtasks.len(), 1);
        assert_eq!(tree.find_parent_of(50).unwrap().id, 10);
        assert_eq!(tree.children_of(None).unwrap(), vec![10, 11]);
    }

    #[tokio::test]
    async fn test_refresh_unknown_task() {
        let (_gateway, tree) = groceries().await;
        assert!(matches!(tree.refresh_task(404).await, Err(Error::NotFound(_))));
    }
}

mod failed_mutations {
    use super::*;

    /// Groceries with "Buy milk" > "2% milk", plus a second root "Bake bread".
    async fn nested() -> (MemoryGateway, Arc<TaskTreeManager>) {
        let (gateway, tree) = groceries().await;
        gateway.seed_task(1, Some(10), 11, "2% milk");
        gateway.seed_task(1, None, 12, "Bake bread");
        tree.load(1).await.unwrap();
        (gateway, tree)
    }

    fn server_down(gateway: &MemoryGateway) {
        gateway.fail_next(GatewayError::Server("Internal server error".into()));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_subtree() {
        let (gateway, tree) = nested().await;
        let before = tree.snapshot();
        server_down(&gateway);

        assert!(matches!(tree.delete_task(10).await, Err(Error::SyncFailure(_))));

        assert_eq!(tree.snapshot(), before);
        assert!(tree.find_by_id(11).is_some());
    }

    #[tokio::test]
    async fn test_failed_reorder_keeps_order() {
        let (gateway, tree) = nested().await;
        let before = tree.snapshot();
        server_down(&gateway);

        assert!(matches!(tree.reorder_sibling(12, 0).await, Err(Error::SyncFailure(_))));

        assert_eq!(tree.snapshot(), before);
        assert_eq!(tree.children_of(None).unwrap(), vec![10, 12]);
    }

    #[tokio::test]
    async fn test_failed_toggle_keeps_flag() {
        let (gateway, tree) = nested().await;
        let before = tree.snapshot();
        server_down(&gateway);

        assert!(matches!(tree.toggle_completion(11).await, Err(Error::SyncFailure(_))));

        assert_eq!(tree.snapshot(), before);
        assert!(!tree.find_by_id(11).unwrap().is_completed);
    }

    #[tokio::test]
    async fn test_failed_rename_keeps_name() {
        let (gateway, tree) = nested().await;
        let before = tree.snapshot();
        server_down(&gateway);

        assert!(matches!(tree.rename_task(10, "Buy oat milk").await, Err(Error::SyncFailure(_))));

        assert_eq!(tree.snapshot(), before);
        assert_eq!(tree.find_by_id(10).unwrap().name, "Buy milk");
        assert_eq!(tree.pending(), None);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn test_queued_intent_is_dropped_when_list_changes() {
        let (gateway, tree) = groceries().await;
        gateway.seed_list(2, "Hardware");
        gateway.set_latency(Duration::from_millis(100));

        let first = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.create_task(None, "Eggs").await })
        };
        let second = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.create_task(None, "Milk for groceries").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gateway.set_latency(Duration::ZERO);
        tree.load(2).await.unwrap();

        assert_eq!(first.await.unwrap(), Err(Error::Superseded));
        assert_eq!(second.await.unwrap(), Err(Error::Superseded));

        assert!(gateway.stored_forest(2).unwrap().is_empty());
        let groceries: Vec<String> = gateway
            .stored_forest(1)
            .unwrap()
            .into_iter()
            .map(|n| n.task.name)
            .collect();
        assert_eq!(groceries, vec!["Buy milk", "Eggs"]);
        assert!(tree.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unload_while_mutation_in_flight() {
        let (gateway, tree) = groceries().await;
        gateway.set_latency(Duration::from_millis(50));

        let pending = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.rename_task(10, "Buy oat milk").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        tree.unload();

        assert_eq!(pending.await.unwrap(), Err(Error::Superseded));
        assert_eq!(tree.loaded_list(), None);
    }

    #[tokio::test]
    async fn test_unload_while_load_in_flight() {
        let (gateway, tree) = groceries().await;
        gateway.set_latency(Duration::from_millis(50));

        let pending = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.load(1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        tree.unload();

        assert_eq!(pending.await.unwrap(), Err(Error::Superseded));
        assert_eq!(tree.loaded_list(), None);
    }

    #[tokio::test]
    async fn test_overlapping_mutations_are_queued() {
        let (gateway, tree) = groceries().await;
        gateway.set_latency(Duration::from_millis(50));

        let first = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.create_task(None, "Eggs").await })
        };
        let second = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.create_task(None, "Bread").await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(tree.pending(), Some("create_task"));

        let eggs = first.await.unwrap().unwrap();
        let bread = second.await.unwrap().unwrap();

        assert_eq!(tree.pending(), None);
        assert_eq!(tree.children_of(None).unwrap(), vec![10, eggs.id, bread.id]);
        assert_eq!(gateway.stored_forest(1).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_response_for_replaced_forest_is_discarded() {
        let (gateway, tree) = groceries().await;
        gateway.seed_list(2, "Hardware");
        gateway.set_latency(Duration::from_millis(100));

        let pending = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.create_task(None, "Eggs").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gateway.set_latency(Duration::ZERO);
        tree.load(2).await.unwrap();

        assert_eq!(pending.await.unwrap(), Err(Error::Superseded));
        assert_eq!(tree.loaded_list(), Some(2));
        assert!(tree.snapshot().is_empty());
        assert_eq!(gateway.stored_forest(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_load_is_discarded() {
        let (gateway, tree) = groceries().await;
        gateway.seed_list(2, "Hardware");
        gateway.set_latency(Duration::from_millis(100));

        let slow = {
            let tree = tree.clone();
            tokio::spawn(async move { tree.load(1).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gateway.set_latency(Duration::ZERO);
        tree.load(2).await.unwrap();

        assert_eq!(slow.await.unwrap(), Err(Error::Superseded));
        assert_eq!(tree.loaded_list(), Some(2));
    }
}
