use std::sync::Arc;

use client::MutationCoordinator;
use domain::{count_nodes, detached_items, DomainError, ItemId, ListId};
use infrastructure::{
    InMemoryTodoApi, ItemInput, ListInput, MemorySessionStore, SessionStore, TodoApi,
};
use shared::AppError;

struct Fixture {
    api: Arc<InMemoryTodoApi>,
    home: ListId,
    work: ListId,
    // home: 1 -> [2 -> [4], 3]
    ids: [ItemId; 4],
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemorySessionStore::new());
    let api = Arc::new(InMemoryTodoApi::new(store.clone()));
    let session = api
        .add_user("hanako", "hanako@example.com", "password1")
        .unwrap();
    store.save(&session).unwrap();

    let home = create_list(&api, "家").await;
    let work = create_list(&api, "仕事").await;

    let one = api.create_item(home, &input("掃除")).await.unwrap().id;
    let two = api.create_subitem(one, &input("台所")).await.unwrap().id;
    let three = api.create_subitem(one, &input("風呂")).await.unwrap().id;
    let four = api.create_subitem(two, &input("換気扇")).await.unwrap().id;

    Fixture {
        api,
        home,
        work,
        ids: [one, two, three, four],
    }
}

async fn create_list(api: &InMemoryTodoApi, title: &str) -> ListId {
    api.create_list(&ListInput {
        title: title.to_string(),
        description: None,
    })
    .await
    .unwrap()
    .id
}

fn input(title: &str) -> ItemInput {
    ItemInput {
        title: title.to_string(),
        description: None,
    }
}

#[tokio::test]
async fn test_open_builds_forest() {
    // Arrange
    let f = fixture().await;
    let [one, two, three, four] = f.ids;

    // Act
    let coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    // Assert
    let forest = coordinator.forest();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].id(), one);
    let children: Vec<ItemId> = forest[0].children.iter().map(|c| c.id()).collect();
    assert_eq!(children, vec![two, three]);
    assert_eq!(forest[0].children[0].children[0].id(), four);

    assert_eq!(
        coordinator.view().move_targets.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![f.work]
    );
    // 新しいIDは展開状態
    assert!(coordinator.expansion().is_expanded(two));
}

#[tokio::test]
async fn test_create_item_patches_locally() {
    let f = fixture().await;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();
    let fetches = f.api.call_count("get_list");

    let id = coordinator.create_item("  洗濯  ", None).await.unwrap();

    // 再取得しない
    assert_eq!(f.api.call_count("get_list"), fetches);
    let created = coordinator.view().item(id).unwrap();
    assert_eq!(created.title, "洗濯");
    assert!(created.is_root());
    assert_eq!(coordinator.view().items().last().map(|i| i.id), Some(id));
    assert!(coordinator.expansion().is_tracked(id));
}

#[tokio::test]
async fn test_create_subitem_refetches() {
    let f = fixture().await;
    let [_, _, three, _] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();
    let fetches = f.api.call_count("get_list");

    let id = coordinator
        .create_subitem(three, "排水口", Some("月1回"))
        .await
        .unwrap();

    assert_eq!(f.api.call_count("get_list"), fetches + 1);
    let forest = coordinator.forest();
    let parent = domain::find_node(&forest, three).unwrap();
    assert_eq!(parent.children[0].id(), id);
    assert_eq!(count_nodes(&forest), 5);
}

#[tokio::test]
async fn test_delete_orphans_children_locally() {
    // Arrange
    let f = fixture().await;
    let [_, two, _, four] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    // Act
    coordinator.delete_item(two).await.unwrap();

    // Assert: 子はトップレベルになる
    assert!(coordinator.view().item(two).is_none());
    assert!(coordinator.view().item(four).unwrap().is_root());
    assert!(!coordinator.expansion().is_tracked(two));

    // サーバーの状態と一致する
    let local = coordinator.view().items().to_vec();
    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.view().items(), local.as_slice());
}

#[tokio::test]
async fn test_toggle_completion_cascades_locally() {
    let f = fixture().await;
    let [one, two, three, four] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    let completed = coordinator.toggle_completion(two).await.unwrap();

    assert!(completed);
    let view = coordinator.view();
    assert!(view.item(two).unwrap().completed);
    assert!(view.item(four).unwrap().completed);
    assert!(!view.item(one).unwrap().completed);
    assert!(!view.item(three).unwrap().completed);

    // 再取得しても同じ
    let local: Vec<bool> = view.items().iter().map(|i| i.completed).collect();
    coordinator.refresh().await.unwrap();
    let fetched: Vec<bool> = coordinator.view().items().iter().map(|i| i.completed).collect();
    assert_eq!(fetched, local);

    // もう一度で元に戻る
    assert!(!coordinator.toggle_completion(two).await.unwrap());
    assert!(!coordinator.view().item(four).unwrap().completed);
}

#[tokio::test]
async fn test_update_item_applies_returned_record() {
    let f = fixture().await;
    let [one, ..] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    coordinator
        .update_item(one, Some("大掃除"), Some("年末"))
        .await
        .unwrap();

    let item = coordinator.view().item(one).unwrap();
    assert_eq!(item.title, "大掃除");
    assert_eq!(item.description.as_deref(), Some("年末"));
    assert_eq!(item.list_id, Some(f.home));

    assert!(matches!(
        coordinator.update_item(one, None, None).await,
        Err(AppError::Domain(DomainError::Validation(_)))
    ));
}

#[tokio::test]
async fn test_move_item_between_lists() {
    // Arrange: 移動対象はトップレベルの新しいアイテム
    let f = fixture().await;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();
    let moving = coordinator.create_item("書類", None).await.unwrap();

    // Act
    coordinator.move_item(moving, f.work).await.unwrap();

    // Assert
    assert!(coordinator.view().item(moving).is_none());
    let target = MutationCoordinator::open(f.api.clone(), f.work).await.unwrap();
    assert!(target.view().item(moving).is_some());
    assert!(f
        .api
        .get_list_items(f.home)
        .await
        .unwrap()
        .iter()
        .all(|item| item.id != moving));
}

#[tokio::test]
async fn test_move_leaves_subtree_detached_in_source_list() {
    let f = fixture().await;
    let [one, two, three, four] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    coordinator.move_item(one, f.work).await.unwrap();

    // 子は元のリストに残り、どのルートからも到達できない
    let view = coordinator.view();
    assert_eq!(view.items().len(), 3);
    assert!(coordinator.forest().is_empty());
    let detached: Vec<ItemId> = detached_items(view.items()).iter().map(|i| i.id).collect();
    assert_eq!(detached, vec![two, three, four]);
}

#[tokio::test]
async fn test_move_prechecks_do_not_call_api() {
    let f = fixture().await;
    let [one, two, ..] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    assert_eq!(
        coordinator.move_item(two, f.work).await,
        Err(AppError::Domain(DomainError::NotTopLevel(two)))
    );
    assert_eq!(
        coordinator.move_item(one, f.home).await,
        Err(AppError::Domain(DomainError::SameList(f.home)))
    );
    assert_eq!(
        coordinator.move_item(ItemId::new(999), f.work).await,
        Err(AppError::Domain(DomainError::ItemNotFound(ItemId::new(999))))
    );
    assert_eq!(f.api.call_count("move_item"), 0);
}

#[tokio::test]
async fn test_blank_title_is_rejected_without_call() {
    let f = fixture().await;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    let result = coordinator.create_item("   ", None).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::InvalidTitle(_)))
    ));
    assert_eq!(f.api.call_count("create_item"), 1);
}

#[tokio::test]
async fn test_failure_leaves_state_untouched() {
    // Arrange
    let f = fixture().await;
    let [one, two, ..] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();
    coordinator.toggle_expanded(one).unwrap();
    let before = coordinator.view().clone();

    // Act & Assert: 各操作を1回ずつ失敗させる
    f.api.fail_next(AppError::ServiceUnavailable("down".to_string()));
    assert!(coordinator.delete_item(two).await.is_err());

    f.api.fail_next(AppError::ServiceUnavailable("down".to_string()));
    assert!(coordinator.toggle_completion(one).await.is_err());

    f.api.fail_next(AppError::Network("reset".to_string()));
    assert!(coordinator.create_item("新規", None).await.is_err());

    f.api.fail_next(AppError::Authorization("Unauthorized access".to_string()));
    assert!(coordinator.move_item(one, f.work).await.is_err());

    f.api.fail_next(AppError::Timeout("slow".to_string()));
    assert!(coordinator.refresh().await.is_err());

    assert_eq!(coordinator.view(), &before);
}

#[tokio::test]
async fn test_refresh_keeps_expansion_of_surviving_items() {
    let f = fixture().await;
    let [one, two, ..] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();

    assert!(!coordinator.toggle_expanded(two).unwrap());
    f.api.delete_item(one).await.unwrap();
    coordinator.refresh().await.unwrap();

    assert!(!coordinator.expansion().is_expanded(two));
    assert!(!coordinator.expansion().is_tracked(one));

    // 折りたたんだノードの子は表示されない
    let forest = coordinator.forest();
    let rows = coordinator.visible_rows(&forest);
    assert!(rows.iter().all(|row| row.node.id() != f.ids[3]));

    assert!(matches!(
        coordinator.toggle_expanded(ItemId::new(999)),
        Err(AppError::Domain(DomainError::ItemNotFound(_)))
    ));
}

#[tokio::test]
async fn test_reload_failure_after_move_keeps_applied_change() {
    // Arrange
    let f = fixture().await;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();
    let moving = coordinator.create_item("書類", None).await.unwrap();
    let before = coordinator.view().clone();
    f.api
        .fail_on("get_list", AppError::ServiceUnavailable("down".to_string()));

    // Act
    let result = coordinator.move_item(moving, f.work).await;

    // Assert: サーバーには反映済み、ローカルは古いまま
    assert!(matches!(result, Err(AppError::RefetchFailed(_))));
    assert_eq!(coordinator.view(), &before);
    assert!(f.api.stored_items(f.work).iter().any(|item| item.id == moving));

    coordinator.refresh().await.unwrap();
    assert!(coordinator.view().item(moving).is_none());
}

#[tokio::test]
async fn test_reload_failure_after_create_subitem_keeps_applied_change() {
    let f = fixture().await;
    let [_, _, three, _] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();
    f.api
        .fail_on("get_lists", AppError::Network("reset".to_string()));

    let result = coordinator.create_subitem(three, "排水口", None).await;

    assert!(matches!(result, Err(AppError::RefetchFailed(_))));
    assert_eq!(count_nodes(&coordinator.forest()), 4);
    assert_eq!(f.api.stored_items(f.home).len(), 5);
}

#[tokio::test]
async fn test_failed_mutation_is_not_reported_as_refetch_failure() {
    let f = fixture().await;
    let [one, ..] = f.ids;
    let mut coordinator = MutationCoordinator::open(f.api.clone(), f.home).await.unwrap();
    f.api
        .fail_on("move_item", AppError::ServiceUnavailable("down".to_string()));

    let result = coordinator.move_item(one, f.work).await;

    assert_eq!(
        result,
        Err(AppError::ServiceUnavailable("down".to_string()))
    );
}
