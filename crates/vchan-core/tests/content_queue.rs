mod common;

use common::library::{movies, SwitchableCatalog};
use std::collections::HashSet;
use std::sync::Arc;
use vchan_core::queue::ContentQueue;
use vchan_core::{ChannelKind, ChannelPolicy};

#[tokio::test]
async fn refill_with_nothing_keeps_the_remaining_items() {
    let catalog = Arc::new(SwitchableCatalog::new(movies("m", 5, 60)));
    let queue = ContentQueue::new(catalog.clone());
    let policy = ChannelPolicy::new("Movies", 1, ChannelKind::All);

    for expected in ["m0", "m1", "m2"] {
        let item = queue.next("virtual_1", &policy).await.unwrap().unwrap();
        assert_eq!(item.name, expected);
    }
    assert_eq!(queue.len("virtual_1").await, 2);

    catalog.replace(Vec::new());

    let item = queue.next("virtual_1", &policy).await.unwrap().unwrap();
    assert_eq!(item.name, "m3");
    let item = queue.next("virtual_1", &policy).await.unwrap().unwrap();
    assert_eq!(item.name, "m4");
    assert!(queue.next("virtual_1", &policy).await.unwrap().is_none());
}

#[tokio::test]
async fn refill_replaces_rather_than_appends() {
    let catalog = Arc::new(SwitchableCatalog::new(movies("old", 4, 60)));
    let queue = ContentQueue::new(catalog.clone());
    let policy = ChannelPolicy::new("Movies", 1, ChannelKind::All);

    queue.next("virtual_1", &policy).await.unwrap();
    queue.next("virtual_1", &policy).await.unwrap();
    catalog.replace(movies("new", 4, 60));

    // Two left, so this call swaps in the new selection before dequeuing.
    let item = queue.next("virtual_1", &policy).await.unwrap().unwrap();
    assert_eq!(item.name, "new0");
    assert_eq!(queue.len("virtual_1").await, 3);
}

#[tokio::test]
async fn concurrent_dequeues_never_share_an_item() {
    let catalog = Arc::new(SwitchableCatalog::new(movies("m", 20, 60)));
    let queue = Arc::new(ContentQueue::new(catalog));
    let policy = ChannelPolicy::new("Movies", 1, ChannelKind::All);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let queue = queue.clone();
        let policy = policy.clone();
        handles.push(tokio::spawn(async move {
            queue.next("virtual_1", &policy).await.unwrap().unwrap().name.clone()
        }));
    }

    let mut names = HashSet::new();
    for handle in handles {
        assert!(names.insert(handle.await.unwrap()));
    }
    let expected: HashSet<String> = (0..10).map(|i| format!("m{i}")).collect();
    assert_eq!(names, expected);
    assert_eq!(queue.len("virtual_1").await, 10);
}

#[tokio::test]
async fn channels_do_not_share_queues() {
    let catalog = Arc::new(SwitchableCatalog::new(movies("m", 5, 60)));
    let queue = ContentQueue::new(catalog);
    let one = ChannelPolicy::new("One", 1, ChannelKind::All);
    let two = ChannelPolicy::new("Two", 2, ChannelKind::All);

    queue.next("virtual_1", &one).await.unwrap();
    queue.next("virtual_1", &one).await.unwrap();
    let first_on_two = queue.next("virtual_2", &two).await.unwrap().unwrap();

    assert_eq!(first_on_two.name, "m0");
    assert_eq!(queue.len("virtual_1").await, 3);
    assert_eq!(queue.len("virtual_2").await, 4);
}
