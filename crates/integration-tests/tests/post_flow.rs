//! Post lifecycle against the in-memory adapters.

mod common;

use common::{draft, png, TestBoard};
use domains::{DomainError, PostRepository};
use services::{ImageChange, PostEdit};

#[tokio::test]
async fn posts_are_numbered_and_listed_newest_first() {
    let board = TestBoard::new();
    let alice = board.user("alice@board.test", Some("alice")).await;

    let first = board.posts.create_post(&alice, draft("first", None)).await.unwrap();
    let second = board.posts.create_post(&alice, draft("second", None)).await.unwrap();
    assert_eq!(first.post.post_number, 1);
    assert_eq!(second.post.post_number, 2);

    let listed = board.posts.list_posts().await.unwrap();
    let titles: Vec<_> = listed.iter().map(|p| p.post.title.as_str()).collect();
    assert_eq!(titles, vec!["second", "first"]);
    assert_eq!(listed[0].post.nickname.as_deref(), Some("alice"));
}

#[tokio::test]
async fn concurrent_creation_yields_distinct_consecutive_numbers() {
    let board = TestBoard::new();
    let alice = board.user("alice@board.test", Some("alice")).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let posts = board.posts.clone();
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            posts.create_post(&alice, draft(&format!("p{i}"), None)).await
        }));
    }
    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap().post.post_number);
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn author_without_nickname_shows_blank_in_list_and_unknown_in_detail() {
    let board = TestBoard::new();
    let shy = board.user("shy@board.test", None).await;
    let created = board.posts.create_post(&shy, draft("quiet", None)).await.unwrap();

    let listed = board.posts.list_posts().await.unwrap();
    assert_eq!(listed[0].post.nickname.as_deref(), Some(""));
    let detail = board.posts.get_post(created.post.id).await.unwrap();
    assert_eq!(detail.post.nickname.as_deref(), Some("Unknown"));
}

#[tokio::test]
async fn image_lifecycle_follows_the_post() {
    let board = TestBoard::new();
    let alice = board.user("alice@board.test", Some("alice")).await;

    let created = board
        .posts
        .create_post(&alice, draft("with image", Some(png("first.png"))))
        .await
        .unwrap();
    let first_key = created.post.image_key.clone().unwrap();
    assert!(board.media.contains(&first_key));
    assert!(created.thumbnail_url.unwrap().contains("thumbs/"));

    let edit = PostEdit {
        title: "with image".into(),
        content: "new body".into(),
        image: ImageChange::Replace(png("second.png")),
    };
    let replaced = board.posts.update_post(&alice, created.post.id, edit).await.unwrap();
    let second_key = replaced.post.image_key.clone().unwrap();
    assert!(replaced.edited);
    assert!(!board.media.contains(&first_key));
    assert!(board.media.contains(&second_key));

    let edit = PostEdit {
        title: "with image".into(),
        content: "new body".into(),
        image: ImageChange::Remove,
    };
    let removed = board.posts.update_post(&alice, created.post.id, edit).await.unwrap();
    assert!(removed.post.image_key.is_none());
    assert!(removed.image_url.is_none());
    assert!(board.media.is_empty());
}

#[tokio::test]
async fn deleting_a_post_removes_image_and_comments() {
    let board = TestBoard::new();
    let alice = board.user("alice@board.test", Some("alice")).await;
    let created = board
        .posts
        .create_post(&alice, draft("doomed", Some(png("doomed.png"))))
        .await
        .unwrap();
    let id = created.post.id;
    board.comments.add_comment(&alice, id, "first!").await.unwrap();

    board.posts.delete_post(&alice, id).await.unwrap();

    assert!(board.media.is_empty());
    assert!(PostRepository::get(&board.store, id).await.unwrap().is_none());
    let err = board.posts.get_post(id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(board.comments.list_thread(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
    let board = TestBoard::new();
    let alice = board.user("alice@board.test", Some("alice")).await;
    let mallory = board.user("mallory@board.test", Some("mallory")).await;
    let created = board.posts.create_post(&alice, draft("mine", None)).await.unwrap();

    let edit = PostEdit { title: "hijacked".into(), content: "x".into(), image: ImageChange::Keep };
    let err = board.posts.update_post(&mallory, created.post.id, edit).await.unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let err = board.posts.delete_post(&mallory, created.post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
    assert_eq!(board.posts.get_post(created.post.id).await.unwrap().post.title, "mine");
}

#[tokio::test]
async fn view_counter_increments() {
    let board = TestBoard::new();
    let alice = board.user("alice@board.test", Some("alice")).await;
    let created = board.posts.create_post(&alice, draft("popular", None)).await.unwrap();
    let raw_id = created.post.id.to_string();

    for _ in 0..3 {
        assert!(board.posts.increment_views(&raw_id).await.unwrap().success);
    }
    assert_eq!(board.posts.get_post(created.post.id).await.unwrap().post.views, 3);

    let err = board.posts.increment_views(&uuid::Uuid::now_v7().to_string()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn non_image_attachments_are_refused_and_nothing_is_stored() {
    let board = TestBoard::new();
    let alice = board.user("alice@board.test", Some("alice")).await;
    let mut upload = png("notes.txt");
    upload.content_type = mime::TEXT_PLAIN;

    let err = board.posts.create_post(&alice, draft("text", Some(upload))).await.unwrap_err();
    assert!(matches!(err, DomainError::ValidationError(_)));
    assert!(board.media.is_empty());
    assert!(board.posts.list_posts().await.unwrap().is_empty());
}
