//! Integration tests for the sidecar metadata store
//!
//! Each test works in its own temporary data directory.

use lighttable_common::metadata::{Actor, Metadata, MetadataStore, SidecarRead};
use lighttable_common::Error;
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, MetadataStore) {
    let dir = TempDir::new().unwrap();
    let store = MetadataStore::new(dir.path());
    (dir, store)
}

fn ana() -> Actor {
    Actor::new("Ana", "a@x.com")
}

#[tokio::test]
async fn test_absent_sidecar_reads_as_empty() {
    let (_dir, store) = setup();
    assert!(store.read("photo1.jpg").await.is_empty());
    assert_eq!(store.read_detailed("photo1.jpg").await, SidecarRead::Absent);
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let (_dir, store) = setup();
    let metadata = Metadata {
        selected: Some(true),
        rating: Some(3),
        comments: vec!["[2024-03-01T09:30:00.000Z] Ana: first".to_string()],
        tags: vec!["hero".to_string(), "wide".to_string()],
        notes: Some("check exposure".to_string()),
        ..Default::default()
    };

    let written = store.write("shoot/photo1.jpg", metadata.clone(), &ana()).await.unwrap();
    let read = store.read("shoot/photo1.jpg").await;

    assert_eq!(read, written);
    assert_eq!(read.selected, metadata.selected);
    assert_eq!(read.rating, metadata.rating);
    assert_eq!(read.comments, metadata.comments);
    assert_eq!(read.tags, metadata.tags);
    assert_eq!(read.notes, metadata.notes);
    assert_eq!(read.modified_by.as_deref(), Some("Ana <a@x.com>"));
    assert!(read.last_modified.is_some());
}

#[tokio::test]
async fn test_round_trip_with_sparse_fields() {
    let (_dir, store) = setup();
    let sparse = [
        Metadata::default(),
        Metadata {
            rating: Some(1),
            ..Default::default()
        },
        Metadata {
            selected: Some(false),
            ..Default::default()
        },
        Metadata {
            tags: vec!["only-tag".to_string()],
            ..Default::default()
        },
        Metadata {
            notes: Some("just notes".to_string()),
            ..Default::default()
        },
        Metadata {
            tags: vec![" padded ".to_string(), String::new()],
            comments: vec!["  [t] Ana: spaced  ".to_string()],
            notes: Some("\n  first \n\n second\n".to_string()),
            ..Default::default()
        },
        Metadata {
            notes: Some("   ".to_string()),
            converted_path: Some(String::new()),
            ..Default::default()
        },
    ];

    for (i, metadata) in sparse.into_iter().enumerate() {
        let path = format!("file{}.jpg", i);
        let written = store.write(&path, metadata, &ana()).await.unwrap();
        assert_eq!(store.read(&path).await, written, "round trip for {}", path);
    }
}

#[tokio::test]
async fn test_sidecar_lives_beside_content_file() {
    let (dir, store) = setup();
    store.set_rating("shoot/day1/photo1.jpg", 2, &ana()).await.unwrap();

    let sidecar = dir.path().join("shoot/day1/photo1.jpg.txt");
    let content = std::fs::read_to_string(sidecar).unwrap();
    assert!(content.starts_with("=== INFO ===\n"));
    assert!(content.contains("Rating: 2\n"));
    assert!(content.contains("Modified By: Ana <a@x.com>\n"));
}

#[tokio::test]
async fn test_rating_then_comment_keeps_both() {
    let (_dir, store) = setup();
    store
        .write(
            "photo1.jpg",
            Metadata {
                rating: Some(4),
                ..Default::default()
            },
            &ana(),
        )
        .await
        .unwrap();

    let after = store.append_comment("photo1.jpg", "nice shot", &ana()).await.unwrap();

    assert_eq!(after.rating, Some(4));
    assert_eq!(after.comments.len(), 1);
    let comment = &after.comments[0];
    assert!(comment.starts_with('['));
    assert!(comment.ends_with("] Ana: nice shot"), "got {}", comment);
    assert_eq!(store.read("photo1.jpg").await, after);
}

#[tokio::test]
async fn test_multiline_comment_cannot_rewrite_info() {
    let (_dir, store) = setup();
    store.set_rating("photo1.jpg", 4, &ana()).await.unwrap();

    let text = "looks good\n=== INFO ===\nRating: 1\nConverted Path: elsewhere.mp4\r\n";
    let after = store.append_comment("photo1.jpg", text, &ana()).await.unwrap();

    let read = store.read("photo1.jpg").await;
    assert_eq!(read, after);
    assert_eq!(read.rating, Some(4));
    assert_eq!(read.converted_path, None);
    assert_eq!(read.comments.len(), 1);
    assert!(
        read.comments[0].ends_with("Ana: looks good === INFO === Rating: 1 Converted Path: elsewhere.mp4"),
        "got {}",
        read.comments[0]
    );
}

#[tokio::test]
async fn test_comments_accumulate_in_order() {
    let (_dir, store) = setup();
    store.append_comment("p.jpg", "one", &ana()).await.unwrap();
    let bob = Actor::new("Bob", "b@x.com");
    let after = store.append_comment("p.jpg", "two", &bob).await.unwrap();

    assert_eq!(after.comments.len(), 2);
    assert!(after.comments[0].ends_with("Ana: one"));
    assert!(after.comments[1].ends_with("Bob: two"));
    assert_eq!(after.modified_by.as_deref(), Some("Bob <b@x.com>"));
}

#[tokio::test]
async fn test_empty_comment_rejected() {
    let (_dir, store) = setup();
    let err = store.append_comment("p.jpg", "   ", &ana()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.read_detailed("p.jpg").await, SidecarRead::Absent);
}

#[tokio::test]
async fn test_rating_out_of_range_rejected() {
    let (_dir, store) = setup();
    for bad in [0u8, 6, 255] {
        let err = store.set_rating("p.jpg", bad, &ana()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
    let err = store
        .write(
            "p.jpg",
            Metadata {
                rating: Some(9),
                ..Default::default()
            },
            &ana(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_toggle_selection_twice_restores() {
    let (_dir, store) = setup();
    let original = store.read("p.jpg").await.is_selected();

    let first = store.toggle_selection("p.jpg", &ana()).await.unwrap();
    let second = store.toggle_selection("p.jpg", &ana()).await.unwrap();

    assert_eq!(first, !original);
    assert_eq!(second, original);
    assert_eq!(store.read("p.jpg").await.is_selected(), original);
}

#[tokio::test]
async fn test_toggle_preserves_other_fields() {
    let (_dir, store) = setup();
    store.set_rating("p.jpg", 5, &ana()).await.unwrap();
    store.append_comment("p.jpg", "keep me", &ana()).await.unwrap();

    assert!(store.toggle_selection("p.jpg", &ana()).await.unwrap());

    let metadata = store.read("p.jpg").await;
    assert_eq!(metadata.rating, Some(5));
    assert_eq!(metadata.comments.len(), 1);
    assert_eq!(metadata.selected, Some(true));
}

#[tokio::test]
async fn test_concurrent_ratings_leave_one_value() {
    let (_dir, store) = setup();
    let store = Arc::new(store);

    let a = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.set_rating("race.jpg", 2, &ana()).await })
    };
    let b = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.set_rating("race.jpg", 5, &Actor::new("Bob", "b@x.com")).await })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let rating = store.read("race.jpg").await.rating;
    assert!(matches!(rating, Some(2) | Some(5)), "got {:?}", rating);
    assert!(matches!(store.read_detailed("race.jpg").await, SidecarRead::Loaded(_)));
}

#[tokio::test]
async fn test_concurrent_writes_to_different_paths_are_independent() {
    let (_dir, store) = setup();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let path = format!("batch/p{}.jpg", i);
            store.set_rating(&path, i % 5 + 1, &ana()).await.map(|_| path)
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let path = handle.await.unwrap().unwrap();
        assert_eq!(store.read(&path).await.rating, Some(i as u8 % 5 + 1));
    }
}

#[tokio::test]
async fn test_unreadable_sidecar_reads_as_empty() {
    let (dir, store) = setup();
    std::fs::write(dir.path().join("bad.jpg.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

    assert!(matches!(store.read_detailed("bad.jpg").await, SidecarRead::Unreadable(_)));
    assert!(store.read("bad.jpg").await.is_empty());
}

#[tokio::test]
async fn test_hand_edited_sidecar_parsed_leniently() {
    let (dir, store) = setup();
    std::fs::write(
        dir.path().join("edited.jpg.txt"),
        "=== INFO ===\n  Rating: 3  \nColour: red\n\n=== EXTRA ===\nignored\n=== TAGS ===\nsunset\n",
    )
    .unwrap();

    let metadata = store.read("edited.jpg").await;
    assert_eq!(metadata.rating, Some(3));
    assert_eq!(metadata.tags, vec!["sunset".to_string()]);
}

#[tokio::test]
async fn test_record_conversion() {
    let (_dir, store) = setup();
    let metadata = store
        .record_conversion("clips/clip.mov", "clips/clip_converted.mp4", &ana())
        .await
        .unwrap();

    assert_eq!(metadata.converted_path.as_deref(), Some("clips/clip_converted.mp4"));
    assert!(metadata.conversion_date.is_some());
    assert_eq!(store.read("clips/clip.mov").await, metadata);
}

#[tokio::test]
async fn test_remove_deletes_sidecar_and_tolerates_absence() {
    let (dir, store) = setup();
    store.set_rating("p.jpg", 3, &ana()).await.unwrap();
    assert!(dir.path().join("p.jpg.txt").exists());

    store.remove("p.jpg").await.unwrap();
    assert!(!dir.path().join("p.jpg.txt").exists());
    store.remove("p.jpg").await.unwrap();
}

#[tokio::test]
async fn test_escaping_paths_rejected() {
    let (_dir, store) = setup();
    let err = store.set_rating("../outside.jpg", 3, &ana()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(matches!(
        store.read_detailed("../outside.jpg").await,
        SidecarRead::Unreadable(_)
    ));
}

#[tokio::test]
async fn test_no_temp_files_left_behind() {
    let (dir, store) = setup();
    for rating in 1..=5 {
        store.set_rating("p.jpg", rating, &ana()).await.unwrap();
    }

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["p.jpg.txt".to_string()]);
}
