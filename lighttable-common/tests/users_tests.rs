//! Integration tests for the JSON user directory

use lighttable_common::access::users::UsersFile;
use lighttable_common::access::{Role, User, UserDirectory};
use lighttable_common::Error;
use tempfile::TempDir;

fn setup() -> (TempDir, UserDirectory) {
    let dir = TempDir::new().unwrap();
    let users = UserDirectory::new(dir.path().join("config").join("users.json"));
    (dir, users)
}

fn user(email: &str, name: &str, role: Role, start: Option<&str>) -> User {
    User {
        email: email.to_string(),
        name: name.to_string(),
        role,
        start_path: start.map(String::from),
    }
}

#[tokio::test]
async fn test_missing_file_lists_empty() {
    let (_dir, users) = setup();
    assert!(users.list().await.is_empty());
    assert!(users.find("a@x.com").await.is_none());
}

#[tokio::test]
async fn test_malformed_file_lists_empty() {
    let (dir, users) = setup();
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(users.path(), "{ not json").unwrap();

    assert!(users.list().await.is_empty());
    assert!(matches!(users.load().await.unwrap_err(), Error::Json(_)));
}

#[tokio::test]
async fn test_reads_hand_written_file() {
    let (dir, users) = setup();
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(
        users.path(),
        r#"{"users":[{"email":"a@x.com","name":"Ana","role":"admin"},
                     {"email":"u@x.com","name":"Uma","role":"user","startPath":"ProjectA"}]}"#,
    )
    .unwrap();

    let all = users.list().await;
    assert_eq!(all.len(), 2);
    let uma = users.find("u@x.com").await.unwrap();
    assert_eq!(uma.role, Role::User);
    assert_eq!(uma.start_path.as_deref(), Some("ProjectA"));
}

#[tokio::test]
async fn test_create_then_find_case_insensitive() {
    let (_dir, users) = setup();
    users
        .create(user("Ana@X.com", "Ana", Role::Admin, None))
        .await
        .unwrap();

    let found = users.find("ana@x.com").await.unwrap();
    assert_eq!(found.name, "Ana");
    assert_eq!(found.role, Role::Admin);
}

#[tokio::test]
async fn test_create_duplicate_is_conflict() {
    let (_dir, users) = setup();
    users.create(user("a@x.com", "Ana", Role::Admin, None)).await.unwrap();

    let err = users
        .create(user("A@x.com", "Other", Role::User, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(users.list().await.len(), 1);
}

#[tokio::test]
async fn test_create_validates_and_normalizes() {
    let (_dir, users) = setup();
    let err = users
        .create(user("not-an-email", "X", Role::User, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = users.create(user("x@x.com", "  ", Role::User, None)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = users
        .create(user("x@x.com", "X", Role::User, Some("../escape")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let created = users
        .create(user(" m@x.com ", " Max ", Role::Manager, Some("/ProjectA/")))
        .await
        .unwrap();
    assert_eq!(created.email, "m@x.com");
    assert_eq!(created.name, "Max");
    assert_eq!(created.start_path.as_deref(), Some("ProjectA"));

    let unrestricted = users
        .create(user("r@x.com", "Root", Role::User, Some("/")))
        .await
        .unwrap();
    assert_eq!(unrestricted.start_path, None);
}

#[tokio::test]
async fn test_update_changes_record() {
    let (_dir, users) = setup();
    users.create(user("u@x.com", "Uma", Role::User, None)).await.unwrap();

    let updated = users
        .update("u@x.com", user("uma@x.com", "Uma B", Role::Manager, Some("ProjectB")))
        .await
        .unwrap();
    assert_eq!(updated.email, "uma@x.com");

    assert!(users.find("u@x.com").await.is_none());
    let found = users.find("uma@x.com").await.unwrap();
    assert_eq!(found.role, Role::Manager);
    assert_eq!(found.start_path.as_deref(), Some("ProjectB"));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let (_dir, users) = setup();
    let err = users
        .update("ghost@x.com", user("ghost@x.com", "Ghost", Role::User, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_update_onto_existing_email_is_conflict() {
    let (_dir, users) = setup();
    users.create(user("a@x.com", "Ana", Role::Admin, None)).await.unwrap();
    users.create(user("b@x.com", "Bob", Role::User, None)).await.unwrap();

    let err = users
        .update("b@x.com", user("a@x.com", "Bob", Role::User, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Keeping one's own email is fine
    users
        .update("b@x.com", user("b@x.com", "Bobby", Role::User, None))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete() {
    let (_dir, users) = setup();
    users.create(user("a@x.com", "Ana", Role::Admin, None)).await.unwrap();
    users.create(user("b@x.com", "Bob", Role::User, None)).await.unwrap();

    assert!(users.delete("B@X.COM").await.unwrap());
    assert!(!users.delete("b@x.com").await.unwrap());

    let remaining: Vec<String> = users.list().await.into_iter().map(|u| u.email).collect();
    assert_eq!(remaining, vec!["a@x.com".to_string()]);
}

#[tokio::test]
async fn test_file_is_rewritten_wholesale() {
    let (_dir, users) = setup();
    users.create(user("a@x.com", "Ana", Role::Admin, None)).await.unwrap();
    users.create(user("b@x.com", "Bob", Role::User, Some("ProjectB"))).await.unwrap();

    let content = std::fs::read_to_string(users.path()).unwrap();
    let parsed: UsersFile = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed.users.len(), 2);
    assert!(content.contains("\"startPath\": \"ProjectB\""));
}
