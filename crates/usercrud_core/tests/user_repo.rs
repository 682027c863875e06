use usercrud_core::{Database, RepoError, SqliteUserRepository, User, UserRepository};

fn seeded(repo: &SqliteUserRepository<'_>, name: &str, email: &str) -> User {
    repo.save(User::new(name, email, None)).unwrap()
}

#[test]
fn save_assigns_id_and_find_by_id_roundtrips() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let user = User::new("John Doe", "john@test.com", Some(30));
    let saved = repo.save(user.clone()).unwrap();

    let id = saved.id().unwrap();
    assert!(id > 0);
    assert_eq!(saved.name, user.name);
    assert_eq!(saved.created_at(), user.created_at());

    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded, saved);
}

#[test]
fn save_rejects_already_persisted_user() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let saved = seeded(&repo, "Ann", "ann@test.com");
    let err = repo.save(saved.clone()).unwrap_err();
    assert!(matches!(err, RepoError::AlreadyPersisted(id) if Some(id) == saved.id()));
}

#[test]
fn find_by_id_returns_none_for_unknown_id() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    assert!(repo.find_by_id(999).unwrap().is_none());
}

#[test]
fn find_all_returns_users_in_id_order() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    assert!(repo.find_all().unwrap().is_empty());

    let first = seeded(&repo, "User 1", "user1@test.com");
    let second = seeded(&repo, "User 2", "user2@test.com");

    let all = repo.find_all().unwrap();
    assert_eq!(all, vec![first, second]);
}

#[test]
fn update_overwrites_fields_and_keeps_created_at() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let mut user = repo
        .save(User::new("Original", "original@test.com", Some(25)))
        .unwrap();
    let created_at = user.created_at();

    user.name = "Updated".to_string();
    user.email = "updated@test.com".to_string();
    user.age = None;
    let updated = repo.update(user.clone()).unwrap();

    assert_eq!(updated, user);
    assert_eq!(updated.created_at(), created_at);

    let loaded = repo.find_by_id(user.id().unwrap()).unwrap().unwrap();
    assert_eq!(loaded.name, "Updated");
    assert_eq!(loaded.email, "updated@test.com");
    assert_eq!(loaded.age, None);
    assert_eq!(loaded.created_at(), created_at);
}

#[test]
fn update_requires_id() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let err = repo
        .update(User::new("Nobody", "nobody@test.com", None))
        .unwrap_err();
    assert!(matches!(err, RepoError::MissingId));
}

#[test]
fn update_of_vanished_row_returns_not_found() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let user = seeded(&repo, "Ghost", "ghost@test.com");
    let id = user.id().unwrap();
    repo.delete(id).unwrap();

    let err = repo.update(user).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(missing) if missing == id));
}

#[test]
fn delete_removes_row_and_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let id = seeded(&repo, "To Delete", "delete@test.com").id().unwrap();

    repo.delete(id).unwrap();
    assert!(repo.find_by_id(id).unwrap().is_none());

    repo.delete(id).unwrap();
    repo.delete(999).unwrap();
}

#[test]
fn find_by_email_matches_exactly() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let saved = seeded(&repo, "Email User", "email@test.com");

    assert_eq!(repo.find_by_email("email@test.com").unwrap(), Some(saved));
    assert!(repo.find_by_email("EMAIL@test.com").unwrap().is_none());
    assert!(repo.find_by_email("nonexistent@test.com").unwrap().is_none());
}

#[test]
fn find_by_name_contains_is_case_sensitive_substring() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    seeded(&repo, "John Smith", "john.smith@test.com");
    seeded(&repo, "John Doe", "john.doe@test.com");
    seeded(&repo, "Alice Smith", "alice@test.com");

    let johns = repo.find_by_name_contains("John").unwrap();
    let names: Vec<&str> = johns.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, vec!["John Smith", "John Doe"]);

    assert_eq!(repo.find_by_name_contains("Smith").unwrap().len(), 2);
    assert!(repo.find_by_name_contains("john").unwrap().is_empty());
    assert!(repo.find_by_name_contains("Nonexistent").unwrap().is_empty());
}

#[test]
fn find_by_name_treats_like_wildcards_literally() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    seeded(&repo, "100% Real", "real@test.com");
    seeded(&repo, "Plain", "plain@test.com");

    let hits = repo.find_by_name_contains("%").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "100% Real");
    assert!(repo.find_by_name_contains("_").unwrap().is_empty());
}

#[test]
fn duplicate_email_is_rejected_and_rolled_back() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    seeded(&repo, "User 1", "same@test.com");
    let err = repo
        .save(User::new("User 2", "same@test.com", None))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateEmail(ref email) if email == "same@test.com"));

    assert_eq!(repo.find_all().unwrap().len(), 1);
}

#[test]
fn update_to_taken_email_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    seeded(&repo, "First", "first@test.com");
    let mut second = seeded(&repo, "Second", "second@test.com");

    second.email = "first@test.com".to_string();
    let err = repo.update(second.clone()).unwrap_err();
    assert!(matches!(err, RepoError::DuplicateEmail(_)));

    let stored = repo.find_by_id(second.id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.email, "second@test.com");
}

#[test]
fn check_constraint_failure_is_wrapped_as_storage_error() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);

    let err = repo
        .save(User::new("Old", "old@test.com", Some(200)))
        .unwrap_err();
    assert!(std::error::Error::source(&err).is_some());
    match err {
        RepoError::Storage { operation, .. } => assert_eq!(operation, "save"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(repo.find_all().unwrap().is_empty());
}

#[test]
fn operations_after_shutdown_report_unavailable() {
    let db = Database::open_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&db);
    db.shutdown();

    let err = repo.find_all().unwrap_err();
    assert!(err.is_unavailable());
    assert!(matches!(err, RepoError::Storage { operation: "find_all", .. }));
}

#[test]
fn file_backed_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");

    let saved = {
        let db = Database::open(&path).unwrap();
        let repo = SqliteUserRepository::new(&db);
        let saved = seeded(&repo, "Durable", "durable@test.com");
        db.shutdown();
        saved
    };

    let db = Database::open(&path).unwrap();
    let repo = SqliteUserRepository::new(&db);
    assert_eq!(repo.find_by_id(saved.id().unwrap()).unwrap(), Some(saved));
}
