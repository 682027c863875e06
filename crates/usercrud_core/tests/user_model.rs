use chrono::{TimeZone, Utc};
use usercrud_core::User;

#[test]
fn new_user_has_no_id_and_keeps_fields() {
    let user = User::new("John", "john@test.com", Some(30));

    assert_eq!(user.id(), None);
    assert!(!user.is_persisted());
    assert_eq!(user.name, "John");
    assert_eq!(user.email, "john@test.com");
    assert_eq!(user.age, Some(30));
}

#[test]
fn successive_users_have_strictly_increasing_created_at() {
    let first = User::new("A", "a@test.com", None);
    let second = User::new("B", "b@test.com", None);
    let third = User::new("C", "c@test.com", None);

    assert!(first.created_at() < second.created_at());
    assert!(second.created_at() < third.created_at());
}

#[test]
fn display_renders_all_fields() {
    let created_at = Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap();
    let user = User::from_parts(1, "John", "john@test.com", Some(30), created_at);

    let rendered = user.to_string();
    assert!(rendered.starts_with("User(id=1"));
    assert!(rendered.contains("name='John'"));
    assert!(rendered.contains("email='john@test.com'"));
    assert!(rendered.contains("age=30"));
    assert!(rendered.contains("created_at=2023-01-01T10:00:00+00:00"));
}

#[test]
fn display_marks_absent_values() {
    let rendered = User::new("Ann", "ann@test.com", None).to_string();
    assert!(rendered.starts_with("User(id=none"));
    assert!(rendered.contains("age=none"));
}

#[test]
fn serialization_uses_expected_wire_fields() {
    let created_at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let user = User::from_parts(42, "Ann", "ann@test.com", None, created_at);

    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["id"], 42);
    assert_eq!(json["name"], "Ann");
    assert_eq!(json["email"], "ann@test.com");
    assert!(json["age"].is_null());
    assert_eq!(json["created_at"], "2024-05-06T07:08:09Z");

    let decoded: User = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, user);
}
