//! Integration tests for the SQL store.
//!
//! These run against a migrated in-memory SQLite database, so the unique
//! indexes and the conditional UPDATE are the real ones.

use chrono::Utc;
use domain_users::*;
use test_utils::{assertions::*, TestDataBuilder, TestDatabase};

fn new_user(builder: &TestDataBuilder, suffix: &str) -> NewUser {
    NewUser {
        username: builder.username(suffix),
        email: builder.email(suffix),
        full_name: builder.full_name(suffix),
        password_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaA".to_string(),
        phone_number: None,
        created_at: Utc::now(),
        created_by: Some("tester".to_string()),
    }
}

async fn repo() -> (TestDatabase, SqlUserRepository) {
    let db = TestDatabase::sqlite().await;
    let repo = SqlUserRepository::new(db.connection());
    (db, repo)
}

#[tokio::test]
async fn test_create_and_get_user() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("create_and_get");

    let input = new_user(&builder, "main");
    let created = repo.create(input.clone()).await.unwrap();

    assert!(created.id > 0);
    assert_eq!(created.version, 1);
    assert!(created.is_active);
    assert_eq!(created.username, input.username);
    assert_eq!(created.updated_by.as_deref(), Some("tester"));

    let by_id = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(by_id.email, input.email);

    let by_email = repo
        .get_by_unique(UniqueField::Email, &input.email)
        .await
        .unwrap();
    assert_eq!(by_email.id, created.id);
}

#[tokio::test]
async fn test_missing_user_is_not_found() {
    let (_db, repo) = repo().await;

    assert!(matches!(
        repo.get_by_id(404).await,
        Err(UserError::NotFound(UserLookup::Id(404)))
    ));
    assert!(matches!(
        repo.get_by_unique(UniqueField::Username, "nobody").await,
        Err(UserError::NotFound(UserLookup::Username(_)))
    ));
}

#[tokio::test]
async fn test_unique_indexes_map_to_fields() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("unique_indexes");

    let original = new_user(&builder, "one");
    repo.create(original.clone()).await.unwrap();

    let same_username = NewUser {
        email: builder.email("two"),
        ..original.clone()
    };
    let err = repo.create(same_username).await.unwrap_err();
    assert!(
        matches!(err, UserError::AlreadyExists { field: UniqueField::Username, ref value } if *value == original.username),
        "unexpected error: {err:?}"
    );

    let same_email = NewUser {
        username: builder.username("two"),
        ..original.clone()
    };
    let err = repo.create(same_email).await.unwrap_err();
    assert!(
        matches!(err, UserError::AlreadyExists { field: UniqueField::Email, .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_compare_and_swap_update() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("cas_update");

    let mut user = repo.create(new_user(&builder, "main")).await.unwrap();
    user.full_name = "Renamed".to_string();
    user.phone_number = Some(builder.phone_number());
    user.updated_by = Some("editor".to_string());

    let version = repo.compare_and_swap_update(&user, 1).await.unwrap();
    assert_version_advanced(1, version, 1);

    let stored = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.full_name, "Renamed");
    assert_eq!(stored.phone_number, user.phone_number);
    assert_eq!(stored.created_by.as_deref(), Some("tester"));
    assert_eq!(stored.updated_by.as_deref(), Some("editor"));
}

#[tokio::test]
async fn test_zero_row_update_is_disambiguated() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("disambiguation");

    let user = repo.create(new_user(&builder, "main")).await.unwrap();
    repo.compare_and_swap_update(&user, 1).await.unwrap();

    let stale = repo.compare_and_swap_update(&user, 1).await.unwrap_err();
    assert!(matches!(
        stale,
        UserError::Conflict { expected: 1, actual: Some(2), .. }
    ));

    let mut ghost = user.clone();
    ghost.id = user.id + 1_000;
    assert!(matches!(
        repo.compare_and_swap_update(&ghost, 1).await,
        Err(UserError::NotFound(UserLookup::Id(_)))
    ));

    assert!(matches!(
        repo.compare_and_swap_soft_delete(ghost.id, 1, None, Utc::now()).await,
        Err(UserError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_update_into_taken_value_is_already_exists() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("update_collision");

    let first = repo.create(new_user(&builder, "first")).await.unwrap();
    let mut second = repo.create(new_user(&builder, "second")).await.unwrap();

    second.username = first.username.clone();
    let err = repo.compare_and_swap_update(&second, 1).await.unwrap_err();
    assert!(matches!(err, UserError::AlreadyExists { field: UniqueField::Username, .. }));

    assert_eq!(repo.get_by_id(second.id).await.unwrap().version, 1);
}

#[tokio::test]
async fn test_soft_delete() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("soft_delete");

    let user = repo.create(new_user(&builder, "main")).await.unwrap();
    let version = repo
        .compare_and_swap_soft_delete(user.id, 1, Some("admin".into()), Utc::now())
        .await
        .unwrap();
    assert_eq!(version, 2);

    let stored = repo.get_by_id(user.id).await.unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.version, 2);
    assert_eq!(stored.updated_by.as_deref(), Some("admin"));
    assert_eq!(stored.full_name, user.full_name);

    let again = repo.compare_and_swap_soft_delete(user.id, 1, None, Utc::now()).await;
    assert!(matches!(again, Err(UserError::Conflict { actual: Some(2), .. })));

    // Deleted rows keep their values reserved.
    assert!(
        repo.exists_by_unique(UniqueField::Username, &user.username, None)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_exists_by_unique_exclusion() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("exists_exclusion");

    let user = repo.create(new_user(&builder, "main")).await.unwrap();

    assert!(repo.exists_by_unique(UniqueField::Email, &user.email, None).await.unwrap());
    assert!(
        !repo
            .exists_by_unique(UniqueField::Email, &user.email, Some(user.id))
            .await
            .unwrap()
    );
    assert!(
        !repo
            .exists_by_unique(UniqueField::Username, "someone-else", None)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_list_filters_orders_and_pages() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("list");

    let mut ids = Vec::new();
    for suffix in ["a", "b", "c", "d", "e"] {
        ids.push(repo.create(new_user(&builder, suffix)).await.unwrap().id);
    }
    repo.compare_and_swap_soft_delete(ids[4], 1, None, Utc::now())
        .await
        .unwrap();

    let all = UserFilter {
        size: 2,
        page: 0,
        ..Default::default()
    };
    let (items, total) = repo.list(&all).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(items.iter().map(|u| u.id).collect::<Vec<_>>(), [ids[4], ids[3]]);

    let last_page = UserFilter { page: 2, ..all.clone() };
    let (items, _) = repo.list(&last_page).await.unwrap();
    assert_eq!(items.iter().map(|u| u.id).collect::<Vec<_>>(), [ids[0]]);

    let active = UserFilter {
        is_active: Some(true),
        size: 10,
        ..Default::default()
    };
    let (items, total) = repo.list(&active).await.unwrap();
    assert_eq!(total, 4);
    assert!(items.iter().all(|u| u.is_active));

    let by_name = UserFilter {
        username: Some(builder.username("c")),
        size: 10,
        ..Default::default()
    };
    let (items, total) = repo.list(&by_name).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].id, ids[2]);
}

async fn race_updates(repo: SqlUserRepository, builder: TestDataBuilder, writers: usize) {
    let user = repo.create(new_user(&builder, "main")).await.unwrap();

    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let repo = repo.clone();
            let mut attempt = user.clone();
            attempt.full_name = format!("writer {i}");
            tokio::spawn(async move { repo.compare_and_swap_update(&attempt, 1).await })
        })
        .collect();

    let results = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let (version, losers) = assert_single_winner(results);

    assert_eq!(version, 2);
    assert_eq!(losers.len(), writers - 1);
    assert!(losers.iter().all(|e| matches!(e, UserError::Conflict { .. })));
    assert_eq!(repo.get_by_id(user.id).await.unwrap().version, 2);
}

async fn race_creates(repo: SqlUserRepository, builder: TestDataBuilder, writers: usize) {
    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let repo = repo.clone();
            let input = NewUser {
                email: builder.email(&format!("racer{i}")),
                ..new_user(&builder, "racer")
            };
            tokio::spawn(async move { repo.create(input).await })
        })
        .collect();

    let results = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let (_winner, losers) = assert_single_winner(results);

    assert_eq!(losers.len(), writers - 1);
    assert!(losers
        .iter()
        .all(|e| matches!(e, UserError::AlreadyExists { field: UniqueField::Username, .. })));
}

#[tokio::test]
async fn test_max_expected_version_is_a_conflict() {
    let (_db, repo) = repo().await;
    let builder = TestDataBuilder::from_test_name("max_version");

    let user = repo.create(new_user(&builder, "main")).await.unwrap();

    assert!(matches!(
        repo.compare_and_swap_update(&user, i32::MAX).await,
        Err(UserError::Conflict { expected: i32::MAX, actual: Some(1), .. })
    ));
    assert!(matches!(
        repo.compare_and_swap_soft_delete(user.id, i32::MAX, None, Utc::now()).await,
        Err(UserError::Conflict { actual: Some(1), .. })
    ));
    assert!(matches!(
        repo.compare_and_swap_soft_delete(user.id + 1, i32::MAX, None, Utc::now()).await,
        Err(UserError::NotFound(_))
    ));
    assert!(repo.get_by_id(user.id).await.unwrap().is_active);
}

#[tokio::test]
async fn test_concurrent_updates_have_one_winner() {
    let (_db, repo) = repo().await;
    race_updates(repo, TestDataBuilder::from_test_name("concurrent_updates"), 4).await;
}

#[tokio::test]
async fn test_concurrent_creates_have_one_winner() {
    let (_db, repo) = repo().await;
    race_creates(repo, TestDataBuilder::from_test_name("concurrent_creates"), 4).await;
}

// The Postgres pool holds several connections, so these statements really overlap.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker"]
async fn test_concurrent_updates_on_postgres() {
    let db = TestDatabase::postgres().await;
    let repo = SqlUserRepository::new(db.connection());
    race_updates(repo, TestDataBuilder::from_test_name("pg_concurrent_updates"), 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker"]
async fn test_concurrent_creates_on_postgres() {
    let db = TestDatabase::postgres().await;
    let repo = SqlUserRepository::new(db.connection());
    race_creates(repo, TestDataBuilder::from_test_name("pg_concurrent_creates"), 16).await;
}
