use super::*;
use crate::state::test_helpers;

#[test]
fn named_boards_are_numbered_after_the_unassigned_bucket() {
    assert_eq!(concept_name(0), "Concept 2");
    assert_eq!(concept_name(3), "Concept 5");
}

#[test]
fn error_codes() {
    assert_eq!(MoodboardError::NotFound(Uuid::nil()).status(), StatusCode::NOT_FOUND);
    assert_eq!(MoodboardError::StepNotFound(Uuid::nil()).error_code(), "not_found");
    assert_eq!(MoodboardError::NameRequired.error_code(), "name_required");
}

#[test]
fn boards_serialize_flat_with_assets() {
    let board = MoodboardWithAssets {
        board: MoodboardRow {
            id: Uuid::nil(),
            step_id: Uuid::nil(),
            name: "Concept 2".into(),
            content: None,
            order: 0,
            locked: true,
        },
        assets: vec![],
    };
    let json = serde_json::to_value(&board).expect("serialize");
    assert_eq!(json["name"], "Concept 2");
    assert_eq!(json["locked"], true);
    assert_eq!(json["stepId"], Uuid::nil().to_string());
    assert!(json["assets"].as_array().is_some_and(Vec::is_empty));
}

#[tokio::test]
async fn blank_rename_is_rejected_before_the_database() {
    let state = test_helpers::test_app_state();
    let changes = MoodboardChanges { name: Some("  ".into()), ..Default::default() };
    let result = update_moodboard(&state.pool, Uuid::new_v4(), Uuid::new_v4(), changes).await;
    assert!(matches!(result, Err(MoodboardError::NameRequired)));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn create_update_and_delete() {
    let pool = test_helpers::integration_pool().await;
    let project: Uuid = sqlx::query_scalar("INSERT INTO projects (name) VALUES ('P') RETURNING id")
        .fetch_one(&pool)
        .await
        .expect("project");
    let step_id: Uuid =
        sqlx::query_scalar("INSERT INTO steps (project_id, order_index, title) VALUES ($1, 1, 'Step 1') RETURNING id")
            .bind(project)
            .fetch_one(&pool)
            .await
            .expect("step");

    let first = create_moodboard(&pool, step_id).await.expect("create");
    let second = create_moodboard(&pool, step_id).await.expect("create");
    assert_eq!((first.name.as_str(), first.order), ("Concept 2", 0));
    assert_eq!((second.name.as_str(), second.order), ("Concept 3", 1));

    let locked = update_moodboard(
        &pool,
        step_id,
        first.id,
        MoodboardChanges { name: Some(" Warm ".into()), content: Some("notes".into()), locked: Some(true) },
    )
    .await
    .expect("update");
    assert_eq!(locked.name, "Warm");
    assert!(locked.locked);

    sqlx::query("INSERT INTO assets (step_id, moodboard_id, kind, url, blob_key, filename) VALUES ($1, $2, 'IMAGE', 'u', 'k1', 'a.png')")
        .bind(step_id)
        .bind(first.id)
        .execute(&pool)
        .await
        .expect("asset");

    let listed = list_moodboards(&pool, step_id).await.expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].assets.len(), 1);

    assert_eq!(delete_moodboard(&pool, step_id, first.id).await.expect("delete"), vec!["k1".to_owned()]);
    assert!(matches!(delete_moodboard(&pool, step_id, first.id).await, Err(MoodboardError::NotFound(_))));
    assert!(matches!(create_moodboard(&pool, Uuid::new_v4()).await, Err(MoodboardError::StepNotFound(_))));
}
