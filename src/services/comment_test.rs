use super::*;
use crate::state::test_helpers;

#[test]
fn author_falls_back_to_client() {
    assert_eq!(author_for(Some("Dana Ruiz")), "Dana Ruiz");
    assert_eq!(author_for(Some("  ")), "Client");
    assert_eq!(author_for(None), "Client");
}

#[test]
fn error_codes() {
    assert_eq!(CommentError::ContentRequired.error_code(), "content_required");
    assert_eq!(CommentError::ContentRequired.status(), StatusCode::BAD_REQUEST);
    assert_eq!(CommentError::StepNotFound(Uuid::nil()).status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_content_is_rejected_before_the_database() {
    let state = test_helpers::test_app_state();
    let result = create_comment(&state.pool, Uuid::new_v4(), Uuid::new_v4(), " \n ", "Client").await;
    assert!(matches!(result, Err(CommentError::ContentRequired)));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn comments_list_newest_first_and_check_the_step() {
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

    let first = create_comment(&pool, project, step_id, " love it ", "Dana").await.expect("comment");
    assert_eq!(first.content, "love it");
    assert!(first.created_at.ends_with('Z'));
    let second = create_comment(&pool, project, step_id, "more blue", "Dana").await.expect("comment");

    let listed = list_comments(&pool, step_id).await.expect("list");
    assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![second.id, first.id]);

    let wrong_project = create_comment(&pool, Uuid::new_v4(), step_id, "hi", "Dana").await;
    assert!(matches!(wrong_project, Err(CommentError::StepNotFound(_))));
}
