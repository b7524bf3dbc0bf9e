use super::*;
use crate::services::auth::Role;
use crate::state::test_helpers;

fn admin() -> AdminUser {
    AdminUser(crate::services::session::SessionUser {
        id: Uuid::new_v4(),
        username: "studio".into(),
        name: None,
        role: Role::Admin,
    })
}

#[tokio::test]
async fn create_requires_a_name() {
    let state = test_helpers::test_app_state();
    let body = CreateProjectBody { name: "   ".into(), client_name: None, client_code: None };
    let err = create_project(State(state), admin(), Json(body)).await.err().expect("rejected");
    assert_eq!(err, ApiError::bad_request("name_required"));
}

#[tokio::test]
async fn update_rejects_unknown_status() {
    let state = test_helpers::test_app_state();
    let body = UpdateProjectBody { status: Some("GONE".into()), ..Default::default() };
    let err = update_project(State(state), admin(), Path(Uuid::new_v4()), Json(body)).await.err().expect("rejected");
    assert_eq!(err.code(), "invalid_status");
}

#[tokio::test]
async fn add_member_requires_username() {
    let state = test_helpers::test_app_state();
    let body = AddMemberBody { username: String::new() };
    let err = add_member(State(state), admin(), Path(Uuid::new_v4()), Json(body)).await.err().expect("rejected");
    assert_eq!(err.code(), "username_required");
}

#[tokio::test]
async fn move_requires_up_or_down() {
    let state = test_helpers::test_app_state();
    let body = MoveStepBody { direction: "sideways".into() };
    let err = move_step(State(state), admin(), Path((Uuid::new_v4(), Uuid::new_v4())), Json(body))
        .await
        .err()
        .expect("rejected");
    assert_eq!(err, ApiError::bad_request("invalid_direction"));
}

#[tokio::test]
async fn blank_step_title_is_rejected() {
    let state = test_helpers::test_app_state();
    let body = UpdateStepBody { title: Some(" ".into()), content: None };
    let err = update_step(State(state), admin(), Path((Uuid::new_v4(), Uuid::new_v4())), Json(body))
        .await
        .err()
        .expect("rejected");
    assert_eq!(err.code(), "title_required");
}

#[test]
fn bodies_accept_camel_case() {
    let body: UpdateProjectBody =
        serde_json::from_str(r#"{"clientName":"Dana","clientCode":"x1"}"#).expect("parse");
    assert_eq!(body.client_name.as_deref(), Some("Dana"));
    assert_eq!(body.client_code.as_deref(), Some("x1"));
    assert!(body.name.is_none());

    let create: CreateProjectBody = serde_json::from_str("{}").expect("name defaults to empty");
    assert!(create.name.is_empty());
}
