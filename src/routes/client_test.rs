use std::net::{IpAddr, Ipv4Addr};

use super::*;
use crate::state::test_helpers;

fn parts_with_code(code: Option<&str>) -> Parts {
    let mut builder = axum::http::Request::builder().uri("/api/client/project/x");
    if let Some(code) = code {
        builder = builder.header(CLIENT_CODE_HEADER, code);
    }
    builder.body(()).expect("request").into_parts().0
}

fn addr(last: u8) -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), 40_000))
}

#[tokio::test]
async fn client_code_header_is_required() {
    for code in [None, Some(""), Some("   ")] {
        let mut parts = parts_with_code(code);
        let rejection = ClientCode::from_request_parts(&mut parts, &()).await.err();
        assert_eq!(rejection, Some(ApiError::unauthorized()), "{code:?}");
    }
}

#[tokio::test]
async fn client_code_is_trimmed() {
    let mut parts = parts_with_code(Some("  spring-24 "));
    let ClientCode(code) = ClientCode::from_request_parts(&mut parts, &()).await.ok().expect("code");
    assert_eq!(code, "spring-24");
}

#[tokio::test]
async fn verify_requires_a_code() {
    let state = test_helpers::test_app_state();
    let err = verify(State(state), addr(1), Json(VerifyBody { code: "  ".into() })).await.err();
    assert_eq!(err, Some(ApiError::bad_request("code_required")));
}

#[tokio::test]
async fn verify_is_rate_limited_per_address() {
    let state = test_helpers::test_app_state();
    let limit = state.config.verify_limit;

    for _ in 0..limit {
        let err = verify(State(state.clone()), addr(2), Json(VerifyBody { code: String::new() })).await.err();
        assert_eq!(err.map(|e| e.code()), Some("code_required"));
    }
    let limited = verify(State(state.clone()), addr(2), Json(VerifyBody { code: String::new() })).await.err();
    assert_eq!(limited.map(|e| (e.status(), e.code())), Some((axum::http::StatusCode::TOO_MANY_REQUESTS, "rate_limited")));

    let other = verify(State(state), addr(3), Json(VerifyBody { code: String::new() })).await.err();
    assert_eq!(other.map(|e| e.code()), Some("code_required"));
}

#[tokio::test]
async fn limited_address_is_refused_before_the_code_lookup() {
    let state = test_helpers::test_app_state();
    for _ in 0..state.config.verify_limit {
        state.verify_limiter.check_and_record("10.0.0.4").ok().expect("within window");
    }

    // The test pool is lazy and unreachable, so a 429 here means no query ran.
    let project = get_project(State(state.clone()), addr(4), ClientCode("guess".into()), Path(Uuid::new_v4())).await.err();
    assert_eq!(project.map(|e| e.code()), Some("rate_limited"));

    let comment = create_comment(
        State(state.clone()),
        addr(4),
        ClientCode("guess".into()),
        Path((Uuid::new_v4(), Uuid::new_v4())),
        Json(CommentBody { content: "hi".into() }),
    )
    .await
    .err();
    assert_eq!(comment.map(|e| e.code()), Some("rate_limited"));

    let verified = verify(State(state), addr(4), Json(VerifyBody { code: "guess".into() })).await.err();
    assert_eq!(verified.map(|e| e.code()), Some("rate_limited"));
}

#[test]
fn public_project_hides_the_code() {
    let project = ProjectRow {
        id: Uuid::nil(),
        name: "Loft".into(),
        status: project::ProjectStatus::Active,
        client_name: Some("Ari".into()),
        client_code: Some("secret".into()),
    };
    let json = public_project(&project);
    assert_eq!(json["name"], "Loft");
    assert_eq!(json["clientName"], "Ari");
    assert!(json.get("clientCode").is_none());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn portal_flow_with_comments() {
    let pool = test_helpers::integration_pool().await;
    let mut state = test_helpers::test_app_state();
    state.pool = pool.clone();

    let project_id: Uuid =
        sqlx::query_scalar("INSERT INTO projects (name, client_name, client_code) VALUES ('Loft', NULL, 'abc') RETURNING id")
            .fetch_one(&pool)
            .await
            .expect("project");
    let step_id: Uuid =
        sqlx::query_scalar("INSERT INTO steps (project_id, order_index, title) VALUES ($1, 1, 'Step 1') RETURNING id")
            .bind(project_id)
            .fetch_one(&pool)
            .await
            .expect("step");

    let Json(verified) = verify(State(state.clone()), addr(9), Json(VerifyBody { code: " abc ".into() }))
        .await
        .ok()
        .expect("verify");
    assert_eq!(verified["projectId"], project_id.to_string());

    let unknown = verify(State(state.clone()), addr(9), Json(VerifyBody { code: "zzz".into() })).await.err();
    assert_eq!(unknown.map(|e| e.code()), Some("invalid_code"));

    let wrong = get_project(State(state.clone()), addr(10), ClientCode("nope".into()), Path(project_id)).await.err();
    assert_eq!(wrong, Some(ApiError::forbidden()));

    let Json(created) = create_comment(
        State(state.clone()),
        addr(10),
        ClientCode("abc".into()),
        Path((project_id, step_id)),
        Json(CommentBody { content: " Looks great ".into() }),
    )
    .await
    .ok()
    .expect("comment");
    assert_eq!(created["comment"]["author"], "Client");
    assert_eq!(created["comment"]["content"], "Looks great");

    let Json(view) = get_step(State(state), addr(10), ClientCode("abc".into()), Path((project_id, step_id)))
        .await
        .ok()
        .expect("step view");
    assert_eq!(view["comments"].as_array().map(Vec::len), Some(1));
    assert!(view["step"]["unassignedAssets"].is_array());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn rejected_header_codes_count_toward_the_verify_limit() {
    let pool = test_helpers::integration_pool().await;
    let mut state = test_helpers::test_app_state();
    state.pool = pool.clone();

    let project_id: Uuid =
        sqlx::query_scalar("INSERT INTO projects (name, client_code) VALUES ('Den', 'den-code') RETURNING id")
            .fetch_one(&pool)
            .await
            .expect("project");

    for _ in 0..state.config.verify_limit {
        let wrong = get_project(State(state.clone()), addr(12), ClientCode("nope".into()), Path(project_id)).await.err();
        assert_eq!(wrong, Some(ApiError::forbidden()));
    }

    let limited = get_project(State(state.clone()), addr(12), ClientCode("den-code".into()), Path(project_id)).await.err();
    assert_eq!(limited.map(|e| e.code()), Some("rate_limited"));

    let verify_limited = verify(State(state.clone()), addr(12), Json(VerifyBody { code: "den-code".into() })).await.err();
    assert_eq!(verify_limited.map(|e| e.code()), Some("rate_limited"));

    let Json(other) = get_project(State(state), addr(13), ClientCode("den-code".into()), Path(project_id))
        .await
        .ok()
        .expect("other address still allowed");
    assert_eq!(other["project"]["name"], "Den");
}
