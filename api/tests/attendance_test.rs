mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use api::auth::generate_jwt;
use db::models::class_enrollment;
use helpers::{authed_json_request, authed_request, make_test_app, response_json};

const CLASS: i64 = 7;
const SUBJECT: i64 = 301;
const TEACHER: i64 = 1;
const S1: i64 = 101;
const S2: i64 = 102;
const S3: i64 = 103;

#[tokio::test]
async fn end_to_end_issue_redeem_cancel_report() {
    let (app, db) = make_test_app().await;
    for s in [S1, S2, S3] {
        class_enrollment::Model::enroll(&db, CLASS, s).await.unwrap();
    }

    let (teacher_jwt, _) = generate_jwt(TEACHER, false);

    // Teacher issues a token for one class session.
    let res = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/classes/{CLASS}/attendance/tokens"),
            &teacher_jwt,
            json!({ "subject_id": SUBJECT, "validity_minutes": 10 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = response_json(res).await;
    assert_eq!(body["success"], true);
    let code = body["data"]["code"].as_str().unwrap().to_owned();
    let token_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(code.len(), 64);
    assert_eq!(body["data"]["payload"]["subject_id"], SUBJECT);

    // The scannable payload can be re-fetched for display.
    let res = app
        .clone()
        .oneshot(authed_request(
            "GET",
            &format!("/api/classes/{CLASS}/attendance/tokens/{token_id}/payload"),
            &teacher_jwt,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = response_json(res).await;
    assert_eq!(body["data"]["code"], code.as_str());

    // First student redeems: confirmed.
    let (s1_jwt, _) = generate_jwt(S1, false);
    let redeem_uri = format!("/api/classes/{CLASS}/attendance/redeem");
    let redeem_body = json!({ "code": code, "subject_id": SUBJECT });
    let res = app
        .clone()
        .oneshot(authed_json_request("POST", &redeem_uri, &s1_jwt, redeem_body.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = response_json(res).await;
    assert_eq!(body["message"], "Attendance recorded");

    // Double-tap: "already recorded", not a generic failure.
    let res = app
        .clone()
        .oneshot(authed_json_request("POST", &redeem_uri, &s1_jwt, redeem_body.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = response_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Attendance already recorded");

    // Second student redeems independently.
    let (s2_jwt, _) = generate_jwt(S2, false);
    let res = app
        .clone()
        .oneshot(authed_json_request("POST", &redeem_uri, &s2_jwt, redeem_body.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Teacher cancels the token; the third student is clearly told expiry.
    let res = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/classes/{CLASS}/attendance/tokens/{token_id}"),
            &teacher_jwt,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (s3_jwt, _) = generate_jwt(S3, false);
    let res = app
        .clone()
        .oneshot(authed_json_request("POST", &redeem_uri, &s3_jwt, redeem_body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GONE);
    let body = response_json(res).await;
    assert_eq!(body["message"], "This code has expired");

    // Compiled report over the default window.
    let res = app
        .clone()
        .oneshot(authed_request(
            "GET",
            &format!("/api/classes/{CLASS}/attendance/report"),
            &teacher_jwt,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = response_json(res).await;
    let per_student = body["data"]["per_student"].as_array().unwrap();
    assert_eq!(per_student.len(), 3);

    // Two ledger documents in the window; S1 and S2 each attended one.
    assert_eq!(per_student[0]["student_id"], S1);
    assert_eq!(per_student[0]["total_sessions"], 2);
    assert_eq!(per_student[0]["attended_sessions"], 1);
    assert_eq!(per_student[0]["percentage"], 50.0);
    assert_eq!(per_student[0]["tier"], "critical");
    assert_eq!(per_student[2]["student_id"], S3);
    assert_eq!(per_student[2]["attended_sessions"], 0);

    // Compilation is pure: a second run returns the identical report.
    let res = app
        .clone()
        .oneshot(authed_request(
            "GET",
            &format!("/api/classes/{CLASS}/attendance/report"),
            &teacher_jwt,
        ))
        .await
        .unwrap();
    let again = response_json(res).await;
    assert_eq!(again["data"], body["data"]);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let (app, db) = make_test_app().await;
    class_enrollment::Model::enroll(&db, CLASS, S1).await.unwrap();

    let (s1_jwt, _) = generate_jwt(S1, false);
    let res = app
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/classes/{CLASS}/attendance/redeem"),
            &s1_jwt,
            json!({ "code": "definitely-not-issued", "subject_id": SUBJECT }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = response_json(res).await;
    assert_eq!(body["message"], "Invalid attendance code");
}

#[tokio::test]
async fn unenrolled_student_is_forbidden() {
    let (app, db) = make_test_app().await;
    class_enrollment::Model::enroll(&db, CLASS, S1).await.unwrap();

    let (teacher_jwt, _) = generate_jwt(TEACHER, false);
    let res = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/classes/{CLASS}/attendance/tokens"),
            &teacher_jwt,
            json!({ "subject_id": SUBJECT }),
        ))
        .await
        .unwrap();
    let code = response_json(res).await["data"]["code"]
        .as_str()
        .unwrap()
        .to_owned();

    let (outsider_jwt, _) = generate_jwt(999, false);
    let res = app
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/classes/{CLASS}/attendance/redeem"),
            &outsider_jwt,
            json!({ "code": code, "subject_id": SUBJECT }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_redemption_payload_is_rejected_before_lookup() {
    let (app, _db) = make_test_app().await;

    let (s1_jwt, _) = generate_jwt(S1, false);
    let res = app
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/classes/{CLASS}/attendance/redeem"),
            &s1_jwt,
            json!({ "code": "", "subject_id": SUBJECT }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = response_json(res).await;
    assert_eq!(body["message"], "Invalid attendance code");
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let (app, _db) = make_test_app().await;

    let res = app
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri(format!("/api/classes/{CLASS}/attendance/tokens"))
                .header("Content-Type", "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&json!({ "subject_id": SUBJECT })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cancelling_unknown_token_is_not_found() {
    let (app, _db) = make_test_app().await;

    let (teacher_jwt, _) = generate_jwt(TEACHER, false);
    let res = app
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/classes/{CLASS}/attendance/tokens/424242"),
            &teacher_jwt,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
