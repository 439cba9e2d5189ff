mod common;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use sambung_ayat::db::{Db, OpenOutcome};
use sambung_ayat::services::scoring::TrackedAnswer;
use sambung_ayat::{names, router};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> (axum::Router, Db) {
    let db = common::create_test_db().await;
    (router(common::app_state(db.clone())), db)
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    /// Value of the cookie named `name` among the `Set-Cookie` headers.
    fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|c| {
                let pair = c.split(';').next()?;
                let (k, v) = pair.split_once('=')?;
                (k == name).then(|| v.to_string())
            })
    }
}

async fn send(
    app: &axum::Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(value) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let resp = app
        .clone()
        .oneshot(req.body(body).expect("request build should succeed"))
        .await
        .expect("router should respond");

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    Reply {
        status,
        headers,
        body,
    }
}

fn login_cookie(token: &str) -> String {
    format!("{}={token}", names::USER_SESSION_COOKIE_NAME)
}

fn id(value: &Value) -> u32 {
    value["id"].as_u64().unwrap() as u32
}

#[tokio::test]
async fn health_answers_ok() {
    let (app, _) = app().await;
    let reply = send(&app, Method::GET, names::HEALTH_URL, None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, Value::String("ok".into()));
}

#[tokio::test]
async fn tracked_routes_reject_callers_without_a_login() {
    let (app, _) = app().await;
    let guest = format!("{}={}", names::GUEST_COOKIE_NAME, ulid::Ulid::new());
    let summary = names::session_url("s");

    let cases = [
        (Method::POST, names::START_SESSION_URL, Some(json!({}))),
        (
            Method::POST,
            names::END_SESSION_URL,
            Some(json!({ "sessionId": "s" })),
        ),
        (Method::GET, summary.as_str(), None),
        (Method::GET, "/question?sessionId=s", None),
        (
            Method::POST,
            names::VALIDATE_URL,
            Some(json!({ "selectedAyahId": 2, "sessionId": "s", "questionId": "q" })),
        ),
        (
            Method::PUT,
            names::DISPLAY_NAME_URL,
            Some(json!({ "displayName": "x" })),
        ),
        (Method::DELETE, names::USER_URL, None),
    ];

    for (method, uri, body) in cases {
        for cookie in [None, Some(guest.as_str())] {
            let reply = send(&app, method.clone(), uri, cookie, body.clone()).await;
            assert_eq!(
                reply.status,
                StatusCode::UNAUTHORIZED,
                "expected UNAUTHORIZED for {method} {uri} with {cookie:?}",
            );
            assert_eq!(reply.body["error"], "UNAUTHORIZED");
        }
    }
}

#[tokio::test]
async fn anonymous_callers_get_a_guest_identity() {
    let (app, db) = app().await;

    let reply = send(&app, Method::GET, names::CURRENT_USER_URL, None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["isGuest"], true);
    assert!(reply.body["displayName"].as_str().unwrap().starts_with("Hamba-"));

    let guest_id = reply.cookie(names::GUEST_COOKIE_NAME).unwrap();
    assert_eq!(reply.body["id"], guest_id.as_str());
    assert!(db.find_user(&guest_id).await.unwrap().unwrap().is_guest);

    // The cookie is reused, not replaced
    let cookie = format!("{}={guest_id}", names::GUEST_COOKIE_NAME);
    let again = send(&app, Method::GET, names::CURRENT_USER_URL, Some(&cookie), None).await;
    assert_eq!(again.body["id"], guest_id.as_str());
    assert!(again.cookie(names::GUEST_COOKIE_NAME).is_none());
}

#[tokio::test]
async fn auth_callback_requires_the_shared_secret() {
    let (app, _) = app().await;

    for secret in [None, Some("wrong")] {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri(names::AUTH_CALLBACK_URL)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            req = req.header(names::IDENTITY_SECRET_HEADER, secret);
        }
        let resp = app
            .clone()
            .oneshot(
                req.body(Body::from(json!({ "accountId": "acct-1" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

async fn callback(app: &axum::Router, cookie: Option<&str>, body: Value) -> Reply {
    let mut req = Request::builder()
        .method(Method::POST)
        .uri(names::AUTH_CALLBACK_URL)
        .header(header::CONTENT_TYPE, "application/json")
        .header(names::IDENTITY_SECRET_HEADER, common::CALLBACK_SECRET);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    let resp = app
        .clone()
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        headers,
        body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
    }
}

#[tokio::test]
async fn sign_in_merges_the_guest_and_swaps_cookies() {
    let (app, db) = app().await;

    // A guest with some history
    let guest_id = ulid::Ulid::new().to_string();
    db.ensure_guest(&guest_id, "Hamba-0042").await.unwrap();
    let session = db.start_session(&guest_id, 5, Utc::now()).await.unwrap();
    let OpenOutcome::Opened(question_id) = db
        .open_pending_question(&guest_id, &session.id, 1, 2, Utc::now())
        .await
        .unwrap()
    else {
        panic!("question should open");
    };
    let answer = TrackedAnswer {
        user_id: guest_id.clone(),
        session_id: session.id.clone(),
        question_id,
        selected_ayah_id: 2,
    };
    db.record_answer(&answer, Utc::now(), common::utc())
        .await
        .unwrap();

    let guest_cookie = format!("{}={guest_id}", names::GUEST_COOKIE_NAME);
    let reply = callback(
        &app,
        Some(&guest_cookie),
        json!({ "accountId": "acct-1", "email": "a@example.com", "displayName": "Fulan" }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], "acct-1");
    assert_eq!(reply.body["isGuest"], false);
    assert_eq!(reply.body["displayName"], "Fulan");
    assert_eq!(reply.body["totalPoints"], 10);
    assert_eq!(reply.body["totalAttempted"], 1);

    let token = reply.cookie(names::USER_SESSION_COOKIE_NAME).unwrap();
    assert!(!token.is_empty());
    assert_eq!(reply.cookie(names::GUEST_COOKIE_NAME).as_deref(), Some(""));
    assert!(db.find_user(&guest_id).await.unwrap().is_none());

    let me = send(
        &app,
        Method::GET,
        names::CURRENT_USER_URL,
        Some(&login_cookie(&token)),
        None,
    )
    .await;
    assert_eq!(me.body["id"], "acct-1");

    // The guest id now names nothing, so a reused cookie merges nothing
    let second = callback(&app, Some(&guest_cookie), json!({ "accountId": "acct-1" })).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["totalPoints"], 10);
}

#[tokio::test]
async fn sign_in_rejects_blank_and_guest_account_ids() {
    let (app, db) = app().await;
    let guest_id = ulid::Ulid::new().to_string();
    db.ensure_guest(&guest_id, "Hamba-0001").await.unwrap();

    let blank = callback(&app, None, json!({ "accountId": "   " })).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let guest = callback(&app, None, json!({ "accountId": guest_id })).await;
    assert_eq!(guest.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn a_tracked_session_scores_each_question_once() {
    let (app, db) = app().await;
    let (_, token) = common::signed_in(&db, "acct-1").await;
    let cookie = login_cookie(&token);

    let started = send(
        &app,
        Method::POST,
        names::START_SESSION_URL,
        Some(&cookie),
        Some(json!({ "maxQuestions": 2 })),
    )
    .await;
    assert_eq!(started.status, StatusCode::OK);
    assert_eq!(started.body["maxQuestions"], 2);
    assert_eq!(started.body["remainingQuestions"], 2);
    let session_id = started.body["sessionId"].as_str().unwrap().to_string();

    let question_uri = format!("{}?juz=1&sessionId={session_id}", names::QUESTION_URL);
    let q1 = send(&app, Method::GET, &question_uri, Some(&cookie), None).await;
    assert_eq!(q1.status, StatusCode::OK);
    let question_id = q1.body["questionId"].as_str().unwrap().to_string();
    let current = id(&q1.body["currentAyah"]);
    let options = q1.body["options"].as_array().unwrap();
    assert_eq!(options.len(), 4);
    assert!(options.iter().any(|o| id(o) == current + 1));

    let submit = json!({
        "selectedAyahId": current + 1,
        "sessionId": session_id,
        "questionId": question_id,
    });
    let first = send(&app, Method::POST, names::VALIDATE_URL, Some(&cookie), Some(submit.clone())).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["isCorrect"], true);
    assert_eq!(first.body["pointsGained"], 10);
    assert_eq!(first.body["alreadyAnswered"], false);
    assert_eq!(first.body["comboStreak"], 1);
    assert_eq!(first.body["remainingQuestions"], 1);
    assert_eq!(first.body["sessionFinished"], false);
    assert!(first.body.get("correctAyah").is_none());

    let replay = send(&app, Method::POST, names::VALIDATE_URL, Some(&cookie), Some(submit)).await;
    assert_eq!(replay.status, StatusCode::OK);
    assert_eq!(replay.body["isCorrect"], true);
    assert_eq!(replay.body["pointsGained"], 0);
    assert_eq!(replay.body["alreadyAnswered"], true);

    // Second question answered wrong closes the session
    let q2 = send(&app, Method::GET, &question_uri, Some(&cookie), None).await;
    let current = id(&q2.body["currentAyah"]);
    let wrong = q2.body["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(id)
        .find(|o| *o != current + 1)
        .unwrap();
    let second = send(
        &app,
        Method::POST,
        names::VALIDATE_URL,
        Some(&cookie),
        Some(json!({
            "selectedAyahId": wrong,
            "sessionId": session_id,
            "questionId": q2.body["questionId"],
        })),
    )
    .await;
    assert_eq!(second.body["isCorrect"], false);
    assert_eq!(second.body["pointsGained"], 0);
    assert_eq!(second.body["sessionFinished"], true);
    assert_eq!(second.body["remainingQuestions"], 0);
    assert_eq!(id(&second.body["correctAyah"]), current + 1);

    let closed = send(&app, Method::GET, &question_uri, Some(&cookie), None).await;
    assert_eq!(closed.status, StatusCode::GONE);
    assert_eq!(closed.body["error"], "SESSION_EXPIRED");

    let summary = send(&app, Method::GET, &names::session_url(&session_id), Some(&cookie), None).await;
    assert_eq!(summary.status, StatusCode::OK);
    assert_eq!(summary.body["totalQuestions"], 2);
    assert_eq!(summary.body["correctAnswers"], 1);
    assert_eq!(summary.body["totalPoints"], 10);
    assert_eq!(summary.body["finished"], true);
}

#[tokio::test]
async fn a_question_cannot_be_answered_through_another_session() {
    let (app, db) = app().await;
    let (_, owner) = common::signed_in(&db, "owner").await;
    let (_, thief) = common::signed_in(&db, "thief").await;
    let owner = login_cookie(&owner);
    let thief = login_cookie(&thief);

    let own = send(&app, Method::POST, names::START_SESSION_URL, Some(&owner), Some(json!({}))).await;
    let theirs = send(&app, Method::POST, names::START_SESSION_URL, Some(&thief), Some(json!({}))).await;
    assert_eq!(own.body["maxQuestions"], 10);

    let uri = format!("{}?sessionId={}", names::QUESTION_URL, own.body["sessionId"].as_str().unwrap());
    let question = send(&app, Method::GET, &uri, Some(&owner), None).await;

    // The thief's own session id, or the owner's, neither works
    for session in [&theirs.body["sessionId"], &own.body["sessionId"]] {
        let reply = send(
            &app,
            Method::POST,
            names::VALIDATE_URL,
            Some(&thief),
            Some(json!({
                "selectedAyahId": 1,
                "sessionId": session,
                "questionId": question.body["questionId"],
            })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error"], "INVALID_QUESTION");
    }

    // Opening a question in someone else's session
    let foreign = send(&app, Method::GET, &uri, Some(&thief), None).await;
    assert_eq!(foreign.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_size_is_clamped() {
    let (app, db) = app().await;
    let (_, token) = common::signed_in(&db, "acct-1").await;
    let cookie = login_cookie(&token);

    for (asked, expected) in [(0, 1), (-5, 1), (1000, 100), (7, 7)] {
        let reply = send(
            &app,
            Method::POST,
            names::START_SESSION_URL,
            Some(&cookie),
            Some(json!({ "maxQuestions": asked })),
        )
        .await;
        assert_eq!(reply.body["maxQuestions"], expected, "asked for {asked}");
    }

    let sessions = db.open_sessions("acct-1").await.unwrap();
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn untracked_validation_checks_the_next_verse() {
    let (app, _) = app().await;

    let wrong = send(
        &app,
        Method::POST,
        names::VALIDATE_URL,
        None,
        Some(json!({ "currentAyahId": 3, "selectedAyahId": 5 })),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::OK);
    assert_eq!(wrong.body["isCorrect"], false);
    assert_eq!(wrong.body["pointsGained"], 0);
    assert_eq!(id(&wrong.body["correctAyah"]), 4);
    assert!(wrong.body.get("totalPoints").is_none());

    let right = send(
        &app,
        Method::POST,
        names::VALIDATE_URL,
        None,
        Some(json!({ "currentAyahId": 3, "selectedAyahId": 4 })),
    )
    .await;
    assert_eq!(right.body["isCorrect"], true);

    // Verse 8 closes the first surah
    let last = send(
        &app,
        Method::POST,
        names::VALIDATE_URL,
        None,
        Some(json!({ "currentAyahId": 8, "selectedAyahId": 9 })),
    )
    .await;
    assert_eq!(last.status, StatusCode::BAD_REQUEST);

    let half = send(
        &app,
        Method::POST,
        names::VALIDATE_URL,
        None,
        Some(json!({ "selectedAyahId": 4, "sessionId": "s" })),
    )
    .await;
    assert_eq!(half.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn questions_respect_the_verse_filter() {
    let (app, _) = app().await;

    for _ in 0..10 {
        let reply = send(&app, Method::GET, "/question?surah=3-4&lang=en", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(reply.body.get("questionId").is_none());
        let surah = reply.body["currentAyah"]["surah"].as_u64().unwrap();
        assert!((3..=4).contains(&surah));
    }

    // Juz 2 holds surahs 3 and 4 only; the question still comes back
    let empty = send(&app, Method::GET, "/question?juz=2&surah=10", None, None).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["options"].as_array().unwrap().len(), 4);

    for bad in ["/question?juz=31", "/question?juz=abc", "/question?surah=115", "/question?surah=9-3"] {
        let reply = send(&app, Method::GET, bad, None, None).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(reply.body["error"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn surahs_are_listed_per_juz() {
    let (app, _) = app().await;

    let reply = send(&app, Method::GET, "/surahs?juz=2,1", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let ids: Vec<_> = reply
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(reply.body[0]["englishName"], "Surah 1");

    let missing = send(&app, Method::GET, names::SURAHS_URL, None, None).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn display_names_are_validated() {
    let (app, db) = app().await;
    let (_, token) = common::signed_in(&db, "acct-1").await;
    let cookie = login_cookie(&token);

    let long = "x".repeat(51);
    for bad in ["", "   ", long.as_str()] {
        let reply = send(
            &app,
            Method::PUT,
            names::DISPLAY_NAME_URL,
            Some(&cookie),
            Some(json!({ "displayName": bad })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    let reply = send(
        &app,
        Method::PUT,
        names::DISPLAY_NAME_URL,
        Some(&cookie),
        Some(json!({ "displayName": "  Fulan bin Fulan  " })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["displayName"], "Fulan bin Fulan");

    let me = send(&app, Method::GET, names::CURRENT_USER_URL, Some(&cookie), None).await;
    assert_eq!(me.body["displayName"], "Fulan bin Fulan");
}

#[tokio::test]
async fn leaderboard_includes_the_callers_rank() {
    let (app, db) = app().await;
    let (_, token) = common::signed_in(&db, "acct-1").await;
    common::create_account(&db, "acct-2").await;
    let cookie = login_cookie(&token);

    let session = db.start_session("acct-2", 5, Utc::now()).await.unwrap();
    let OpenOutcome::Opened(question_id) = db
        .open_pending_question("acct-2", &session.id, 1, 2, Utc::now())
        .await
        .unwrap()
    else {
        panic!("question should open");
    };
    db.record_answer(
        &TrackedAnswer {
            user_id: "acct-2".into(),
            session_id: session.id,
            question_id,
            selected_ayah_id: 2,
        },
        Utc::now(),
        common::utc(),
    )
    .await
    .unwrap();

    let reply = send(&app, Method::GET, "/leaderboard?sortBy=points", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let entries = reply.body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["userId"], "acct-2");
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(reply.body["me"]["userId"], "acct-1");
    assert_eq!(reply.body["me"]["rank"], 2);

    let anonymous = send(&app, Method::GET, names::LEADERBOARD_URL, None, None).await;
    assert!(anonymous.body.get("me").is_none());

    // Unknown sort keys rank by points
    let unknown = send(&app, Method::GET, "/leaderboard?sortBy=speed", Some(&cookie), None).await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(unknown.body["entries"][0]["userId"], "acct-2");
    assert_eq!(unknown.body["me"]["rank"], 2);
}

#[tokio::test]
async fn logout_and_deletion_end_the_login() {
    let (app, db) = app().await;
    let (_, first) = common::signed_in(&db, "acct-1").await;
    let first = login_cookie(&first);

    let out = send(&app, Method::POST, names::LOGOUT_URL, Some(&first), None).await;
    assert_eq!(out.status, StatusCode::NO_CONTENT);
    assert_eq!(out.cookie(names::USER_SESSION_COOKIE_NAME).as_deref(), Some(""));
    let after = send(&app, Method::POST, names::START_SESSION_URL, Some(&first), Some(json!({}))).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);

    let second = login_cookie(&db.create_login_session("acct-1").await.unwrap());
    let deleted = send(&app, Method::DELETE, names::USER_URL, Some(&second), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(db.find_user("acct-1").await.unwrap().is_none());

    let me = send(&app, Method::GET, names::CURRENT_USER_URL, Some(&second), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}
