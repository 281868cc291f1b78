// tests/api_tests.rs

mod common;

use chrono::{Duration, Utc};
use common::{bearer, create_quiz, create_user, sample_payload, spawn_app};
use quizdesk::models::user::Role;
use serde_json::{Value, json};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_then_login_issues_student_token() {
    let app = spawn_app().await;
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["role"], "student");
    assert!(user.get("password").is_none(), "hash must not be serialized");

    // Duplicate username
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let login: Value = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");
    let token = login["token"].as_str().expect("Token not found");
    assert_eq!(login["role"], "student");

    // The token opens protected routes.
    let response = app
        .client
        .get(app.url("/api/quizzes"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Wrong password
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": username, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn router_rejects_missing_token_without_a_server() {
    let pool = common::test_pool().await;
    let state = quizdesk::state::AppState {
        pool,
        config: common::test_config(),
    };
    let app = quizdesk::create_router(state);

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/api/submissions")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;

    // Username too short
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;

    for path in ["/api/quizzes", "/api/submissions", "/api/admin/users"] {
        let response = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 401, "{}", path);
    }

    let response = app
        .client
        .get(app.url("/api/quizzes"))
        .header("Authorization", "Bearer not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_creates_instructor_who_authors_quiz() {
    let app = spawn_app().await;
    let admin = create_user(&app.pool, Role::Admin).await;
    let student = create_user(&app.pool, Role::Student).await;

    // Students are kept out of the admin area.
    let response = app
        .client
        .get(app.url("/api/admin/users"))
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .post(app.url("/api/admin/users"))
        .header("Authorization", bearer(&admin))
        .json(&json!({ "username": "prof_oak", "password": "pallet-town", "role": "instructor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let login: Value = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": "prof_oak", "password": "pallet-town" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login["role"], "instructor");
    let token = login["token"].as_str().unwrap();

    let response = app
        .client
        .post(app.url("/api/quizzes"))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": "Pokemon types",
            "is_published": true,
            "questions": [
                {
                    "question_text": "Water beats fire.",
                    "question_type": "truefalse",
                    "points": 1.0,
                    "options": [
                        { "option_text": "True", "is_correct": true },
                        { "option_text": "False" }
                    ]
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let quiz: Value = response.json().await.unwrap();
    assert_eq!(quiz["title"], "Pokemon types");
    assert_eq!(quiz["questions"][0]["options"][0]["is_correct"], true);

    // Students cannot author.
    let response = app
        .client
        .post(app.url("/api/quizzes"))
        .header("Authorization", bearer(&student))
        .json(&json!({ "title": "Nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn malformed_quiz_payload_is_rejected() {
    let app = spawn_app().await;
    let instructor = create_user(&app.pool, Role::Instructor).await;

    let cases = [
        json!({
            "title": "No options",
            "questions": [{ "question_text": "Pick one", "question_type": "mcq", "options": [] }]
        }),
        json!({
            "title": "No correct option",
            "questions": [{
                "question_text": "Pick one",
                "question_type": "mcq",
                "options": [{ "option_text": "A" }, { "option_text": "B" }]
            }]
        }),
        json!({
            "title": "Inverted window",
            "start_time": "2030-01-02T00:00:00Z",
            "end_time": "2030-01-01T00:00:00Z"
        }),
    ];

    for body in cases {
        let response = app
            .client
            .post(app.url("/api/quizzes"))
            .header("Authorization", bearer(&instructor))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400, "{}", body["title"]);
    }
}

#[tokio::test]
async fn submit_then_grade_end_to_end() {
    let app = spawn_app().await;
    let instructor = create_user(&app.pool, Role::Instructor).await;
    let student = create_user(&app.pool, Role::Student).await;
    let quiz = create_quiz(&app.pool, &instructor, &sample_payload(), Utc::now()).await;

    let tf = &quiz.questions[0];
    let subjective = &quiz.questions[1];
    let correct = common::correct_options(&quiz, 0);

    // Students see no correctness flags.
    let student_view: Value = app
        .client
        .get(app.url(&format!("/api/quizzes/{}", quiz.quiz.id)))
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(student_view["is_active_now"], true);
    for option in student_view["questions"][0]["options"].as_array().unwrap() {
        assert!(option.get("is_correct").is_none());
    }

    // Submit
    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/submit", quiz.quiz.id)))
        .header("Authorization", bearer(&student))
        .json(&json!({
            "answers": [
                { "question": tf.id, "selected_options": correct },
                { "question": subjective.id, "text_answer": "answer text" }
            ]
        }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(response.status().as_u16(), 201);

    let submitted: Value = response.json().await.unwrap();
    assert_eq!(submitted["status"], "submitted");
    assert_eq!(submitted["total_points_possible"], 5.0);
    assert_eq!(submitted["total_points_earned"], 2.0);
    assert_eq!(submitted["percentage"], 40.0);
    assert!(submitted["submitted_at"].is_string());
    assert!(submitted["graded_at"].is_null());

    let submission_id = submitted["id"].as_i64().unwrap();
    let subjective_answer = submitted["answers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["question"]["id"] == subjective.id)
        .expect("subjective answer present");
    assert_eq!(subjective_answer["text_answer"], "answer text");
    let answer_id = subjective_answer["id"].as_i64().unwrap();

    // The student may not grade their own work.
    let response = app
        .client
        .post(app.url(&format!("/api/submissions/{}/grade", submission_id)))
        .header("Authorization", bearer(&student))
        .json(&json!({ "grades": [{ "answer_id": answer_id, "points_awarded": 3.0 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Grade
    let response = app
        .client
        .post(app.url(&format!("/api/submissions/{}/grade", submission_id)))
        .header("Authorization", bearer(&instructor))
        .json(&json!({ "grades": [{ "answer_id": answer_id, "points_awarded": 2.5 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let graded: Value = response.json().await.unwrap();
    assert_eq!(graded["status"], "graded");
    assert_eq!(graded["total_points_earned"], 4.5);
    assert_eq!(graded["percentage"], 90.0);
    assert!(graded["graded_at"].is_string());

    // The student reads the graded result back.
    let mine: Value = app
        .client
        .get(app.url(&format!("/api/submissions/{}", submission_id)))
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["status"], "graded");
    assert_eq!(mine["total_points_earned"], 4.5);
}

#[tokio::test]
async fn submissions_are_private_to_their_owner() {
    let app = spawn_app().await;
    let instructor = create_user(&app.pool, Role::Instructor).await;
    let other_instructor = create_user(&app.pool, Role::Instructor).await;
    let student = create_user(&app.pool, Role::Student).await;
    let other_student = create_user(&app.pool, Role::Student).await;
    let quiz = create_quiz(&app.pool, &instructor, &sample_payload(), Utc::now()).await;

    let submitted: Value = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/submit", quiz.quiz.id)))
        .header("Authorization", bearer(&student))
        .json(&json!({ "answers": [{ "question": quiz.questions[1].id, "text_answer": "mine" }] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let submission_id = submitted["id"].as_i64().unwrap();

    // Another student cannot tell it exists.
    let response = app
        .client
        .get(app.url(&format!("/api/submissions/{}", submission_id)))
        .header("Authorization", bearer(&other_student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Nor can an instructor who does not own the quiz grade it.
    let response = app
        .client
        .post(app.url(&format!("/api/submissions/{}/grade", submission_id)))
        .header("Authorization", bearer(&other_instructor))
        .json(&json!({ "grades": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/submissions"))
        .header("Authorization", bearer(&other_student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());

    let listed: Vec<Value> = app
        .client
        .get(app.url(&format!("/api/submissions?quiz={}", quiz.quiz.id)))
        .header("Authorization", bearer(&instructor))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], submission_id);
}

#[tokio::test]
async fn submit_outside_window_is_rejected() {
    let app = spawn_app().await;
    let instructor = create_user(&app.pool, Role::Instructor).await;
    let student = create_user(&app.pool, Role::Student).await;
    let now = Utc::now();

    let mut upcoming = sample_payload();
    upcoming.start_time = Some(now + Duration::hours(1));
    let upcoming = create_quiz(&app.pool, &instructor, &upcoming, now).await;

    let mut closed = sample_payload();
    closed.end_time = Some(now - Duration::hours(1));
    let closed = create_quiz(&app.pool, &instructor, &closed, now).await;

    let mut draft = sample_payload();
    draft.is_published = false;
    let draft = create_quiz(&app.pool, &instructor, &draft, now).await;

    for (quiz, reason) in [
        (&upcoming, "not started"),
        (&closed, "ended"),
        (&draft, "not published"),
    ] {
        let response = app
            .client
            .post(app.url(&format!("/api/quizzes/{}/submit", quiz.quiz.id)))
            .header("Authorization", bearer(&student))
            .json(&json!({ "answers": [{ "question": quiz.questions[1].id, "text_answer": "x" }] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(
            body["error"].as_str().unwrap().contains(reason),
            "expected '{}' in {}",
            reason,
            body
        );
    }

    // Nothing was stored.
    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/submissions"))
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn unpublished_quiz_hidden_and_publish_toggles() {
    let app = spawn_app().await;
    let instructor = create_user(&app.pool, Role::Instructor).await;
    let other_instructor = create_user(&app.pool, Role::Instructor).await;
    let student = create_user(&app.pool, Role::Student).await;

    let mut payload = sample_payload();
    payload.is_published = false;
    let quiz = create_quiz(&app.pool, &instructor, &payload, Utc::now()).await;
    let quiz_url = app.url(&format!("/api/quizzes/{}", quiz.quiz.id));

    let response = app
        .client
        .get(&quiz_url)
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/quizzes"))
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());

    // Only the owner may publish.
    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/publish", quiz.quiz.id)))
        .header("Authorization", bearer(&other_instructor))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // No body at all publishes.
    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/publish", quiz.quiz.id)))
        .header("Authorization", bearer(&instructor))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let published: Value = response.json().await.unwrap();
    assert_eq!(published["is_published"], true);

    // Now published: visible, but still not editable by other instructors.
    let response = app
        .client
        .get(&quiz_url)
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/publish", quiz.quiz.id)))
        .header("Authorization", bearer(&other_instructor))
        .json(&json!({ "is_published": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/quizzes?is_published=true"))
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn delete_quiz_cascades_to_submissions() {
    let app = spawn_app().await;
    let instructor = create_user(&app.pool, Role::Instructor).await;
    let student = create_user(&app.pool, Role::Student).await;
    let quiz = create_quiz(&app.pool, &instructor, &sample_payload(), Utc::now()).await;

    let submitted: Value = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/submit", quiz.quiz.id)))
        .header("Authorization", bearer(&student))
        .json(&json!({ "answers": [{ "question": quiz.questions[1].id, "text_answer": "x" }] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let submission_id = submitted["id"].as_i64().unwrap();

    let response = app
        .client
        .delete(app.url(&format!("/api/quizzes/{}", quiz.quiz.id)))
        .header("Authorization", bearer(&instructor))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = app
        .client
        .get(app.url(&format!("/api/submissions/{}", submission_id)))
        .header("Authorization", bearer(&student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(answers, 0);
}
