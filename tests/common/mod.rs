#![allow(dead_code)]

use chrono::{DateTime, Utc};
use quizdesk::{
    config::Config,
    db,
    models::{
        quiz::{OptionInput, QuestionInput, QuestionType, QuizPayload, QuizView},
        user::Role,
    },
    routes,
    services::{access::Identity, quiz},
    state::AppState,
    utils::jwt::sign_jwt,
};
use sqlx::SqlitePool;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    /// Base URL, e.g. "http://127.0.0.1:12345".
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Fresh in-memory database with the schema applied.
pub async fn test_pool() -> SqlitePool {
    db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database")
}

/// File-backed WAL database with the production pool settings, for tests
/// where requests must really overlap. Each call gets its own file.
pub async fn file_pool() -> SqlitePool {
    let path = std::env::temp_dir().join(format!("quizdesk_test_{}.db", uuid::Uuid::new_v4()));
    let pool = db::connect(&format!("sqlite://{}", path.display()))
        .await
        .expect("Failed to open file database");
    db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to migrate file database");
    pool
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
    }
}

/// Spawns the app on a random port, backed by a private in-memory database.
pub async fn spawn_app() -> TestApp {
    let pool = test_pool().await;

    let state = AppState {
        pool: pool.clone(),
        config: test_config(),
    };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
    }
}

/// Inserts a user directly (no password hashing) and returns its identity.
pub async fn create_user(pool: &SqlitePool, role: Role) -> Identity {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let mut conn = pool.acquire().await.unwrap();
    let user = db::user::insert_user(&mut conn, &username, "not-a-real-hash", role)
        .await
        .unwrap();

    Identity {
        user_id: user.id,
        role,
    }
}

pub fn token_for(identity: &Identity) -> String {
    sign_jwt(identity.user_id, identity.role, JWT_SECRET, 600).unwrap()
}

pub fn bearer(identity: &Identity) -> String {
    format!("Bearer {}", token_for(identity))
}

pub fn option(text: &str, is_correct: bool) -> OptionInput {
    OptionInput {
        option_text: text.to_string(),
        is_correct,
    }
}

pub fn question(text: &str, question_type: QuestionType, points: f64, options: Vec<OptionInput>) -> QuestionInput {
    QuestionInput {
        question_text: text.to_string(),
        question_type,
        points,
        options,
    }
}

/// Published quiz with a 2-point true/false question (first option correct)
/// and a 3-point subjective question.
pub fn sample_payload() -> QuizPayload {
    QuizPayload {
        title: "Week 1".to_string(),
        description: "Intro quiz".to_string(),
        start_time: None,
        end_time: None,
        duration: 600,
        is_published: true,
        questions: Some(vec![
            question(
                "The sky is blue.",
                QuestionType::TrueFalse,
                2.0,
                vec![option("True", true), option("False", false)],
            ),
            question("Explain why.", QuestionType::Subjective, 3.0, vec![]),
        ]),
    }
}

pub async fn create_quiz(
    pool: &SqlitePool,
    owner: &Identity,
    payload: &QuizPayload,
    now: DateTime<Utc>,
) -> QuizView {
    quiz::create_quiz(pool, Some(owner), payload, now)
        .await
        .expect("Failed to create quiz")
}

/// Ids of the correct options of the question at `index`.
pub fn correct_options(view: &QuizView, index: usize) -> Vec<i64> {
    view.questions[index]
        .options
        .iter()
        .filter(|o| o.is_correct == Some(true))
        .map(|o| o.id)
        .collect()
}

pub fn wrong_options(view: &QuizView, index: usize) -> Vec<i64> {
    view.questions[index]
        .options
        .iter()
        .filter(|o| o.is_correct == Some(false))
        .map(|o| o.id)
        .collect()
}
