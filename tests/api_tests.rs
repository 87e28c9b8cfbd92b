// tests/api_tests.rs

use std::net::IpAddr;
use std::sync::Arc;

use lms_quiz::{
    config::Config,
    models::question::{Question, QuestionOption},
    repositories::MemoryStore,
    routes,
    services::QuizService,
    state::AppState,
    utils::{
        clock::SystemClock,
        jwt::{ROLE_INSTRUCTOR, ROLE_STUDENT, sign_jwt},
    },
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::types::Json;

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    async fn put_quiz(&self, lesson_id: i64, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/lessons/{}/quiz", lesson_id)))
            .bearer_auth(token(1, ROLE_INSTRUCTOR))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn start(&self, student_id: i64, lesson_id: i64) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/lessons/{}/quiz/attempts", lesson_id)))
            .bearer_auth(token(student_id, ROLE_STUDENT))
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn submit(&self, student_id: i64, attempt_id: i64, answers: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/attempts/{}/submit", attempt_id)))
            .bearer_auth(token(student_id, ROLE_STUDENT))
            .json(&json!({ "answers": answers }))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

fn token(user_id: i64, role: &str) -> String {
    sign_jwt(user_id, role, SECRET, 600).expect("Failed to sign token")
}

fn question(id: i64, correct: &str) -> Question {
    Question {
        id,
        content: format!("Question {}", id),
        options: Json(
            ["A", "B", "C", "D"]
                .iter()
                .map(|key| QuestionOption {
                    key: key.to_string(),
                    text: format!("Option {}", key),
                })
                .collect(),
        ),
        correct_option: correct.to_string(),
        difficulty: Some("easy".to_string()),
        tags: Json(vec!["basics".to_string()]),
        is_active: true,
        created_at: None,
    }
}

/// Spawns the app over an in-memory store on a random port.
/// Questions 1..=4 are seeded with keys A, B, C, D.
async fn spawn_app() -> TestApp {
    let store = MemoryStore::new();
    for (id, key) in [(1, "A"), (2, "B"), (3, "C"), (4, "D")] {
        store.put_question(question(id, key)).await;
    }

    let service = QuizService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(SystemClock),
    );

    let config = Config {
        database_url: None,
        database_max_connections: 1,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        log_dir: "logs".to_string(),
        server_host: IpAddr::from([127, 0, 0, 1]),
        server_port: 0,
    };

    let state = AppState {
        service: Arc::new(service),
        config,
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
        client: reqwest::Client::new(),
    }
}

fn four_question_quiz(max_attempts: i32) -> Value {
    json!({
        "title": "Lesson 1 quiz",
        "max_attempts": max_attempts,
        "question_ids": [1, 2, 3, 4],
        "show_correct_answers": true
    })
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/lessons/10/quiz/attempts"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/lessons/10/quiz"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_author_quizzes() {
    let app = spawn_app().await;

    let response = app
        .client
        .put(app.url("/lessons/10/quiz"))
        .bearer_auth(token(7, ROLE_STUDENT))
        .json(&four_question_quiz(1))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quiz_upsert_validates_input() {
    let app = spawn_app().await;

    let response = app
        .put_quiz(10, json!({ "title": "", "question_ids": [1] }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put_quiz(10, json!({ "title": "Quiz", "question_ids": [1, 99] }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.put_quiz(10, four_question_quiz(1)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let quiz: Value = app
        .client
        .get(app.url("/lessons/10/quiz"))
        .bearer_auth(token(7, ROLE_STUDENT))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(quiz["lesson_id"], 10);
    assert_eq!(quiz["selection"]["mode"], "manual");
    assert_eq!(quiz["passing_score"], 60);
}

#[tokio::test]
async fn attempt_flow() {
    let app = spawn_app().await;
    assert_eq!(app.put_quiz(10, four_question_quiz(2)).await.status(), StatusCode::OK);

    // 1. Start
    let response = app.start(7, 10).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let attempt: Value = response.json().await.unwrap();
    let attempt_id = attempt["id"].as_i64().unwrap();

    assert_eq!(attempt["status"], "IN_PROGRESS");
    assert_eq!(attempt["total_questions"], 4);
    let items = attempt["items"].as_array().unwrap();
    assert_eq!(items.len(), 4);
    for item in items {
        assert!(item["correct_option"].is_null());
        assert_eq!(item["question"]["options"].as_array().unwrap().len(), 4);
    }

    // 2. Submit: two right, one wrong, one unanswered
    let response = app
        .submit(7, attempt_id, json!({ "1": "A", "2": "B", "3": "X" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let graded: Value = response.json().await.unwrap();
    assert_eq!(graded["status"], "SUBMITTED");
    assert_eq!(graded["correct_answers"], 2);
    assert_eq!(graded["score"], 50.0);
    assert_eq!(graded["is_passed"], false);
    assert_eq!(graded["items"][0]["correct_option"], "A");

    // 3. Resubmitting fails and changes nothing
    let response = app
        .submit(7, attempt_id, json!({ "1": "A", "2": "B", "3": "C", "4": "D" }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ALREADY_SUBMITTED");

    // 4. Second attempt, all correct
    let second: Value = app.start(7, 10).await.json().await.unwrap();
    let graded: Value = app
        .submit(
            7,
            second["id"].as_i64().unwrap(),
            json!({ "1": "A", "2": "B", "3": "C", "4": "D" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(graded["score"], 100.0);
    assert_eq!(graded["is_passed"], true);

    // 5. Out of attempts
    let response = app.start(7, 10).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ATTEMPT_LIMIT_EXCEEDED");

    // 6. History, oldest first
    let history: Value = app
        .client
        .get(app.url(&format!("/quizzes/{}/attempts/me", attempt["quiz_id"])))
        .bearer_auth(token(7, ROLE_STUDENT))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["id"].as_i64().unwrap(), attempt_id);
    assert_eq!(history[0]["score"], 50.0);
}

#[tokio::test]
async fn attempts_are_private_to_their_owner() {
    let app = spawn_app().await;
    app.put_quiz(10, four_question_quiz(1)).await;

    let attempt: Value = app.start(7, 10).await.json().await.unwrap();
    let attempt_id = attempt["id"].as_i64().unwrap();

    let response = app.submit(8, attempt_id, json!({ "1": "A" })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .get(app.url(&format!("/attempts/{}", attempt_id)))
        .bearer_auth(token(8, ROLE_STUDENT))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .get(app.url(&format!("/attempts/{}", attempt_id)))
        .bearer_auth(token(7, ROLE_STUDENT))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .get(app.url("/attempts/999999"))
        .bearer_auth(token(7, ROLE_STUDENT))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn instructors_see_every_attempt() {
    let app = spawn_app().await;
    let quiz: Value = app
        .put_quiz(
            10,
            json!({
                "title": "Hidden results",
                "question_ids": [1, 2],
                "show_results_immediately": false
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    for student_id in [7, 8] {
        let attempt: Value = app.start(student_id, 10).await.json().await.unwrap();
        let graded: Value = app
            .submit(student_id, attempt["id"].as_i64().unwrap(), json!({ "1": "A" }))
            .await
            .json()
            .await
            .unwrap();
        // Results are withheld from the student
        assert!(graded["score"].is_null());
    }

    let response = app
        .client
        .get(app.url(&format!("/quizzes/{}/attempts", quiz_id)))
        .bearer_auth(token(7, ROLE_STUDENT))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let all: Value = app
        .client
        .get(app.url(&format!("/quizzes/{}/attempts", quiz_id)))
        .bearer_auth(token(1, ROLE_INSTRUCTOR))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|a| a["score"] == 50.0));
}

#[tokio::test]
async fn quiz_outside_its_window_cannot_be_started() {
    let app = spawn_app().await;
    app.put_quiz(
        10,
        json!({
            "title": "Next week",
            "question_ids": [1],
            "start_date": "2999-01-01T00:00:00Z"
        }),
    )
    .await;
    app.put_quiz(
        11,
        json!({
            "title": "Last year",
            "question_ids": [1],
            "end_date": "2000-01-01T00:00:00Z"
        }),
    )
    .await;

    let body: Value = app.start(7, 10).await.json().await.unwrap();
    assert_eq!(body["code"], "QUIZ_NOT_YET_OPEN");

    let response = app.start(7, 11).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "QUIZ_CLOSED");

    let response = app.start(7, 12).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn random_quiz_draws_from_the_bank() {
    let app = spawn_app().await;
    let response = app
        .put_quiz(
            10,
            json!({
                "title": "Pool",
                "random_count": 3,
                "random_difficulty": "EASY",
                "random_tags": ["basics"],
                "shuffle_options": true
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let attempt: Value = app.start(7, 10).await.json().await.unwrap();
    assert_eq!(attempt["total_questions"], 3);
}
