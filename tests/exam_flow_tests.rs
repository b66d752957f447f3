// tests/exam_flow_tests.rs

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use exam_backend::{
    config::Config,
    error::AppError,
    models::{
        paper::{Paper, PaperQuestions},
        question::{Answer, Question, QuestionType},
        record::{NewRecord, Record, SubmitRecordRequest},
        session::{AttemptSession, SessionAnswers},
        user::User,
    },
    routes,
    services::{locks::KeyedLocks, submission},
    state::AppState,
    store::{MemoryStore, Store},
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};

const SECRET: &str = "exam_flow_test_secret";

struct Fixture {
    alice: User,
    bob: User,
    eve: User,
    paper: Paper,
    questions: Vec<Question>,
}

fn student(username: &str, group_id: i64) -> User {
    User {
        id: 0,
        username: username.to_string(),
        password: String::new(),
        role: "student".to_string(),
        group_id: Some(group_id),
    }
}

fn question(question_type: QuestionType, answer: Answer) -> Question {
    Question {
        id: 0,
        question_type,
        content: format!("A {} question", question_type),
        options: match question_type {
            QuestionType::Judge => None,
            _ => Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
        },
        answer,
    }
}

/// Group 1 gets a paper with 2 single (15s), 1 multiple (30s), 1 judge (20s).
fn seed(store: &MemoryStore) -> Fixture {
    let alice = store.insert_user(student("alice", 1)).unwrap();
    let bob = store.insert_user(student("bob", 1)).unwrap();
    let eve = store.insert_user(student("eve", 3)).unwrap();

    let a = || Answer::Choice("A".to_string());
    let questions = vec![
        store.insert_question(question(QuestionType::Single, a())).unwrap(),
        store.insert_question(question(QuestionType::Single, a())).unwrap(),
        store
            .insert_question(question(
                QuestionType::Multiple,
                Answer::Choices(vec!["A".into(), "C".into()]),
            ))
            .unwrap(),
        store.insert_question(question(QuestionType::Judge, a())).unwrap(),
    ];

    let paper = store
        .insert_paper(Paper {
            id: 0,
            name: "Timber framing basics".to_string(),
            questions: PaperQuestions {
                single: vec![questions[0].id, questions[1].id],
                multiple: vec![questions[2].id],
                judge: vec![questions[3].id],
            },
            rules: json!([]),
            published: true,
            target_groups: vec![1],
            target_users: vec![],
            deadline: None,
            publish_date: Some(Utc::now() - Duration::hours(1)),
        })
        .unwrap();

    Fixture {
        alice,
        bob,
        eve,
        paper,
        questions,
    }
}

async fn spawn_app(store: Arc<dyn Store>) -> String {
    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_dir: "logs".to_string(),
    };

    let app = routes::create_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

fn bearer(user: &User) -> String {
    format!("Bearer {}", sign_jwt(user.id, &user.role, SECRET, 600).unwrap())
}

async fn get_exam(client: &reqwest::Client, address: &str, user: &User, paper_id: i64) -> reqwest::Response {
    client
        .get(format!("{}/api/exams/{}", address, paper_id))
        .header("Authorization", bearer(user))
        .send()
        .await
        .expect("Fetch exam failed")
}

async fn answer(
    client: &reqwest::Client,
    address: &str,
    user: &User,
    paper_id: i64,
    question_id: i64,
    value: Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/exams/{}/answers", address, paper_id))
        .header("Authorization", bearer(user))
        .json(&json!({ "question_id": question_id, "answer": value }))
        .send()
        .await
        .expect("Record answer failed")
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    user: &User,
    paper_id: i64,
    answers: Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/records", address))
        .header("Authorization", bearer(user))
        .json(&json!({ "paper_id": paper_id, "answers": answers, "total_time": 42 }))
        .send()
        .await
        .expect("Submit failed")
}

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["code"].as_str().unwrap_or_default().to_string()
}

/// Moves the stored clocks of a session into the past.
fn rewind(store: &MemoryStore, session: AttemptSession, seconds: i64) -> AttemptSession {
    let rewound = AttemptSession {
        start_time: session.start_time - Duration::seconds(seconds),
        last_question_start_time: session.last_question_start_time - Duration::seconds(seconds),
        ..session
    };
    store.put_attempt_session(rewound.clone()).unwrap();
    rewound
}

#[tokio::test]
async fn fetch_exam_creates_session_and_hides_answers() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    let response = get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    assert_eq!(response.status().as_u16(), 200);
    let payload: Value = response.json().await.unwrap();

    let questions = payload["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    assert!(questions.iter().all(|q| q.get("answer").is_none()));
    assert_eq!(questions[3]["options"], json!(["True", "False"]));
    assert_eq!(payload["paper"]["rules"]["multiple"]["time_limit_seconds"], 30);
    assert_eq!(payload["session"]["resume_index"], 0);
    assert_eq!(payload["session"]["finished"], false);

    let session = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .expect("session should be created on first fetch");
    assert!(session.answers.is_empty());

    // A second fetch reuses the same session.
    let again: Value = get_exam(&client, &address, &fx.alice, fx.paper.id)
        .await
        .json()
        .await
        .unwrap();
    let stored_again = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_again.start_time, session.start_time);
    assert_eq!(again["session"]["resume_index"], 0);
}

#[tokio::test]
async fn resume_after_absence_burns_only_owed_time() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    let session = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    let rewound = rewind(&store, session, 40);

    // 40s away: both 15s singles expire, 10s into the 30s multiple.
    let payload: Value = get_exam(&client, &address, &fx.alice, fx.paper.id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(payload["session"]["skipped"], 2);
    assert_eq!(payload["session"]["resume_index"], 2);
    let remaining = payload["session"]["remaining_seconds"].as_i64().unwrap();
    assert!((19..=20).contains(&remaining), "remaining = {}", remaining);

    let stored = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.answers.is_locked(fx.questions[0].id));
    assert!(stored.answers.is_locked(fx.questions[1].id));
    assert_eq!(
        stored.last_question_start_time,
        rewound.last_question_start_time + Duration::seconds(30)
    );

    // Reloading right away does not skip anything else.
    let reload: Value = get_exam(&client, &address, &fx.alice, fx.paper.id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(reload["session"]["skipped"], 0);
    assert_eq!(reload["session"]["resume_index"], 2);

    // The timed-out question cannot be answered any more.
    let late = answer(&client, &address, &fx.alice, fx.paper.id, fx.questions[0].id, json!("A")).await;
    assert_eq!(late.status().as_u16(), 400);
}

#[tokio::test]
async fn answers_must_follow_the_current_question() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;

    let ahead = answer(&client, &address, &fx.alice, fx.paper.id, fx.questions[2].id, json!(["A"])).await;
    assert_eq!(ahead.status().as_u16(), 400);

    let first = answer(&client, &address, &fx.alice, fx.paper.id, fx.questions[0].id, json!("B")).await;
    assert_eq!(first.status().as_u16(), 200);
    let state: Value = first.json().await.unwrap();
    assert_eq!(state["resume_index"], 1);

    // Retrying the same question overwrites it and does not move the cursor.
    let retry = answer(&client, &address, &fx.alice, fx.paper.id, fx.questions[0].id, json!("A")).await;
    assert_eq!(retry.status().as_u16(), 200);
    let state: Value = retry.json().await.unwrap();
    assert_eq!(state["resume_index"], 1);
    assert_eq!(state["answers"][0]["answer"], "A");

    let foreign = answer(&client, &address, &fx.alice, fx.paper.id, 9_999, json!("A")).await;
    assert_eq!(foreign.status().as_u16(), 404);
}

#[tokio::test]
async fn submission_scores_and_consumes_the_session() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    answer(&client, &address, &fx.alice, fx.paper.id, fx.questions[0].id, json!("A")).await;
    answer(&client, &address, &fx.alice, fx.paper.id, fx.questions[1].id, json!("B")).await;

    // The last two come with the submission itself.
    let response = submit(
        &client,
        &address,
        &fx.alice,
        fx.paper.id,
        json!([
            {"question_id": fx.questions[1].id, "answer": "A"},
            {"question_id": fx.questions[2].id, "answer": ["A"]},
            {"question_id": fx.questions[3].id, "answer": "A"}
        ]),
    )
    .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();

    // single 2 + single 0 (stored "B" wins) + multiple partial 2 + judge 2
    assert_eq!(body["record"]["score"], 6.0);
    assert_eq!(body["per_question"].as_array().unwrap().len(), 4);
    let total_time = body["record"]["total_time"].as_i64().unwrap();
    assert!(total_time <= 42);

    assert!(
        store
            .get_attempt_session(fx.alice.id, fx.paper.id)
            .await
            .unwrap()
            .is_none()
    );

    let second = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(error_code(second).await, "already_completed");

    let refetch = get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    assert_eq!(refetch.status().as_u16(), 409);
}

#[tokio::test]
async fn cold_submission_without_session_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    let response = submit(&client, &address, &fx.bob, fx.paper.id, json!([])).await;
    assert_eq!(response.status().as_u16(), 409);
    assert_eq!(error_code(response).await, "session_missing");
    assert!(store.get_records_by_paper(fx.paper.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn audience_deadline_and_publish_state_are_enforced() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    let outsider = get_exam(&client, &address, &fx.eve, fx.paper.id).await;
    assert_eq!(outsider.status().as_u16(), 403);
    assert_eq!(error_code(outsider).await, "not_eligible");

    let missing = get_exam(&client, &address, &fx.alice, 424_242).await;
    assert_eq!(missing.status().as_u16(), 404);

    // Alice is mid-attempt when the deadline passes.
    get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    let mut closed = fx.paper.clone();
    closed.deadline = Some(Utc::now() - Duration::minutes(1));
    store.save_paper(closed.clone()).unwrap();

    let late_start = get_exam(&client, &address, &fx.bob, fx.paper.id).await;
    assert_eq!(late_start.status().as_u16(), 410);
    assert_eq!(error_code(late_start).await, "expired");

    // Her existing session still loads, but it can no longer be submitted.
    let resume = get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    assert_eq!(resume.status().as_u16(), 200);
    let late_submit = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(late_submit.status().as_u16(), 410);

    let mut hidden = closed;
    hidden.published = false;
    hidden.deadline = None;
    store.save_paper(hidden).unwrap();
    let unpublished = get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    assert_eq!(unpublished.status().as_u16(), 404);
}

#[tokio::test]
async fn republish_opens_a_new_cycle() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    let first = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(first.status().as_u16(), 201);

    let blocked = get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    assert_eq!(error_code(blocked).await, "already_completed");

    let mut republished = fx.paper.clone();
    republished.publish_date = Some(Utc::now());
    store.save_paper(republished).unwrap();

    let reopened = get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    assert_eq!(reopened.status().as_u16(), 200);
    let second = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(second.status().as_u16(), 201);

    assert_eq!(store.get_records_by_paper(fx.paper.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn progress_updates_merge_and_clamp() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/exams/{}/session", address, fx.paper.id);

    // No session yet: accepted, nothing written.
    let noop: Value = client
        .put(&url)
        .header("Authorization", bearer(&fx.alice))
        .json(&json!({"answers": [], "last_question_start_time": Utc::now()}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(noop["updated"], false);

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    let mut session = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    session.answers.upsert(fx.questions[0].id, None);
    store.put_attempt_session(session.clone()).unwrap();

    let future: DateTime<Utc> = Utc::now() + Duration::hours(1);
    let response = client
        .put(&url)
        .header("Authorization", bearer(&fx.alice))
        .json(&json!({
            "answers": [
                {"question_id": fx.questions[0].id, "answer": "A"},
                {"question_id": fx.questions[1].id, "answer": "A"},
                {"question_id": 777, "answer": "A"}
            ],
            "last_question_start_time": future
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let stored = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.answers.is_locked(fx.questions[0].id));
    assert_eq!(
        stored.answers.get(fx.questions[1].id),
        Some(Some(&Answer::Choice("A".to_string())))
    );
    assert!(!stored.answers.contains(777));
    assert!(stored.last_question_start_time <= Utc::now());
    assert!(stored.last_question_start_time >= session.last_question_start_time);
}

#[tokio::test]
async fn progress_cannot_answer_a_timed_out_question() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/exams/{}/session", address, fx.paper.id);

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    let session = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    // The first question allows 15s; nothing has locked it in the store yet.
    rewind(&store, session, 20);

    let response = client
        .put(&url)
        .header("Authorization", bearer(&fx.alice))
        .json(&json!({
            "answers": [{"question_id": fx.questions[0].id, "answer": "A"}],
            "last_question_start_time": Utc::now()
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let stored = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.answers.is_locked(fx.questions[0].id));

    let submitted = submit(
        &client,
        &address,
        &fx.alice,
        fx.paper.id,
        json!([{"question_id": fx.questions[0].id, "answer": "A"}]),
    )
    .await;
    assert_eq!(submitted.status().as_u16(), 201);
    let body: Value = submitted.json().await.unwrap();
    assert_eq!(body["per_question"][0]["question_id"], fx.questions[0].id);
    assert_eq!(body["per_question"][0]["points"], 0.0);
    assert_eq!(body["record"]["score"], 0.0);
}

#[tokio::test]
async fn progress_without_new_answers_keeps_the_clock() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    let session = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    let rewound = rewind(&store, session, 10);

    let response = client
        .put(format!("{}/api/exams/{}/session", address, fx.paper.id))
        .header("Authorization", bearer(&fx.alice))
        .json(&json!({"answers": [], "last_question_start_time": Utc::now()}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["updated"], true);
    assert_eq!(body["session"]["resume_index"], 0);

    let stored = store
        .get_attempt_session(fx.alice.id, fx.paper.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_question_start_time, rewound.last_question_start_time);

    let payload: Value = get_exam(&client, &address, &fx.alice, fx.paper.id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(payload["session"]["resume_index"], 0);
    let remaining = payload["session"]["remaining_seconds"].as_i64().unwrap();
    assert!(remaining <= 5, "remaining = {}", remaining);
}

#[tokio::test]
async fn submission_from_an_earlier_cycle_is_refused() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    let address = spawn_app(store.clone()).await;
    let client = reqwest::Client::new();

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;

    let mut republished = fx.paper.clone();
    republished.publish_date = Some(Utc::now());
    store.save_paper(republished).unwrap();

    let stale = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(stale.status().as_u16(), 409);
    assert_eq!(error_code(stale).await, "session_missing");
    assert!(
        store
            .get_attempt_session(fx.alice.id, fx.paper.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(store.get_records_by_paper(fx.paper.id).await.unwrap().is_empty());

    // The real attempt of the new cycle is still open.
    let fresh = get_exam(&client, &address, &fx.alice, fx.paper.id).await;
    assert_eq!(fresh.status().as_u16(), 200);
    let committed = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(committed.status().as_u16(), 201);
}

#[tokio::test]
async fn record_committed_while_waiting_for_the_lock_wins() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    store
        .create_attempt_session(AttemptSession::new(fx.alice.id, fx.paper.id, Utc::now()))
        .await
        .unwrap();

    let locks = Arc::new(KeyedLocks::new());
    let guard = locks.lock(fx.alice.id, fx.paper.id).await;

    let pending = {
        let store = store.clone();
        let locks = locks.clone();
        let user = fx.alice.clone();
        let paper_id = fx.paper.id;
        tokio::spawn(async move {
            let req = SubmitRecordRequest {
                paper_id,
                answers: SessionAnswers::new(),
                total_time: 10,
            };
            submission::submit(store.as_ref(), &locks, &user, req, Utc::now()).await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // Meanwhile another request commits, and a fetch opens a new session.
    store
        .commit_submission(NewRecord {
            paper_id: fx.paper.id,
            user_id: fx.alice.id,
            score: 2.0,
            total_time: 5,
            answers: SessionAnswers::new(),
            submit_time: Utc::now(),
        })
        .await
        .unwrap()
        .expect("session should still be live");
    store
        .create_attempt_session(AttemptSession::new(fx.alice.id, fx.paper.id, Utc::now()))
        .await
        .unwrap();
    drop(guard);

    match pending.await.unwrap() {
        Err(AppError::AlreadyCompleted(_)) => {}
        other => panic!("expected AlreadyCompleted, got {:?}", other.map(|o| o.record)),
    }
    assert_eq!(store.get_records_by_paper(fx.paper.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_duplicate_submissions_commit_once() {
    let store = Arc::new(MemoryStore::new());
    let fx = seed(&store);
    store
        .create_attempt_session(AttemptSession::new(fx.alice.id, fx.paper.id, Utc::now()))
        .await
        .unwrap();

    let locks = Arc::new(KeyedLocks::new());
    // Hold the key so both requests get past the record check before either commits.
    let guard = locks.lock(fx.alice.id, fx.paper.id).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        let locks = locks.clone();
        let user = fx.alice.clone();
        let paper_id = fx.paper.id;
        handles.push(tokio::spawn(async move {
            let req = SubmitRecordRequest {
                paper_id,
                answers: SessionAnswers::new(),
                total_time: 10,
            };
            submission::submit(store.as_ref(), &locks, &user, req, Utc::now()).await
        }));
    }

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    drop(guard);

    let mut committed = 0;
    let mut missing = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(AppError::SessionMissing(_)) => missing += 1,
            Err(other) => panic!("unexpected rejection: {:?}", other),
        }
    }
    assert_eq!((committed, missing), (1, 1));
    assert_eq!(store.get_records_by_paper(fx.paper.id).await.unwrap().len(), 1);
}

/// Delegates to a `MemoryStore` but can fail the submission commit.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_commit: AtomicBool,
}

#[async_trait]
impl Store for FlakyStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        self.inner.get_user(id).await
    }
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.inner.get_user_by_username(username).await
    }
    async fn get_users_in_groups(&self, group_ids: &[i64]) -> Result<Vec<User>, AppError> {
        self.inner.get_users_in_groups(group_ids).await
    }
    async fn list_students(&self) -> Result<Vec<User>, AppError> {
        self.inner.list_students().await
    }
    async fn get_paper(&self, id: i64) -> Result<Option<Paper>, AppError> {
        self.inner.get_paper(id).await
    }
    async fn list_papers(&self) -> Result<Vec<Paper>, AppError> {
        self.inner.list_papers().await
    }
    async fn get_questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        self.inner.get_questions_by_ids(ids).await
    }
    async fn get_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<AttemptSession>, AppError> {
        self.inner.get_attempt_session(user_id, paper_id).await
    }
    async fn create_attempt_session(
        &self,
        session: AttemptSession,
    ) -> Result<AttemptSession, AppError> {
        self.inner.create_attempt_session(session).await
    }
    async fn update_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
        answers: &SessionAnswers,
        last_question_start_time: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.inner
            .update_attempt_session(user_id, paper_id, answers, last_question_start_time)
            .await
    }
    async fn delete_attempt_session(&self, user_id: i64, paper_id: i64) -> Result<bool, AppError> {
        self.inner.delete_attempt_session(user_id, paper_id).await
    }
    async fn get_record_by_user_and_paper(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<Record>, AppError> {
        self.inner.get_record_by_user_and_paper(user_id, paper_id).await
    }
    async fn create_record(&self, record: NewRecord) -> Result<Record, AppError> {
        self.inner.create_record(record).await
    }
    async fn get_records_by_paper(&self, paper_id: i64) -> Result<Vec<Record>, AppError> {
        self.inner.get_records_by_paper(paper_id).await
    }
    async fn get_records_by_user(&self, user_id: i64) -> Result<Vec<Record>, AppError> {
        self.inner.get_records_by_user(user_id).await
    }
    async fn commit_submission(&self, record: NewRecord) -> Result<Option<Record>, AppError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(AppError::StoreFailure("connection reset".to_string()));
        }
        self.inner.commit_submission(record).await
    }
}

#[tokio::test]
async fn failed_commit_keeps_session_for_retry() {
    let inner = Arc::new(MemoryStore::new());
    let fx = seed(&inner);
    let flaky = Arc::new(FlakyStore {
        inner: inner.clone(),
        fail_commit: AtomicBool::new(true),
    });
    let address = spawn_app(flaky.clone()).await;
    let client = reqwest::Client::new();

    get_exam(&client, &address, &fx.alice, fx.paper.id).await;

    let failed = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(failed.status().as_u16(), 503);
    let body: Value = failed.json().await.unwrap();
    assert_eq!(body["retryable"], true);

    assert!(
        inner
            .get_attempt_session(fx.alice.id, fx.paper.id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(inner.get_records_by_paper(fx.paper.id).await.unwrap().is_empty());

    flaky.fail_commit.store(false, Ordering::SeqCst);
    let retried = submit(&client, &address, &fx.alice, fx.paper.id, json!([])).await;
    assert_eq!(retried.status().as_u16(), 201);
}
