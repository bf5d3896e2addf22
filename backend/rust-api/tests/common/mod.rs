#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use examdesk_api::config::Config;
use examdesk_api::create_router;
use examdesk_api::middlewares::auth::{JwtClaims, JwtService};
use examdesk_api::models::band::BandMapEntry;
use examdesk_api::models::booking::{Booking, BookingStatus};
use examdesk_api::models::exam::{
    ChoiceOption, Exam, Question, QuestionKind, SectionDef, SectionType,
};
use examdesk_api::services::notifier::LogNotifier;
use examdesk_api::services::AppState;
use examdesk_api::store::{FileCatalog, MemoryAttemptStore};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryAttemptStore>,
}

pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryAttemptStore::new());
    for booking in sample_bookings() {
        store.seed_booking(booking);
    }

    let catalog = Arc::new(FileCatalog::from_parts(sample_exams(), sample_band_map()));
    let state = Arc::new(AppState::with_parts(
        Config::for_tests(),
        store.clone(),
        catalog,
        Arc::new(LogNotifier),
    ));

    TestApp {
        router: create_router(state),
        store,
    }
}

pub fn bearer(user_id: &str, role: &str) -> String {
    let service = JwtService::new("test-secret");
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        iat: Utc::now().timestamp() as usize,
    };
    format!("Bearer {}", service.generate_token(claims).unwrap())
}

pub async fn request(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", token);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Creates an attempt for the booking and returns its id.
pub async fn create_attempt(router: &Router, token: &str, booking_id: &str) -> String {
    let (status, body) = request(
        router,
        "POST",
        "/api/v1/attempts",
        Some(token),
        Some(serde_json::json!({ "booking_id": booking_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create attempt failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

fn question(id: &str, order: u32, max_score: i32, kind: QuestionKind) -> Question {
    Question {
        id: id.to_string(),
        order,
        max_score,
        kind,
    }
}

/// IELTS-style exam: reading (5 raw points), listening (2 raw points),
/// writing (two tasks), speaking. Plus a small grammar-only exam whose
/// band map deliberately leaves raw scores below 2 unmapped.
pub fn sample_exams() -> Vec<Exam> {
    let reading = SectionDef {
        section_type: SectionType::Reading,
        order: 1,
        duration_minutes: 60,
        questions: vec![
            question(
                "r1",
                1,
                1,
                QuestionKind::TrueFalse {
                    prompt: "The harbour predates the railway.".into(),
                    key: true,
                },
            ),
            question(
                "r2",
                2,
                1,
                QuestionKind::SingleChoice {
                    prompt: "What drove the town's growth?".into(),
                    options: vec![
                        ChoiceOption {
                            letter: "A".into(),
                            text: "fishing".into(),
                        },
                        ChoiceOption {
                            letter: "B".into(),
                            text: "trade".into(),
                        },
                        ChoiceOption {
                            letter: "C".into(),
                            text: "mining".into(),
                        },
                    ],
                    key: "B".into(),
                },
            ),
            question(
                "r3",
                3,
                1,
                QuestionKind::ShortText {
                    prompt: "Name the structure described in paragraph 2.".into(),
                    accepted: vec!["harbour".into(), "harbor".into()],
                },
            ),
            question(
                "r4",
                4,
                2,
                QuestionKind::GapFill {
                    prompt: "Complete the summary.".into(),
                    tokens: vec!["tide".into(), "moon".into(), "sun".into(), "wind".into()],
                    key: vec!["tide".into(), "moon".into()],
                },
            ),
        ],
    };

    let listening = SectionDef {
        section_type: SectionType::Listening,
        order: 2,
        duration_minutes: 30,
        questions: vec![
            question(
                "l1",
                1,
                1,
                QuestionKind::TrueFalse {
                    prompt: "The speaker arrives by bus.".into(),
                    key: false,
                },
            ),
            question(
                "l2",
                2,
                1,
                QuestionKind::SingleChoice {
                    prompt: "Where does the tour start?".into(),
                    options: vec![
                        ChoiceOption {
                            letter: "A".into(),
                            text: "the museum".into(),
                        },
                        ChoiceOption {
                            letter: "B".into(),
                            text: "the station".into(),
                        },
                    ],
                    key: "A".into(),
                },
            ),
        ],
    };

    let writing = SectionDef {
        section_type: SectionType::Writing,
        order: 3,
        duration_minutes: 60,
        questions: vec![
            question(
                "w1",
                1,
                1,
                QuestionKind::FreeResponse {
                    prompt: "Summarise the information in the chart.".into(),
                },
            ),
            question(
                "w2",
                2,
                1,
                QuestionKind::FreeResponse {
                    prompt: "Do you agree that cities should ban cars? Discuss.".into(),
                },
            ),
        ],
    };

    let speaking = SectionDef {
        section_type: SectionType::Speaking,
        order: 4,
        duration_minutes: 14,
        questions: vec![question(
            "s1",
            1,
            1,
            QuestionKind::FreeResponse {
                prompt: "Describe a place you enjoy visiting.".into(),
            },
        )],
    };

    let grammar = SectionDef {
        section_type: SectionType::Grammar,
        order: 1,
        duration_minutes: 20,
        questions: vec![
            question(
                "g1",
                1,
                1,
                QuestionKind::TrueFalse {
                    prompt: "'Went' is the past tense of 'go'.".into(),
                    key: true,
                },
            ),
            question(
                "g2",
                2,
                1,
                QuestionKind::SingleChoice {
                    prompt: "Pick the correct article.".into(),
                    options: vec![
                        ChoiceOption {
                            letter: "A".into(),
                            text: "a".into(),
                        },
                        ChoiceOption {
                            letter: "B".into(),
                            text: "an".into(),
                        },
                        ChoiceOption {
                            letter: "C".into(),
                            text: "the".into(),
                        },
                    ],
                    key: "C".into(),
                },
            ),
        ],
    };

    vec![
        Exam {
            id: "exam-ielts-1".into(),
            exam_type: "ielts_academic".into(),
            sections: vec![reading, listening, writing, speaking],
        },
        Exam {
            id: "exam-grammar-1".into(),
            exam_type: "general_grammar".into(),
            sections: vec![grammar],
        },
    ]
}

fn band_entry(
    exam_type: &str,
    section_type: SectionType,
    min_raw: i32,
    max_raw: i32,
    band: f64,
) -> BandMapEntry {
    BandMapEntry {
        exam_type: exam_type.into(),
        section_type,
        min_raw,
        max_raw,
        band,
    }
}

pub fn sample_band_map() -> Vec<BandMapEntry> {
    vec![
        band_entry("ielts_academic", SectionType::Reading, 0, 1, 5.0),
        band_entry("ielts_academic", SectionType::Reading, 2, 3, 6.0),
        band_entry("ielts_academic", SectionType::Reading, 4, 5, 7.0),
        band_entry("ielts_academic", SectionType::Listening, 0, 0, 5.5),
        band_entry("ielts_academic", SectionType::Listening, 1, 1, 6.5),
        band_entry("ielts_academic", SectionType::Listening, 2, 2, 7.5),
        // Deliberate gap: raw 0..=1 has no mapping for grammar.
        band_entry("general_grammar", SectionType::Grammar, 2, 2, 9.0),
    ]
}

fn booking(
    id: &str,
    student_id: &str,
    teacher_id: &str,
    exam_id: &str,
    sections: Vec<SectionType>,
    status: BookingStatus,
) -> Booking {
    Booking {
        id: id.to_string(),
        student_id: student_id.to_string(),
        teacher_id: teacher_id.to_string(),
        exam_id: exam_id.to_string(),
        sections,
        scheduled_at: Utc::now(),
        status,
    }
}

pub fn sample_bookings() -> Vec<Booking> {
    let all_ielts = vec![
        SectionType::Reading,
        SectionType::Listening,
        SectionType::Writing,
        SectionType::Speaking,
    ];
    vec![
        booking(
            "booking-1",
            "student-1",
            "teacher-1",
            "exam-ielts-1",
            all_ielts.clone(),
            BookingStatus::Confirmed,
        ),
        booking(
            "booking-2",
            "student-2",
            "teacher-1",
            "exam-ielts-1",
            vec![SectionType::Reading],
            BookingStatus::Confirmed,
        ),
        booking(
            "booking-pending",
            "student-1",
            "teacher-1",
            "exam-ielts-1",
            all_ielts,
            BookingStatus::Pending,
        ),
        booking(
            "booking-grammar-1",
            "student-3",
            "teacher-2",
            "exam-grammar-1",
            vec![SectionType::Grammar],
            BookingStatus::Confirmed,
        ),
        booking(
            "booking-grammar-2",
            "student-4",
            "teacher-2",
            "exam-grammar-1",
            vec![SectionType::Grammar],
            BookingStatus::Confirmed,
        ),
    ]
}

/// Answer payloads used across the flow tests.
pub fn perfect_reading_answers() -> Value {
    serde_json::json!({
        "answers": {
            "r1": { "type": "boolean", "value": true },
            "r2": { "type": "choice", "letter": "B" },
            "r3": { "type": "text", "value": "harbor" },
            "r4": { "type": "gaps", "fillers": ["tide", "moon"] }
        }
    })
}

/// One of two listening questions correct (raw 1 -> band 6.5).
pub fn half_listening_answers() -> Value {
    serde_json::json!({
        "answers": {
            "l1": { "type": "boolean", "value": false },
            "l2": { "type": "choice", "letter": "B" }
        }
    })
}

pub fn writing_answers() -> Value {
    serde_json::json!({
        "answers": {
            "w1": { "type": "text", "value": "The chart shows three rising trends." },
            "w2": { "type": "text", "value": "I broadly agree with the proposal." }
        }
    })
}

pub fn speaking_answers() -> Value {
    serde_json::json!({
        "answers": {
            "s1": { "type": "recording", "file_id": "rec-123" }
        }
    })
}

pub fn section_by_type<'a>(attempt: &'a Value, section_type: &str) -> &'a Value {
    attempt["sections"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["section_type"] == section_type)
        .unwrap_or_else(|| panic!("section {section_type} missing from attempt view"))
}
