/// Integration tests with mocked external services
/// Exercises the content, forms and mail clients against wiremock without
/// hitting real external APIs
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use surveus_pipeline::collector::flatten_answers;
use surveus_pipeline::config::Config;
use surveus_pipeline::content::ContentService;
use surveus_pipeline::errors::AppError;
use surveus_pipeline::forms_client::FormsService;
use surveus_pipeline::models::{CustomerContext, FormSubmission, Question, QuestionType};
use surveus_pipeline::notifier::MailService;

/// Helper to create a test config pointed at the mock server
fn create_test_config(base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        content_api_key: "test_key".to_string(),
        content_base_url: base_url.clone(),
        content_model: "test-model".to_string(),
        forms_base_url: base_url.clone(),
        forms_token: "test_token".to_string(),
        mail_base_url: base_url,
        mail_api_key: "test_mail_key".to_string(),
        mail_from: "Surveus <test@surveus.dev>".to_string(),
        operator_email: "operator@surveus.dev".to_string(),
    }
}

fn context_with_first_name(name: &str) -> CustomerContext {
    CustomerContext {
        industry: Some("retail".to_string()),
        business_type: Some("b2c".to_string()),
        language: "English".to_string(),
        gender: None,
        total_purchases: 3,
        purchase_history: Some(json!({"last_purchase_date": "2026-07-01T00:00:00Z"})),
        service_interactions: None,
        marketing_engagement: None,
        personal_info: Some(json!({"first_name": name})),
    }
}

fn completion_with_content(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            {"message": {"role": "assistant", "content": content}}
        ]
    })
}

#[tokio::test]
async fn generate_question_set_parses_valid_completion() {
    let mock_server = MockServer::start().await;

    let question_set = json!({
        "questions": [
            {
                "type": "rating",
                "text": "Alice, how satisfied are you with your recent purchases?",
                "scale": {"min": 1, "max": 5, "lowLabel": "Poor", "highLabel": "Excellent"}
            },
            {
                "type": "multiple_choice",
                "text": "How do you prefer to hear from us?",
                "options": ["Email", "Phone", "Chat"]
            },
            {
                "type": "open_ended",
                "text": "How likely are you to buy from us again, and why?"
            }
        ],
        "metadata": {"personalization_factors": ["first_name", "industry"], "language": "English"}
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_with_content(&question_set.to_string())),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = ContentService::new(&config).unwrap();

    let set = service
        .generate_question_set(&context_with_first_name("Alice"))
        .await
        .unwrap();

    assert_eq!(set.questions.len(), 3);
    assert_eq!(set.questions[0].question_type, QuestionType::Rating);
    assert!(set.questions[0].text.contains("Alice"));
    assert_eq!(set.metadata.language, "English");
}

#[tokio::test]
async fn non_json_completion_content_is_a_generation_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_with_content("here are some questions!")),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = ContentService::new(&config).unwrap();

    let result = service
        .generate_question_set(&context_with_first_name("Alice"))
        .await;
    assert!(matches!(result, Err(AppError::MalformedPayload(_))));
}

#[tokio::test]
async fn completion_missing_choices_is_a_generation_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"usage": {}})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = ContentService::new(&config).unwrap();

    let result = service
        .generate_question_set(&context_with_first_name("Alice"))
        .await;
    assert!(matches!(result, Err(AppError::MalformedPayload(_))));
}

#[tokio::test]
async fn question_missing_type_specific_field_is_a_generation_failure() {
    let mock_server = MockServer::start().await;

    // multiple_choice without options
    let malformed = json!({
        "questions": [
            {"type": "multiple_choice", "text": "Alice, how do you prefer to hear from us?"}
        ]
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_with_content(&malformed.to_string())),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = ContentService::new(&config).unwrap();

    let result = service
        .generate_question_set(&context_with_first_name("Alice"))
        .await;
    assert!(matches!(result, Err(AppError::MalformedPayload(_))));
}

#[tokio::test]
async fn content_api_error_is_an_external_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = ContentService::new(&config).unwrap();

    let result = service
        .generate_question_set(&context_with_first_name("Alice"))
        .await;
    assert!(matches!(result, Err(AppError::ExternalApiError(_))));
}

#[tokio::test]
async fn create_form_returns_the_resource_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"formId": "form_abc123"})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = FormsService::new(&config).unwrap();

    let form_id = service.create_form("Surveus v1 2026-08-07-x9k2").await.unwrap();
    assert_eq!(form_id, "form_abc123");
}

#[tokio::test]
async fn create_form_without_form_id_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = FormsService::new(&config).unwrap();

    let result = service.create_form("title").await;
    assert!(matches!(result, Err(AppError::MalformedPayload(_))));
}

#[tokio::test]
async fn add_items_and_grant_access_hit_their_endpoints() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/forms/form_abc123:batchUpdate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/forms/form_abc123/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "perm_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = FormsService::new(&config).unwrap();

    let questions = vec![Question {
        question_type: QuestionType::OpenEnded,
        text: "What could we improve?".to_string(),
        options: None,
        scale: None,
    }];

    service.add_items("form_abc123", &questions).await.unwrap();
    service
        .grant_access("form_abc123", "operator@surveus.dev")
        .await
        .unwrap();
}

#[tokio::test]
async fn list_submissions_parses_answer_sets() {
    let mock_server = MockServer::start().await;

    let body = json!({
        "responses": [
            {
                "responseId": "resp_1",
                "lastSubmittedTime": "2026-08-01T12:30:00Z",
                "answers": {
                    "q1": {"textAnswers": {"answers": [{"value": "Great service"}]}},
                    "q2": {"scaleAnswer": {"value": 4}}
                }
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/v1/forms/form_abc123/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = FormsService::new(&config).unwrap();

    let submissions = service.list_submissions("form_abc123").await.unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].response_id, "resp_1");

    let flattened = flatten_answers(&submissions[0]);
    assert_eq!(flattened.get("q1"), Some(&json!("Great service")));
    assert_eq!(flattened.get("q2"), Some(&json!(4)));
}

#[tokio::test]
async fn form_with_no_submissions_yields_empty_list() {
    let mock_server = MockServer::start().await;

    // The provisioning service omits the responses key entirely for a form
    // nobody has answered
    Mock::given(method("GET"))
        .and(path("/v1/forms/form_quiet/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = FormsService::new(&config).unwrap();

    let submissions = service.list_submissions("form_quiet").await.unwrap();
    assert!(submissions.is_empty());
}

#[tokio::test]
async fn mail_send_returns_delivery_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email_123"})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = MailService::new(&config).unwrap();

    let delivery_id = service
        .send("customer@example.com", "Survey: Surveus v1", "<html></html>")
        .await
        .unwrap();
    assert_eq!(delivery_id, "email_123");
}

#[tokio::test]
async fn mail_api_failure_surfaces_as_external_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = MailService::new(&config).unwrap();

    let result = service
        .send("customer@example.com", "Survey: Surveus v1", "<html></html>")
        .await;
    assert!(matches!(result, Err(AppError::ExternalApiError(_))));
}

#[test]
fn flatten_prefers_text_over_scale_when_both_present() {
    let submission: FormSubmission = serde_json::from_value(json!({
        "responseId": "resp_2",
        "lastSubmittedTime": "2026-08-01T12:30:00Z",
        "answers": {
            "q1": {
                "textAnswers": {"answers": [{"value": "five"}]},
                "scaleAnswer": {"value": 5}
            },
            "q2": {}
        }
    }))
    .unwrap();

    let flattened = flatten_answers(&submission);
    // Documented precedence: free text wins; unanswered q2 is omitted
    assert_eq!(flattened.get("q1"), Some(&json!("five")));
    assert!(!flattened.contains_key("q2"));
    assert_eq!(flattened.len(), 1);
}
