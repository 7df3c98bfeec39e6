/*!
 * Request pipeline tests against an in-process mock server.
 *
 * Cover the retry predicate, attempt accounting, status-code mapping and
 * cancellation precedence.
 */

use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lingodoc::{RetryPolicy, TranslationError, Translator, TranslatorConfig};

use crate::common;

fn usage_body() -> serde_json::Value {
    json!({ "character_count": 180_000, "character_limit": 500_000 })
}

async fn translator_for(server: &MockServer, max_attempts: u32) -> Translator {
    let config = common::fast_config(&server.uri()).retry(common::fast_retry_policy(max_attempts));
    Translator::new(config).unwrap()
}

#[tokio::test]
async fn test_execute_withTwoRateLimitsThenSuccess_shouldSucceed() -> Result<()> {
    common::init_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_body()))
        .mount(&server)
        .await;

    let translator = translator_for(&server, 3).await;
    let usage = translator.usage(&CancellationToken::new()).await?;

    assert_eq!(usage.character_count, 180_000);
    assert!(!usage.limit_reached());

    Ok(())
}

#[tokio::test]
async fn test_execute_withTwoRateLimitsAndTwoAttempts_shouldSurfaceTooManyRequests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let translator = translator_for(&server, 2).await;
    let error = translator
        .usage(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, TranslationError::TooManyRequests(_)));
}

#[tokio::test]
async fn test_execute_withServerErrorsThenSuccess_shouldRetry() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_body()))
        .mount(&server)
        .await;

    let translator = translator_for(&server, 3).await;
    let usage = translator.usage(&CancellationToken::new()).await?;

    assert_eq!(usage.character_limit, 500_000);

    Ok(())
}

#[tokio::test]
async fn test_execute_withNonRetryableStatus_shouldAttemptExactlyOnce() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let translator = translator_for(&server, 5).await;
    let error = translator
        .usage(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, TranslationError::AuthorizationFailure(_)));
    // MockServer verifies the expected call count on drop
}

#[tokio::test]
async fn test_execute_withQuotaStatus_shouldMapAndAppendServiceMessage() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(
            ResponseTemplate::new(456)
                .set_body_json(json!({ "message": "Quota for this billing period has been exceeded" })),
        )
        .mount(&server)
        .await;

    let translator = translator_for(&server, 3).await;
    let error = translator
        .usage(&CancellationToken::new())
        .await
        .unwrap_err();

    match error {
        TranslationError::QuotaExceeded(message) => {
            assert!(message.contains("456"));
            assert!(message.contains("billing period"));
        }
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execute_withBadRequestAndUnparsableBody_shouldStillClassify() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(400).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let translator = translator_for(&server, 3).await;
    let error = translator
        .usage(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, TranslationError::BadRequest(_)));
}

#[tokio::test]
async fn test_execute_withCancellationDuringBackoff_shouldStopImmediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // Long backoff so cancellation must win during the sleep
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_secs(30),
        ..RetryPolicy::default()
    };
    let config = TranslatorConfig::new("test-auth-key", server.uri()).retry(policy);
    let translator = Translator::new(config).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let error = translator.usage(&cancel).await.unwrap_err();

    assert!(matches!(error, TranslationError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_execute_withAlreadyCancelledToken_shouldNotCallServer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(usage_body()))
        .expect(0)
        .mount(&server)
        .await;

    let translator = translator_for(&server, 3).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let error = translator.usage(&cancel).await.unwrap_err();
    assert!(matches!(error, TranslationError::Cancelled));
}

#[tokio::test]
async fn test_translateText_withSuccess_shouldReturnTranslationsInOrder() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [
                { "detected_source_language": "EN", "text": "Bonjour" },
                { "detected_source_language": "EN", "text": "Monde" }
            ]
        })))
        .mount(&server)
        .await;

    let translator = translator_for(&server, 3).await;
    let translations = translator
        .translate_text(
            &["Hello", "World"],
            &lingodoc::TextOptions::new("fr"),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(translations.len(), 2);
    assert_eq!(translations[0].text, "Bonjour");
    assert_eq!(translations[1].text, "Monde");

    Ok(())
}

#[tokio::test]
async fn test_translateText_withNoTexts_shouldRejectLocally() {
    let server = MockServer::start().await;
    let translator = translator_for(&server, 3).await;

    let error = translator
        .translate_text(&[], &lingodoc::TextOptions::new("fr"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, TranslationError::InvalidInput(_)));
}
