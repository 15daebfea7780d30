use painscout_core::{
    BillingError, ConfigError, CoreError, DatabaseError, ErrorExt, LlmError, RedditApiError,
};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::DatabaseLocked);
    assert_eq!(db_error.error_code(), "DATABASE");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "openai".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let billing_error = CoreError::Billing(BillingError::InvalidSignature);
    assert_eq!(billing_error.error_code(), "BILLING");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let in_flight = CoreError::Billing(BillingError::EventInFlight {
        event_id: "evt_1".to_string(),
    });
    assert!(in_flight.is_retryable());

    let locked = CoreError::Database(DatabaseError::DatabaseLocked);
    assert!(locked.is_retryable());
    assert_eq!(locked.retry_after(), Some(Duration::from_millis(100)));

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let timeout_error = CoreError::Timeout { seconds: 10 };
    assert_eq!(timeout_error.retry_after(), Some(Duration::from_secs(10)));

    let not_found = CoreError::NotFound {
        resource: "idea".to_string(),
    };
    assert_eq!(not_found.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let blocked = CoreError::RedditApi(RedditApiError::Forbidden {
        resource: "/r/startups/hot".to_string(),
    });
    assert!(blocked.user_friendly_message().contains("cloud IPs"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert!(config_error.user_friendly_message().contains("api_key"));
}

#[test]
fn test_nested_error_codes() {
    assert_eq!(
        BillingError::MissingSignature.error_code(),
        "BILLING_MISSING_SIGNATURE"
    );
    assert_eq!(
        RedditApiError::UserNotFound {
            username: "ghost".to_string()
        }
        .error_code(),
        "REDDIT_USER_NOT_FOUND"
    );
}
