use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};

use tripvar_core::{RetryPolicy, Runnable, RunnableExt, StreamEvent, TripvarError};

fn policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::ZERO)
}

#[test]
fn delay_doubles_and_is_capped_at_ten_times_base() {
    let policy = RetryPolicy::new(10, Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
    assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
}

#[test]
fn zero_attempts_is_treated_as_one() {
    assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
}

#[tokio::test]
async fn always_failing_network_call_runs_exactly_max_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let result: Result<(), TripvarError> = policy(4)
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TripvarError::Network("connection refused".to_string()))
            }
        })
        .await;

    assert!(matches!(result, Err(TripvarError::Network(ref msg)) if msg == "connection refused"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn retries_until_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let output = policy(3)
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(TripvarError::Upstream {
                        status: Some(502),
                        message: "bad gateway".to_string(),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(output, "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_fail_fast() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let err = policy(5)
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TripvarError::Upstream {
                    status: Some(400),
                    message: "bad request".to_string(),
                })
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TripvarError::Upstream { status: Some(400), .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn validation_errors_fail_fast() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let err = policy(5)
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TripvarError::Validation("bad day".to_string()))
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TripvarError::Validation(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_output_is_retried_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let err = policy(5)
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TripvarError::empty_output("stream"))
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TripvarError::Upstream { status: None, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn limited_retry_budget_is_configurable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let err = policy(5)
        .with_limited_retries(2)
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TripvarError::Parse {
                    output: "{\"choices\":".to_string(),
                    reason: "EOF while parsing".to_string(),
                })
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TripvarError::Parse { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

struct Flaky {
    failures_before_success: usize,
    attempts: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Runnable<String, String> for Flaky {
    async fn invoke(&self, input: String) -> Result<String, TripvarError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures_before_success {
            return Err(TripvarError::Timeout(Duration::from_millis(10)));
        }
        Ok(format!("ok:{input}"))
    }

    fn stream(&self, _input: String) -> BoxStream<'_, Result<StreamEvent, TripvarError>> {
        futures::stream::iter(vec![Ok(StreamEvent::FinalAnswer(String::new()))]).boxed()
    }
}

#[tokio::test]
async fn retrying_runnable_uses_policy() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let flaky = Flaky {
        failures_before_success: 2,
        attempts: Arc::clone(&attempts),
    };

    let output = flaky
        .with_retry_policy(policy(3))
        .invoke("ping".to_string())
        .await
        .unwrap();

    assert_eq!(output, "ok:ping");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retrying_runnable_surfaces_last_error() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let flaky = Flaky {
        failures_before_success: 10,
        attempts: Arc::clone(&attempts),
    };

    let err = flaky
        .with_retry_policy(policy(2))
        .invoke("ping".to_string())
        .await
        .unwrap_err();

    assert!(matches!(err, TripvarError::Timeout(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
