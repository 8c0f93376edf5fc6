use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;

use graphql_dispatch::graphql_client::{
    budget::RateBudget, context::RequestContext, error::ClientErrorKind,
    types::RateBudgetConfig,
};

fn one_token_per_second(burst: u32) -> RateBudget {
    RateBudget::new(&RateBudgetConfig {
        limit_per_hour: 3600,
        burst,
    })
}

#[tokio::test(start_paused = true)]
async fn given_full_bucket_when_burst_is_spent_then_next_acquire_waits_for_refill() {
    let budget = one_token_per_second(10);
    let ctx = RequestContext::new();

    let started = Instant::now();
    budget.acquire(10, &ctx).await.expect("burst is available");
    assert!(started.elapsed() < Duration::from_millis(1));

    budget.acquire(5, &ctx).await.expect("refill arrives");
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn given_concurrent_callers_when_acquiring_then_served_in_arrival_order_without_over_admission()
{
    let budget = Arc::new(one_token_per_second(10));
    let admitted = Arc::new(Mutex::new(Vec::new()));
    let started = Instant::now();

    let mut tasks = Vec::new();
    for caller in 0..5u64 {
        let budget = budget.clone();
        let admitted = admitted.clone();
        tasks.push(tokio::spawn(async move {
            sleep(Duration::from_millis(caller)).await;
            budget
                .acquire(10, &RequestContext::new())
                .await
                .expect("acquire should succeed");
            admitted
                .lock()
                .expect("admitted lock")
                .push((caller, started.elapsed()));
        }));
    }
    for task in tasks {
        task.await.expect("caller task");
    }

    let admitted = admitted.lock().expect("admitted lock").clone();
    let order = admitted.iter().map(|(caller, _)| *caller).collect::<Vec<_>>();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);

    // consumption by time t never exceeds burst + refill * t
    for (index, (_, at)) in admitted.iter().enumerate() {
        let consumed = 10 * (index as u64 + 1);
        let allowed = 10.0 + at.as_secs_f64() + 0.01;
        assert!(
            consumed as f64 <= allowed,
            "caller {index} admitted at {at:?} after {consumed} units"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn given_cancellation_while_waiting_when_acquiring_then_no_tokens_are_taken() {
    let budget = one_token_per_second(10);
    budget
        .acquire(10, &RequestContext::new())
        .await
        .expect("burst is available");

    let token = CancellationToken::new();
    let ctx = RequestContext::new().with_cancellation(token.clone());
    let waiter = budget.acquire(8, &ctx);
    let cancel = async {
        sleep(Duration::from_secs(2)).await;
        token.cancel();
    };
    let (result, ()) = tokio::join!(waiter, cancel);

    let err = result.expect_err("cancelled while waiting");
    assert_eq!(err.kind, ClientErrorKind::Cancelled);
    assert_eq!(budget.available().await, 2);
}

#[tokio::test(start_paused = true)]
async fn given_deadline_shorter_than_refill_when_acquiring_then_cancelled() {
    let budget = one_token_per_second(5);
    budget
        .acquire(5, &RequestContext::new())
        .await
        .expect("burst is available");

    let ctx = RequestContext::new().with_timeout(Duration::from_secs(1));
    let err = budget
        .acquire(5, &ctx)
        .await
        .expect_err("refill takes 5s");
    assert_eq!(err.kind, ClientErrorKind::Cancelled);
}

#[tokio::test]
async fn given_cost_above_capacity_when_acquiring_then_budget_exceeded_without_waiting() {
    let budget = one_token_per_second(10);
    let result = timeout(
        Duration::from_millis(100),
        budget.acquire(11, &RequestContext::new()),
    )
    .await
    .expect("must not wait");
    assert_eq!(
        result.expect_err("over capacity").kind,
        ClientErrorKind::BudgetExceeded
    );
}

#[tokio::test]
async fn given_zero_hourly_limit_when_acquiring_then_budget_is_unlimited() {
    let budget = RateBudget::new(&RateBudgetConfig {
        limit_per_hour: 0,
        burst: 1,
    });
    assert!(budget.is_unlimited());
    budget
        .acquire(1_000_000, &RequestContext::new())
        .await
        .expect("unlimited budgets admit anything");
}
