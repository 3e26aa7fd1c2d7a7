use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use submission_core::config::RetryConfig;
use submission_core::models::{QueuedSubmission, SubmissionKey, SubmissionTrigger};
use submission_core::orchestration::{ErrorCategory, RetryPolicy, SubmissionQueue};

fn key(i: usize) -> SubmissionKey {
    SubmissionKey::new(
        format!("subject_{i:05}"),
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        "policy_abc",
    )
}

fn benchmark_enqueue_dequeue(c: &mut Criterion) {
    c.bench_function("queue_enqueue_dequeue_1000", |b| {
        b.iter(|| {
            let queue = SubmissionQueue::new();
            for i in 0..1000 {
                let priority = (i % 3) as i32;
                queue.enqueue(QueuedSubmission::new(key(i), SubmissionTrigger::Manual, priority));
            }
            while let Some(item) = queue.dequeue() {
                queue.complete(black_box(&item.key));
            }
        })
    });
}

fn benchmark_duplicate_rejection(c: &mut Criterion) {
    let queue = SubmissionQueue::new();
    for i in 0..1000 {
        queue.enqueue(QueuedSubmission::new(key(i), SubmissionTrigger::Schedule, 1));
    }
    c.bench_function("queue_duplicate_rejection", |b| {
        b.iter(|| {
            queue.enqueue(black_box(QueuedSubmission::new(
                key(500),
                SubmissionTrigger::Schedule,
                1,
            )))
        })
    });
}

fn benchmark_backoff(c: &mut Criterion) {
    let policy = RetryPolicy::new(RetryConfig::default());
    c.bench_function("retry_policy_delay", |b| {
        b.iter(|| policy.delay(black_box(3), ErrorCategory::ServerError))
    });
}

criterion_group!(
    benches,
    benchmark_enqueue_dequeue,
    benchmark_duplicate_rejection,
    benchmark_backoff
);
criterion_main!(benches);
