use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time;

use flowtrail::{BatchSink, BatchingIngestQueue, Bus, QueueConfig, SinkError, SinkFn, StopOutcome};

type Batches = Arc<Mutex<Vec<Vec<u32>>>>;

fn queue(capacity: usize, batch_size: usize, flush: Duration) -> (BatchingIngestQueue<u32>, Batches) {
    let batches = Batches::default();
    let seen = Arc::clone(&batches);
    let sink: Arc<dyn BatchSink<u32>> = SinkFn::arc("recording", move |batch: Vec<u32>| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().push(batch);
            Ok::<_, SinkError>(())
        }
    });
    let cfg = QueueConfig {
        capacity,
        batch_size,
        flush_interval: flush,
        drain_timeout: Duration::from_secs(5),
    };
    (BatchingIngestQueue::new("test", cfg, sink, Bus::new(256)), batches)
}

#[tokio::test(start_paused = true)]
async fn accepted_items_never_exceed_capacity() {
    let (q, _) = queue(5, 100, Duration::from_secs(60));

    let results: Vec<bool> = (0..12).map(|n| q.enqueue(n)).collect();
    assert_eq!(results.iter().filter(|ok| **ok).count(), 5);
    assert!(results[..5].iter().all(|ok| *ok));

    let stats = q.stats();
    assert_eq!(stats.dropped, 7);
    assert_eq!(stats.queue_size, 5);
    assert_eq!(stats.capacity, 5);
}

#[tokio::test(start_paused = true)]
async fn size_trigger_flushes_before_the_interval() {
    let (q, batches) = queue(100, 3, Duration::from_secs(60));
    q.start();
    for n in 1..=3 {
        assert!(q.enqueue(n));
    }

    time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*batches.lock(), vec![vec![1, 2, 3]]);
    assert_eq!(q.stats().processed, 3);
    q.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn time_trigger_flushes_a_single_item() {
    let (q, batches) = queue(100, 100, Duration::from_millis(200));
    q.start();
    q.enqueue(7);

    time::sleep(Duration::from_millis(250)).await;
    assert_eq!(*batches.lock(), vec![vec![7]]);
    q.stop(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn stop_flushes_items_below_both_thresholds() {
    let (q, batches) = queue(100, 100, Duration::from_secs(60));
    q.start();
    q.enqueue(1);
    q.enqueue(2);
    time::sleep(Duration::from_millis(10)).await;
    assert!(batches.lock().is_empty());

    assert_eq!(q.stop(Duration::from_secs(1)).await, StopOutcome::Drained);
    assert_eq!(*batches.lock(), vec![vec![1, 2]]);

    let stats = q.stats();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.queue_size, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_drains_backlog_in_batch_sized_chunks() {
    let (q, batches) = queue(100, 3, Duration::from_secs(60));
    for n in 0..7 {
        q.enqueue(n);
    }
    q.start();
    q.stop(Duration::from_secs(1)).await;

    let flat: Vec<u32> = batches.lock().iter().flatten().copied().collect();
    assert_eq!(flat, (0..7).collect::<Vec<_>>());
    assert!(batches.lock().iter().all(|b| b.len() <= 3));
}
