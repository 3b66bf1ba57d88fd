//! Periodic producer: one event per tick onto a bounded queue.
//!
//! A full queue blocks the producer until the consumer makes room or the
//! stop signal fires. Events are never dropped to keep the cadence.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::StreamEvent;

use super::source::EventSource;

/// Run until `stop` fires, the source runs dry, or the consumer hangs up.
///
/// The sender is dropped on return, which closes the queue. Returns the
/// number of events delivered.
pub async fn run_producer<S: EventSource>(
    mut source: S,
    tx: mpsc::Sender<StreamEvent>,
    period: Duration,
    stop: CancellationToken,
) -> u64 {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq = 0u64;
    let mut delivered = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        seq += 1;
        let Some(event) = source.next_event(seq) else {
            debug!(seq, "source exhausted");
            break;
        };

        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            sent = tx.send(event) => {
                if sent.is_err() {
                    debug!(seq, "consumer gone, stopping producer");
                    break;
                }
                delivered += 1;
            }
        }
    }

    debug!(delivered, "producer stopped");
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;

    struct Counting;

    impl EventSource for Counting {
        fn next_event(&mut self, seq: u64) -> Option<StreamEvent> {
            Some(StreamEvent::new(seq, Level::Info, "tick"))
        }
    }

    struct Finite(u64);

    impl EventSource for Finite {
        fn next_event(&mut self, seq: u64) -> Option<StreamEvent> {
            (seq <= self.0).then(|| StreamEvent::new(seq, Level::Warn, "finite"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_blocks_instead_of_dropping() {
        let (tx, mut rx) = mpsc::channel(2);
        let stop = CancellationToken::new();
        let producer = tokio::spawn(run_producer(
            Counting,
            tx,
            Duration::from_millis(10),
            stop.clone(),
        ));

        // Far more ticks than the queue holds; nobody is reading.
        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.cancel();
        let delivered = producer.await.unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(rx.recv().await.unwrap().seq, 1);
        assert_eq!(rx.recv().await.unwrap().seq, 2);
        assert!(rx.recv().await.is_none(), "queue closes when producer stops");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_source_closes_queue() {
        let (tx, mut rx) = mpsc::channel(8);
        let delivered = run_producer(
            Finite(3),
            tx,
            Duration::from_millis(5),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(delivered, 3);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event.seq);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
