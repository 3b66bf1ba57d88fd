//! Event sources feeding the producer.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::model::{Level, StreamEvent};

/// Synthesizes stream events, one per producer tick.
///
/// Returning `None` ends the stream: the producer closes the queue and the
/// consumer finishes with whatever it has.
pub trait EventSource: Send + 'static {
    fn next_event(&mut self, seq: u64) -> Option<StreamEvent>;
}

const MESSAGES: [&str; 4] = [
    "User logged in",
    "Database connection failed",
    "Request processed",
    "Timeout occurred",
];

/// Endless source of log-like events with a random level and message.
#[derive(Debug)]
pub struct RandomLogSource {
    rng: StdRng,
}

impl RandomLogSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomLogSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for RandomLogSource {
    fn next_event(&mut self, seq: u64) -> Option<StreamEvent> {
        let level = *Level::ALL.choose(&mut self.rng)?;
        let message = *MESSAGES.choose(&mut self.rng)?;
        Some(StreamEvent::new(seq, level, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_sources_agree() {
        let mut a = RandomLogSource::seeded(7);
        let mut b = RandomLogSource::seeded(7);
        for seq in 1..=20 {
            let (ea, eb) = (a.next_event(seq).unwrap(), b.next_event(seq).unwrap());
            assert_eq!(ea.level, eb.level);
            assert_eq!(ea.message, eb.message);
            assert_eq!(ea.seq, seq);
        }
    }

    #[test]
    fn messages_come_from_catalogue() {
        let mut source = RandomLogSource::seeded(1);
        for seq in 1..=50 {
            let event = source.next_event(seq).unwrap();
            assert!(MESSAGES.contains(&event.message.as_str()));
        }
    }
}
