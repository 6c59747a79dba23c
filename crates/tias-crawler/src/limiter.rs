use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep_until, Instant};

/// Spaces out consecutive requests by a (possibly randomized) delay.
///
/// The first call to [`DelayLimiter::wait`] returns immediately, every
/// following one waits until the delay has elapsed since the previous call
/// returned.
#[derive(Debug, Clone)]
pub struct DelayLimiter {
    delay: Duration,
    randomize: bool,
    last: Option<Instant>,
}

impl DelayLimiter {
    pub fn new(delay_secs: f32, randomize: bool) -> Self {
        Self {
            delay: Duration::from_secs_f32(delay_secs.max(0.)),
            randomize,
            last: None,
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.randomize && !self.delay.is_zero() {
            self.delay.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
        } else {
            self.delay
        }
    }

    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            let delay = self.next_delay();
            log::trace!("Waiting {delay:?} before next request");
            sleep_until(last + delay).await;
        }
        self.last = Some(Instant::now());
    }
}
