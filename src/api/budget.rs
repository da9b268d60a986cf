use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token bucket pacing catalog calls under the shared requests-per-minute
/// ceiling. Every request costs one token; an empty bucket makes the
/// caller sleep until enough has refilled.
#[derive(Debug)]
pub struct RateBudget {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateBudget {
    pub fn per_minute(limit: u32) -> Self {
        let capacity = f64::from(limit.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / 60.0,
        }
    }

    /// Take one token, sleeping as long as the bucket is empty.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                refill(&mut state, Instant::now(), self.capacity, self.refill_per_sec);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                deficit_wait(state.tokens, self.refill_per_sec)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

fn refill(state: &mut BucketState, now: Instant, capacity: f64, refill_per_sec: f64) {
    let elapsed = now.duration_since(state.last_refill).as_secs_f64();
    if elapsed > 0.0 {
        state.tokens = (state.tokens + elapsed * refill_per_sec).min(capacity);
        state.last_refill = now;
    }
}

/// Time until the next whole token given the current shortfall.
fn deficit_wait(tokens: f64, refill_per_sec: f64) -> Duration {
    let missing = (1.0 - tokens).max(0.0);
    Duration::from_secs_f64(missing / refill_per_sec)
}
