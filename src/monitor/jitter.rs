use rand::Rng;
use std::time::Duration;

/// Random delay in `[0, max]` applied before a probe starts
pub fn random_probe_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(0..=max_ms))
}
