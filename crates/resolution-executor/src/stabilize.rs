//! DOM stabilization: poll snapshots until the element count stops
//! moving for a quiet window, or give up at the cap.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use pagemend_core_types::{PagePort, PortError};

/// Quiet-window policy for post-resolution settling.
#[derive(Clone, Copy, Debug)]
pub struct StabilizePolicy {
    /// How long the element count must hold still to call the DOM stable.
    pub quiet_ms: u64,
    /// Hard cap on the whole stabilization wait.
    pub cap_ms: u64,
    pub poll_ms: u64,
}

impl Default for StabilizePolicy {
    fn default() -> Self {
        Self {
            quiet_ms: 500,
            cap_ms: 3000,
            poll_ms: 100,
        }
    }
}

impl StabilizePolicy {
    pub fn scaled(&self, multiplier: f64) -> Self {
        let scale = |ms: u64| ((ms as f64) * multiplier).round().max(1.0) as u64;
        Self {
            quiet_ms: scale(self.quiet_ms),
            cap_ms: scale(self.cap_ms),
            poll_ms: self.poll_ms,
        }
    }
}

/// Returns `Ok(true)` once the DOM has been quiet for `quiet_ms`,
/// `Ok(false)` when the cap expires first. Never errors on a busy page.
pub async fn await_stable(port: &dyn PagePort, policy: StabilizePolicy) -> Result<bool, PortError> {
    let start = Instant::now();
    let deadline = start + Duration::from_millis(policy.cap_ms);
    let quiet = Duration::from_millis(policy.quiet_ms);

    let mut last_count = port.snapshot(false).await?.element_count();
    let mut quiet_since = Instant::now();

    loop {
        sleep(Duration::from_millis(policy.poll_ms)).await;
        let now = Instant::now();
        let count = port.snapshot(false).await?.element_count();
        if count != last_count {
            last_count = count;
            quiet_since = now;
        }
        if now.duration_since(quiet_since) >= quiet {
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "dom stabilized");
            return Ok(true);
        }
        if now >= deadline {
            debug!(cap_ms = policy.cap_ms, "dom still busy at stabilization cap");
            return Ok(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use pagemend_core_types::{
        ElementSignature, PagePrimitive, PageState, PrimitiveResult,
    };

    /// Port whose element count follows a fixed schedule of poll results.
    struct ChurningPort {
        counts: Mutex<Vec<usize>>,
    }

    impl ChurningPort {
        fn new(counts: Vec<usize>) -> Self {
            Self {
                counts: Mutex::new(counts),
            }
        }
    }

    #[async_trait]
    impl PagePort for ChurningPort {
        async fn snapshot(&self, _include_visual_hint: bool) -> Result<PageState, PortError> {
            let mut counts = self.counts.lock();
            let count = if counts.len() > 1 {
                counts.remove(0)
            } else {
                counts[0]
            };
            let elements = (0..count)
                .map(|i| ElementSignature::new(format!("div{i}")))
                .collect();
            Ok(PageState::new("https://a.test", "t").with_elements(elements))
        }

        async fn act(&self, _primitive: &PagePrimitive) -> Result<PrimitiveResult, PortError> {
            Ok(PrimitiveResult::ok())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn settles_once_count_holds_still() {
        let port = ChurningPort::new(vec![5, 7, 9, 9, 9, 9, 9, 9, 9]);
        let stable = await_stable(&port, StabilizePolicy::default()).await.unwrap();
        assert!(stable);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_cap_on_a_busy_page() {
        let counts: Vec<usize> = (0..200).collect();
        let port = ChurningPort::new(counts);
        let stable = await_stable(&port, StabilizePolicy::default()).await.unwrap();
        assert!(!stable);
    }
}
