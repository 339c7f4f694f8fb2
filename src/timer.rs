//! Retransmission timer.
//!
//! Go-Back-N keeps a single timer for the oldest unacknowledged frame
//! (`window_base`).  [`RetransmitTimer`] holds that deadline; the sender's
//! event loop races [`RetransmitTimer::expired`] against the next inbound
//! datagram in `tokio::select!`, so no flag is shared between the two.
//!
//! The timeout is fixed per session.  There is no RTT estimation or back-off:
//! the retry budget in [`crate::sender::SenderConfig`] bounds the total wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Deadline for the oldest in-flight frame, or disarmed.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    /// A disarmed timer that will run for `timeout` once armed.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// (Re)start the countdown from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }

    /// Start the countdown only if it is not already running.
    pub fn arm_if_idle(&mut self) {
        if self.deadline.is_none() {
            self.arm();
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves at the current deadline; never resolves while disarmed.
    ///
    /// The future copies the deadline, so re-arming the timer does not
    /// affect a future that was already created.
    pub fn expired(&self) -> impl Future<Output = ()> {
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disarmed() {
        let t = RetransmitTimer::new(Duration::from_millis(10));
        assert!(!t.is_armed());
        assert_eq!(t.timeout(), Duration::from_millis(10));
    }

    #[test]
    fn arm_if_idle_keeps_running_deadline() {
        let mut t = RetransmitTimer::new(Duration::from_millis(10));
        t.arm();
        let first = t.deadline;
        t.arm_if_idle();
        assert_eq!(t.deadline, first);
        t.cancel();
        assert!(!t.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_after_timeout() {
        let mut t = RetransmitTimer::new(Duration::from_millis(50));
        t.arm();
        let start = Instant::now();
        t.expired().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let t = RetransmitTimer::new(Duration::from_millis(5));
        let raced = tokio::time::timeout(Duration::from_secs(1), t.expired()).await;
        assert!(raced.is_err());
    }
}
