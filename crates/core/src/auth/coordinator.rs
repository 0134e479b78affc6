//! Single-flight renewal coordinator
//!
//! At most one renewal runs at a time per coordinator instance (one instance
//! per execution context). Callers arriving while a renewal is in flight are
//! queued and receive the same outcome, in arrival order, once it settles.
//! The renewal function persists the new pair before returning, so every
//! queued caller observes the stored credential it is handed.

use std::future::Future;

use novaio_domain::{CredentialPair, RenewalError};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

type Outcome = Result<CredentialPair, RenewalError>;

#[derive(Default)]
struct FlightState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Coordinates credential renewals so concurrent callers share one call.
#[derive(Default)]
pub struct SingleFlight {
    state: Mutex<FlightState>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `renew` unless a renewal is already in flight, in which case wait
    /// for that renewal's outcome instead.
    ///
    /// `renew` is called at most once per invocation and never concurrently
    /// with another `renew` passed to the same coordinator.
    ///
    /// # Errors
    /// Returns the renewal's classified failure. A follower whose leader was
    /// dropped before settling receives a `NetworkOrOther` failure.
    pub async fn coordinate<F, Fut>(&self, renew: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let follower = {
            let mut state = self.state.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                debug!(queued = state.waiters.len(), "renewal in flight; queued");
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = follower {
            return rx.await.unwrap_or_else(|_| {
                Err(RenewalError::transport("renewal abandoned before it settled"))
            });
        }

        let flight = Flight { coordinator: self, settled: false };
        let outcome = renew().await;
        flight.settle(&outcome);
        outcome
    }

    // Clears the in-flight flag and empties the queue under one lock, so a
    // caller arriving afterwards starts a fresh renewal instead of joining a
    // settled one.
    fn take_waiters(&self) -> Vec<oneshot::Sender<Outcome>> {
        let mut state = self.state.lock();
        state.in_flight = false;
        std::mem::take(&mut state.waiters)
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

/// Leader-side guard. Dropping it unsettled (the leader's future was
/// cancelled) releases the flag and wakes followers with an error.
struct Flight<'a> {
    coordinator: &'a SingleFlight,
    settled: bool,
}

impl Flight<'_> {
    fn settle(mut self, outcome: &Outcome) {
        self.settled = true;
        let waiters = self.coordinator.take_waiters();
        debug!(waiters = waiters.len(), success = outcome.is_ok(), "renewal settled");
        for waiter in waiters {
            // A follower that stopped waiting is not an error.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            drop(self.coordinator.take_waiters());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use novaio_domain::RenewalErrorKind;

    use super::*;

    fn pair(n: usize) -> CredentialPair {
        CredentialPair::new(format!("access-{n}"), format!("refresh-{n}"))
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_renewal() {
        let flight = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = (0..5).map(|_| {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            async move {
                flight
                    .coordinate(|| async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(pair(n))
                    })
                    .await
            }
        });

        let results = join_all(tasks).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), pair(0));
        }
    }

    #[tokio::test]
    async fn failure_is_delivered_to_every_caller() {
        let flight = Arc::new(SingleFlight::new());

        let tasks = (0..3).map(|_| {
            let flight = Arc::clone(&flight);
            async move {
                flight
                    .coordinate(|| async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(RenewalError::from_status(401, None))
                    })
                    .await
            }
        });

        for result in join_all(tasks).await {
            assert_eq!(result.unwrap_err().kind, RenewalErrorKind::Unauthorized);
        }
    }

    #[tokio::test]
    async fn sequential_calls_each_renew() {
        let flight = SingleFlight::new();
        let calls = AtomicUsize::new(0);

        for expected in 0..2 {
            let result = flight
                .coordinate(|| async { Ok(pair(calls.fetch_add(1, Ordering::SeqCst))) })
                .await;
            assert_eq!(result.unwrap(), pair(expected));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(flight.queued(), 0);
    }

    #[tokio::test]
    async fn followers_are_released_when_leader_is_cancelled() {
        let flight = Arc::new(SingleFlight::new());

        let leader = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .coordinate(|| async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok(pair(0))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let follower = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move { flight.coordinate(|| async { Ok(pair(1)) }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(flight.queued(), 1);

        leader.abort();
        let result = follower.await.unwrap();
        assert_eq!(result.unwrap_err().kind, RenewalErrorKind::NetworkOrOther);

        // The flag was released, so the next caller renews again.
        let next = flight.coordinate(|| async { Ok(pair(2)) }).await;
        assert_eq!(next.unwrap(), pair(2));
    }
}
