use crate::{actor::actor::ActorRef, error::ActorError};
use std::fmt::Debug;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Sends a fixed message to an actor on a fixed period, for as long as the
/// actor's mailbox accepts it. Generic over the message type so the same
/// driver serves the factory tick, the piece intake poll, and the day-tick
/// source.
pub struct TickScheduler<M: Clone + Send + Debug + 'static> {
    actor_ref: ActorRef<M>,
    period: Duration,
    tick: M,
}

impl<M: Clone + Send + Debug + 'static> TickScheduler<M> {
    pub fn new(actor_ref: ActorRef<M>, period: Duration, tick: M) -> Self {
        Self { actor_ref, period, tick }
    }

    /// Runs until the actor's mailbox closes or `cancel` fires, whichever
    /// comes first.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {
                    if self.actor_ref.send(self.tick.clone()).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    pub async fn send_once(&self) -> Result<(), ActorError> {
        self.actor_ref.send(self.tick.clone()).await
    }
}
