//! Generic single-consumer event loop.
//!
//! One task owns the state. Each wake-up is either a queued message or the
//! expiry of the deadline the state currently reports; shutdown ends the
//! loop after everything already queued has been handed to the handler.

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::shutdown::ShutdownSignal;

/// Why the handler was invoked.
#[derive(Debug)]
pub enum Wake<M> {
    Message(M),
    Deadline,
}

/// Drive `handler` until shutdown is signalled or every sender is gone.
///
/// `deadline_fn` is consulted before each wait; `None` means no timer is
/// running. Shutdown and deadlines take precedence over new messages.
/// Returns the final state so the caller can flush it.
pub async fn run_consumer<M, S, D, H>(
    mut rx: mpsc::Receiver<M>,
    mut shutdown: ShutdownSignal,
    mut state: S,
    deadline_fn: D,
    mut handler: H,
) -> S
where
    D: Fn(&S) -> Option<Instant>,
    H: FnMut(&mut S, Wake<M>),
{
    loop {
        let deadline = deadline_fn(&state);
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                tracing::debug!("consumer received shutdown signal");
                break;
            }

            _ = wait_for(deadline) => {
                handler(&mut state, Wake::Deadline);
            }

            msg = rx.recv() => match msg {
                Some(msg) => handler(&mut state, Wake::Message(msg)),
                None => {
                    tracing::debug!("all producers dropped, consumer exiting");
                    break;
                }
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Ok(msg) = rx.try_recv() {
        handler(&mut state, Wake::Message(msg));
        drained += 1;
    }
    if drained > 0 {
        tracing::debug!(drained, "drained queued messages after shutdown");
    }
    state
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownController;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<u32>,
        deadline: Option<Instant>,
        fired: usize,
    }

    #[tokio::test]
    async fn handles_messages_in_order_then_exits_when_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let controller = ShutdownController::new();
        for i in 0..5 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let state = run_consumer(rx, controller.signal(), Recorder::default(), |s| s.deadline, |s, wake| {
            if let Wake::Message(m) = wake {
                s.seen.push(m);
            }
        })
        .await;
        assert_eq!(state.seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_once_per_arming() {
        let (tx, rx) = mpsc::channel::<u32>(8);
        let controller = ShutdownController::new();

        let handle = tokio::spawn(run_consumer(
            rx,
            controller.signal(),
            Recorder::default(),
            |s| s.deadline,
            |s, wake| match wake {
                Wake::Message(m) => {
                    s.seen.push(m);
                    s.deadline.get_or_insert(Instant::now() + Duration::from_millis(50));
                }
                Wake::Deadline => {
                    s.fired += 1;
                    s.deadline = None;
                }
            },
        ));

        tx.send(1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(tx);
        let state = handle.await.unwrap();
        assert_eq!(state.seen, vec![1]);
        assert_eq!(state.fired, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_queued_messages() {
        let (tx, rx) = mpsc::channel(8);
        let controller = ShutdownController::new();
        tx.send(7).await.unwrap();
        tx.send(8).await.unwrap();
        controller.shutdown();

        let state = run_consumer(rx, controller.signal(), Recorder::default(), |s| s.deadline, |s, wake| {
            if let Wake::Message(m) = wake {
                s.seen.push(m);
            }
        })
        .await;
        assert_eq!(state.seen, vec![7, 8]);
        assert!(tx.send(9).await.is_err());
    }
}
