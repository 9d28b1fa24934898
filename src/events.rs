//! Push notifications for signup windows opening.
//!
//! Every subscriber gets its own pair of one-shot timers, computed from the
//! moment it subscribed. Sessions live in a table keyed by id; dropping the
//! [`Subscription`] removes the session and aborts whatever timers are still
//! pending.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use actix_web::web::Bytes;
use async_stream::stream;
use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::schedule::{Category, WindowSchedule};

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

const KEEP_ALIVE_FRAME: &str = ": keep-alive\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvent {
    pub category: Category,
}

impl WindowEvent {
    /// Server-sent event frame, e.g. `data: {"guest":true}`.
    pub fn to_sse_frame(&self) -> String {
        let payload = match self.category {
            Category::Guest => serde_json::json!({ "guest": true }),
            Category::Other => serde_json::json!({ "others": true }),
        };
        format!("data: {}\n\n", payload)
    }
}

struct SubscriberSession {
    guest: Option<JoinHandle<()>>,
    other: Option<JoinHandle<()>>,
    // Keeps the stream open after both timers have fired.
    _events: mpsc::UnboundedSender<WindowEvent>,
}

impl SubscriberSession {
    fn cancel(self) {
        // Aborting a finished task is a no-op.
        for timer in [self.guest, self.other].into_iter().flatten() {
            timer.abort();
        }
    }
}

#[derive(Clone)]
pub struct WindowEventPublisher {
    schedule: WindowSchedule,
    sessions: Arc<Mutex<HashMap<Uuid, SubscriberSession>>>,
}

impl WindowEventPublisher {
    pub fn new(schedule: WindowSchedule) -> Self {
        Self {
            schedule,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, SubscriberSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribe_at(Utc::now())
    }

    /// Registers a subscriber whose wall-clock subscribe time is `now`.
    /// Must be called from within a tokio runtime.
    pub fn subscribe_at(&self, now: DateTime<Utc>) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let accepting = matches!(self.schedule.signup_close, Some(close) if now < close);
        let (guest, other) = if accepting {
            (
                self.arm(id, Category::Guest, now, &tx),
                self.arm(id, Category::Other, now, &tx),
            )
        } else {
            (None, None)
        };

        debug!(
            "subscriber {} registered (guest timer: {}, other timer: {})",
            id,
            guest.is_some(),
            other.is_some()
        );

        self.sessions().insert(
            id,
            SubscriberSession {
                guest,
                other,
                _events: tx,
            },
        );

        Subscription {
            id,
            events: rx,
            publisher: self.clone(),
        }
    }

    fn arm(
        &self,
        id: Uuid,
        category: Category,
        now: DateTime<Utc>,
        tx: &mpsc::UnboundedSender<WindowEvent>,
    ) -> Option<JoinHandle<()>> {
        // `to_std` rejects negative durations: that window has already opened.
        let delay = (self.schedule.opens_at(category)? - now).to_std().ok()?;
        if delay.is_zero() {
            return None;
        }

        let tx = tx.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(WindowEvent { category }).is_err() {
                debug!("subscriber {} went away before the {:?} window opened", id, category);
            }
        }))
    }

    /// Drops the session and aborts its pending timers. Returns whether the
    /// session existed.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let session = self.sessions().remove(&id);
        match session {
            Some(session) => {
                session.cancel();
                debug!("subscriber {} disconnected", id);
                true
            }
            None => false,
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }
}

/// A live subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    events: mpsc::UnboundedReceiver<WindowEvent>,
    publisher: WindowEventPublisher,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next window to open. Pends forever once both have.
    pub async fn next_event(&mut self) -> Option<WindowEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.publisher.unsubscribe(self.id);
    }
}

/// Body of the `/signup/enable` response. Interleaves window events with
/// keep-alive comments so that a vanished client is noticed on write.
pub fn sse_stream(
    mut subscription: Subscription,
    keep_alive: Duration,
) -> impl futures::Stream<Item = Result<Bytes, actix_web::Error>> {
    stream! {
        info!("event stream opened for subscriber {}", subscription.id());
        let mut ticker = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
        loop {
            let frame = tokio::select! {
                event = subscription.next_event() => match event {
                    Some(event) => event.to_sse_frame(),
                    None => break,
                },
                _ = ticker.tick() => KEEP_ALIVE_FRAME.to_string(),
            };
            yield Ok::<Bytes, actix_web::Error>(Bytes::from(frame));
        }
    }
}
