//! Single-connection database access with automatic reconnection.
//!
//! The keeper is the only owner of the connection handle. Callers hand it a
//! closure through [`ConnectionKeeper::query`]; while the connection is down
//! every query fails fast with [`QueryError::Transient`] and a background task
//! keeps retrying the connect on a fixed delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{Connection, ConnectionError, ConnectionResult, PgConnection, QueryResult, RunQueryDsl};
use log::{error, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

use crate::actions;

pub type DbError = Box<dyn std::error::Error + Send + Sync>;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Opens new connections for the keeper. Runs on the blocking pool.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    fn connect(&self) -> ConnectionResult<Self::Connection>;

    /// Round-trips a trivial statement on an existing handle.
    fn ping(&self, conn: &mut Self::Connection) -> bool;
}

pub struct PgConnector {
    database_url: String,
}

impl PgConnector {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

impl Connector for PgConnector {
    type Connection = PgConnection;

    fn connect(&self) -> ConnectionResult<PgConnection> {
        let mut conn = PgConnection::establish(&self.database_url)?;
        actions::ensure_schema(&mut conn).map_err(ConnectionError::CouldntSetupConfiguration)?;
        Ok(conn)
    }

    fn ping(&self, conn: &mut PgConnection) -> bool {
        diesel::sql_query("SELECT 1").execute(conn).is_ok()
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("database connection is currently unavailable")]
    Transient,
    #[error("database query failed: {0}")]
    Fatal(DbError),
}

pub type PgKeeper = ConnectionKeeper<PgConnector>;

pub struct ConnectionKeeper<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionKeeper<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C: Connector> {
    connector: C,
    slot: Mutex<Option<C::Connection>>,
    reconnecting: AtomicBool,
    retry_delay: Duration,
    connected: watch::Sender<bool>,
    fatal: mpsc::UnboundedSender<DbError>,
}

enum Outcome<T> {
    Done(T),
    Unavailable,
    Lost(DieselError),
    Failed(DieselError),
}

fn is_connection_lost(err: &DieselError) -> bool {
    matches!(err, DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _))
}

/// The command never reached the server. Either the socket is dead, which
/// counts as a loss, or a live handle refused it, which is fatal.
fn is_connection_fault(err: &DieselError) -> bool {
    matches!(err, DieselError::DatabaseError(DatabaseErrorKind::UnableToSendCommand, _))
}

impl<C: Connector> Inner<C> {
    fn run<T, F>(&self, f: F) -> Outcome<T>
    where
        F: FnOnce(&mut C::Connection) -> QueryResult<T>,
    {
        let mut slot = self.slot.blocking_lock();
        let Some(conn) = slot.as_mut() else {
            return Outcome::Unavailable;
        };
        match f(&mut *conn) {
            Ok(value) => Outcome::Done(value),
            Err(e) if is_connection_lost(&e) || (is_connection_fault(&e) && !self.connector.ping(conn)) => {
                *slot = None;
                self.connected.send_replace(false);
                Outcome::Lost(e)
            }
            Err(e) => Outcome::Failed(e),
        }
    }
}

impl<C: Connector> ConnectionKeeper<C> {
    /// Creates the keeper and starts connecting in the background.
    ///
    /// The returned receiver yields connection-level errors that the process
    /// must not survive. Must be called from within a tokio runtime.
    pub fn start(connector: C, retry_delay: Duration) -> (Self, mpsc::UnboundedReceiver<DbError>) {
        let (fatal, fatal_rx) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);
        let keeper = Self {
            inner: Arc::new(Inner {
                connector,
                slot: Mutex::new(None),
                reconnecting: AtomicBool::new(false),
                retry_delay,
                connected,
                fatal,
            }),
        };
        keeper.spawn_reconnect();
        (keeper, fatal_rx)
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// Resolves once a connection is live.
    pub async fn wait_connected(&self) {
        let mut rx = self.inner.connected.subscribe();
        // The sender lives in `inner`, so the channel cannot close under us.
        let _ = rx.wait_for(|up| *up).await;
    }

    /// Runs `f` against the live connection.
    pub async fn query<T, F>(&self, f: F) -> Result<T, QueryError>
    where
        F: FnOnce(&mut C::Connection) -> QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_connected() {
            return Err(QueryError::Transient);
        }

        let inner = Arc::clone(&self.inner);
        let outcome = tokio::task::spawn_blocking(move || inner.run(f))
            .await
            .map_err(|e| QueryError::Fatal(Box::new(e)))?;

        match outcome {
            Outcome::Done(value) => Ok(value),
            Outcome::Unavailable => Err(QueryError::Transient),
            Outcome::Lost(e) => {
                warn!("database connection lost: {}", e);
                self.spawn_reconnect();
                Err(QueryError::Transient)
            }
            Outcome::Failed(e) => {
                // Faults reaching here came from a handle that still answers.
                if is_connection_fault(&e) {
                    error!("fatal database connection error: {}", e);
                    let _ = self.inner.fatal.send(e.to_string().into());
                } else {
                    error!("database query failed: {:?}", e);
                }
                Err(QueryError::Fatal(Box::new(e)))
            }
        }
    }

    /// Signals that the transport reported the connection as gone.
    pub async fn connection_lost(&self) {
        let mut slot = self.inner.slot.lock().await;
        if slot.take().is_some() {
            warn!("database connection lost, discarding handle");
        }
        self.inner.connected.send_replace(false);
        drop(slot);
        self.spawn_reconnect();
    }

    fn spawn_reconnect(&self) {
        if self.inner.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let attempt = Arc::clone(&inner);
                match tokio::task::spawn_blocking(move || attempt.connector.connect()).await {
                    Ok(Ok(conn)) => {
                        let mut slot = inner.slot.lock().await;
                        *slot = Some(conn);
                        inner.reconnecting.store(false, Ordering::Release);
                        inner.connected.send_replace(true);
                        info!("connected to database");
                        return;
                    }
                    Ok(Err(e)) => {
                        error!("error when connecting to db: {}, retrying in {:?}", e, inner.retry_delay);
                    }
                    Err(e) => {
                        error!("database connect task failed: {}, retrying in {:?}", e, inner.retry_delay);
                    }
                }
                tokio::time::sleep(inner.retry_delay).await;
            }
        });
    }
}
