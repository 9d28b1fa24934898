//! Write and read paths for participant rows.

use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use thiserror::Error;

use crate::actions;
use crate::keeper::{DbError, PgKeeper, QueryError};
use crate::mailer::Mailer;
use crate::models::{NewParticipant, Participant, ParticipantSummary};
use crate::validation::Submission;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registration store is temporarily unavailable")]
    Unavailable,
    #[error("registration store failed: {0}")]
    Persistence(DbError),
}

impl From<QueryError> for StoreError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Transient => StoreError::Unavailable,
            QueryError::Fatal(e) => StoreError::Persistence(e),
        }
    }
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    async fn insert(&self, new: NewParticipant) -> Result<Participant, QueryError>;
    async fn count(&self) -> Result<i64, QueryError>;
    async fn list(&self) -> Result<Vec<ParticipantSummary>, QueryError>;
    async fn all(&self) -> Result<Vec<Participant>, QueryError>;
}

#[async_trait]
impl ParticipantRepository for PgKeeper {
    async fn insert(&self, new: NewParticipant) -> Result<Participant, QueryError> {
        self.query(move |conn| actions::insert_participant(conn, &new)).await
    }

    async fn count(&self) -> Result<i64, QueryError> {
        self.query(actions::count_participants).await
    }

    async fn list(&self) -> Result<Vec<ParticipantSummary>, QueryError> {
        self.query(actions::list_participants).await
    }

    async fn all(&self) -> Result<Vec<Participant>, QueryError> {
        self.query(actions::all_participants).await
    }
}

#[derive(Clone)]
pub struct RegistrationStore {
    repo: Arc<dyn ParticipantRepository>,
    mailer: Arc<dyn Mailer>,
}

impl RegistrationStore {
    pub fn new(repo: Arc<dyn ParticipantRepository>, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, mailer }
    }

    /// Inserts an accepted submission and kicks off the confirmation mail.
    ///
    /// The mail is sent in a detached task: its outcome is only logged and
    /// never affects the returned result. No mail goes out if the insert fails.
    pub async fn create(&self, submission: Submission) -> Result<Participant, StoreError> {
        let Submission { participant, language } = submission;

        let stored = self.repo.insert(participant).await.map_err(|e| {
            error!("database insert error: {}", e);
            StoreError::from(e)
        })?;
        info!("registered participant {}", stored.id);

        let mailer = Arc::clone(&self.mailer);
        let recipient = stored.clone();
        tokio::spawn(async move {
            match mailer.send_confirmation(&recipient, language).await {
                Ok(()) => info!("confirmation sent to participant {}", recipient.id),
                Err(e) => error!("failed to send confirmation to participant {}: {}", recipient.id, e),
            }
        });

        Ok(stored)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.repo.count().await?)
    }

    pub async fn list(&self) -> Result<Vec<ParticipantSummary>, StoreError> {
        Ok(self.repo.list().await?)
    }

    /// Every column of every row. Only reachable behind admin auth.
    pub async fn dump_all(&self) -> Result<Vec<Participant>, StoreError> {
        Ok(self.repo.all().await?)
    }
}
