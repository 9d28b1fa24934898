//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use signup::auth::AdminAuth;
use signup::events::WindowEventPublisher;
use signup::keeper::QueryError;
use signup::mailer::{MailError, Mailer};
use signup::models::{Language, NewParticipant, Participant, ParticipantSummary};
use signup::routes;
use signup::schedule::WindowSchedule;
use signup::store::{ParticipantRepository, RegistrationStore};
use signup::validation::Submission;

#[derive(Debug, Clone, Copy)]
pub enum FailMode {
    Transient,
    Fatal,
}

/// In-memory participant table with serial ids.
#[derive(Default)]
pub struct MemoryRepository {
    rows: Mutex<Vec<Participant>>,
    failure: Mutex<Option<FailMode>>,
}

impl MemoryRepository {
    pub fn fail_with(&self, mode: Option<FailMode>) {
        *self.failure.lock().unwrap() = mode;
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), QueryError> {
        match *self.failure.lock().unwrap() {
            Some(FailMode::Transient) => Err(QueryError::Transient),
            Some(FailMode::Fatal) => Err(QueryError::Fatal("relation \"participants\" is corrupt".into())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ParticipantRepository for MemoryRepository {
    async fn insert(&self, new: NewParticipant) -> Result<Participant, QueryError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let stored = Participant {
            id: rows.len() as i32 + 1,
            firstname: new.firstname,
            lastname: new.lastname,
            email: new.email,
            diet: new.diet,
            alcohol: new.alcohol,
            table_group: new.table_group,
            avec: new.avec,
            organisation: new.organisation,
            gift: new.gift,
            invited: new.invited,
            alumni: new.alumni,
            sillis: new.sillis,
            created_at: Utc::now(),
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn count(&self) -> Result<i64, QueryError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn list(&self) -> Result<Vec<ParticipantSummary>, QueryError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().iter().map(ParticipantSummary::from).collect())
    }

    async fn all(&self) -> Result<Vec<Participant>, QueryError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().clone())
    }
}

/// Records every confirmation attempt; optionally fails them.
#[derive(Default)]
pub struct RecordingMailer {
    attempts: Mutex<Vec<(i32, Language)>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.failing.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn attempts(&self) -> Vec<(i32, Language)> {
        self.attempts.lock().unwrap().clone()
    }

    /// Polls until at least `n` attempts were made or a second passes.
    pub async fn wait_for_attempts(&self, n: usize) -> Vec<(i32, Language)> {
        for _ in 0..100 {
            if self.attempts.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.attempts()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_confirmation(&self, participant: &Participant, language: Language) -> Result<(), MailError> {
        self.attempts.lock().unwrap().push((participant.id, language));
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::NotConfigured);
        }
        Ok(())
    }
}

pub fn schedule_relative_to(now: DateTime<Utc>, guest: i64, other: i64, close: i64) -> WindowSchedule {
    WindowSchedule {
        guest_open: Some(now + chrono::Duration::seconds(guest)),
        other_open: Some(now + chrono::Duration::seconds(other)),
        signup_close: Some(now + chrono::Duration::seconds(close)),
    }
}

pub fn submission_body(first: &str, invited: bool) -> Value {
    json!({
        "email": format!("{}@example.com", first.to_lowercase()),
        "firstName": first,
        "lastName": "Testinen",
        "alcohol": "yes",
        "tableGroup": "Table 4",
        "diet": "none",
        "invited": invited,
        "language": "fi"
    })
}

pub fn submission(first: &str) -> Submission {
    Submission {
        participant: NewParticipant {
            firstname: first.to_string(),
            lastname: "Testinen".to_string(),
            email: format!("{}@example.com", first.to_lowercase()),
            ..Default::default()
        },
        language: Language::En,
    }
}

/// Everything the routes need, with fakes behind the store.
pub struct TestState {
    pub repo: Arc<MemoryRepository>,
    pub mailer: Arc<RecordingMailer>,
    pub schedule: WindowSchedule,
    pub publisher: WindowEventPublisher,
    pub admin: AdminAuth,
}

impl TestState {
    pub fn new(schedule: WindowSchedule) -> Self {
        Self::with_repo(Arc::new(MemoryRepository::default()), schedule)
    }

    pub fn with_repo(repo: Arc<MemoryRepository>, schedule: WindowSchedule) -> Self {
        Self {
            repo,
            mailer: Arc::new(RecordingMailer::default()),
            schedule,
            publisher: WindowEventPublisher::new(schedule),
            admin: AdminAuth::new(Some(("board".to_string(), "hunter2".to_string())), false),
        }
    }

    pub fn store(&self) -> RegistrationStore {
        RegistrationStore::new(self.repo.clone(), self.mailer.clone())
    }

    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(self.store()))
            .app_data(web::Data::new(self.schedule))
            .app_data(web::Data::new(self.publisher.clone()))
            .app_data(web::Data::new(self.admin.clone()))
            .configure(routes::configure)
    }
}
