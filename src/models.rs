use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::participants;

/// Seats available for the event. Reported by `/spots`, never enforced.
pub const MAX_SPOTS: i64 = 150;

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Participant {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub diet: Option<String>,
    pub alcohol: bool,
    #[serde(rename = "tableGroup")]
    pub table_group: Option<String>,
    pub avec: Option<String>,
    pub organisation: Option<String>,
    pub gift: bool,
    pub invited: bool,
    pub alumni: bool,
    /// Also attends the morning-after sillis brunch.
    pub sillis: bool,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A validated submission, ready to be inserted. Identity and timestamp are
/// assigned by the database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Insertable, Serialize)]
#[diesel(table_name = participants)]
pub struct NewParticipant {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub diet: Option<String>,
    pub alcohol: bool,
    #[serde(rename = "tableGroup")]
    pub table_group: Option<String>,
    pub avec: Option<String>,
    pub organisation: Option<String>,
    pub gift: bool,
    pub invited: bool,
    pub alumni: bool,
    pub sillis: bool,
}

/// Public guest-list projection.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ParticipantSummary {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    #[serde(rename = "tableGroup")]
    pub table_group: Option<String>,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            firstname: p.firstname.clone(),
            lastname: p.lastname.clone(),
            table_group: p.table_group.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotsResponse {
    #[serde(rename = "maxSpots")]
    pub max_spots: i64,
    #[serde(rename = "usedSpots")]
    pub used_spots: i64,
}

/// Language of the confirmation mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fi,
    #[default]
    En,
}

impl Language {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("fi") => Language::Fi,
            _ => Language::En,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Res {
    pub message: String,
}
