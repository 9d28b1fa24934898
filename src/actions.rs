use diesel::prelude::*;

use crate::models::{NewParticipant, Participant, ParticipantSummary};
use crate::schema::participants;

const CREATE_PARTICIPANTS: &str = "CREATE TABLE IF NOT EXISTS participants (
    id SERIAL PRIMARY KEY,
    firstname VARCHAR(50) NOT NULL,
    lastname VARCHAR(50) NOT NULL,
    email VARCHAR(255) NOT NULL,
    diet TEXT,
    alcohol BOOLEAN NOT NULL DEFAULT FALSE,
    table_group TEXT,
    avec VARCHAR(100),
    organisation VARCHAR(255),
    gift BOOLEAN NOT NULL DEFAULT FALSE,
    invited BOOLEAN NOT NULL DEFAULT FALSE,
    alumni BOOLEAN NOT NULL DEFAULT FALSE,
    sillis BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

/// Idempotent; run on every fresh connection before it is handed out.
pub fn ensure_schema(conn: &mut PgConnection) -> QueryResult<()> {
    diesel::sql_query(CREATE_PARTICIPANTS).execute(conn)?;
    Ok(())
}

pub fn insert_participant(conn: &mut PgConnection, new: &NewParticipant) -> QueryResult<Participant> {
    diesel::insert_into(participants::table)
        .values(new)
        .returning(Participant::as_returning())
        .get_result(conn)
}

pub fn count_participants(conn: &mut PgConnection) -> QueryResult<i64> {
    participants::table.count().get_result(conn)
}

pub fn list_participants(conn: &mut PgConnection) -> QueryResult<Vec<ParticipantSummary>> {
    participants::table
        .order(participants::id.asc())
        .select(ParticipantSummary::as_select())
        .load(conn)
}

pub fn all_participants(conn: &mut PgConnection) -> QueryResult<Vec<Participant>> {
    participants::table
        .order(participants::id.asc())
        .select(Participant::as_select())
        .load(conn)
}
