use chrono::Utc;
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::HealthProfile;

use super::timestamp_to_sql;

/// Store the user's profile, replacing any previous one.
pub fn save_health_profile(conn: &Connection, user_id: &str, profile: &HealthProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_profiles (user_id, profile, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET profile = excluded.profile, updated_at = excluded.updated_at",
        params![user_id, serde_json::to_string(profile)?, timestamp_to_sql(&Utc::now())],
    )?;
    tracing::debug!(items = profile.item_count(), "Health profile saved");
    Ok(())
}

pub fn get_health_profile(conn: &Connection, user_id: &str) -> Result<Option<HealthProfile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT profile FROM health_profiles WHERE user_id = ?1",
        params![user_id],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
