use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::PrescriptionStatus;
use crate::models::{MedicineSearchResult, NewPrescription, Prescription, PrescriptionData};

use super::{timestamp_from_sql, timestamp_to_sql};

const COLUMNS: &str =
    "id, user_id, image, object_key, ocr_result, search_result, status, created_at, updated_at";

pub fn insert_prescription(conn: &Connection, prescription: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, user_id, image, object_key, ocr_result, search_result,
         status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            prescription.id.to_string(),
            prescription.user_id,
            prescription.image,
            prescription.object_key,
            serde_json::to_string(&prescription.ocr_result)?,
            prescription
                .search_result
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            prescription.status.as_str(),
            timestamp_to_sql(&prescription.created_at),
            timestamp_to_sql(&prescription.updated_at),
        ],
    )?;
    Ok(())
}

/// Save a finished scan as a new active prescription.
pub fn create_prescription(conn: &Connection, new: NewPrescription) -> Result<Prescription, DatabaseError> {
    let prescription = Prescription::create(new);
    insert_prescription(conn, &prescription)?;
    tracing::info!(
        id = %prescription.id,
        medications = prescription.ocr_result.medications.len(),
        "Prescription saved"
    );
    Ok(prescription)
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM prescriptions WHERE id = ?1"))?;

    let result = stmt.query_row(params![id.to_string()], read_row);
    match result {
        Ok(row) => Ok(Some(prescription_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All prescriptions for a user, newest first.
pub fn list_prescriptions_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM prescriptions WHERE user_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id], read_row)?;
    rows.map(|row| prescription_from_row(row?)).collect()
}

/// A user's active prescriptions, newest first.
pub fn list_active_prescriptions(conn: &Connection, user_id: &str) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM prescriptions WHERE user_id = ?1 AND status = ?2
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id, PrescriptionStatus::Active.as_str()], read_row)?;
    rows.map(|row| prescription_from_row(row?)).collect()
}

pub fn update_prescription_status(
    conn: &Connection,
    id: &Uuid,
    status: PrescriptionStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), status.as_str(), timestamp_to_sql(&Utc::now())],
    )?;
    ensure_found(changed, id)
}

/// Replace the stored OCR and search documents, e.g. after a re-analysis.
pub fn update_prescription_results(
    conn: &Connection,
    id: &Uuid,
    ocr_result: &PrescriptionData,
    search_result: Option<&MedicineSearchResult>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET ocr_result = ?2, search_result = ?3, updated_at = ?4
         WHERE id = ?1",
        params![
            id.to_string(),
            serde_json::to_string(ocr_result)?,
            search_result.map(serde_json::to_string).transpose()?,
            timestamp_to_sql(&Utc::now()),
        ],
    )?;
    ensure_found(changed, id)
}

pub fn delete_prescription(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM prescriptions WHERE id = ?1", params![id.to_string()])?;
    ensure_found(deleted, id)
}

fn ensure_found(changed: usize, id: &Uuid) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Prescription".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct PrescriptionRow {
    id: String,
    user_id: String,
    image: String,
    object_key: String,
    ocr_result: String,
    search_result: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        image: row.get(2)?,
        object_key: row.get(3)?,
        ocr_result: row.get(4)?,
        search_result: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    Ok(Prescription {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id: row.user_id,
        image: row.image,
        object_key: row.object_key,
        ocr_result: serde_json::from_str(&row.ocr_result)?,
        search_result: row
            .search_result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        status: PrescriptionStatus::from_str(&row.status)?,
        created_at: timestamp_from_sql(&row.created_at)?,
        updated_at: timestamp_from_sql(&row.updated_at)?,
    })
}
