use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PrescriptionStatus;
use super::ocr::PrescriptionData;
use super::search::MedicineSearchResult;

/// A saved scan. OCR and search results are stored as uninterpreted blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    #[serde(rename = "$id")]
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub image: String,
    pub object_key: String,
    #[serde(rename = "ocrResult")]
    pub ocr_result: PrescriptionData,
    #[serde(rename = "searchResult")]
    pub search_result: Option<MedicineSearchResult>,
    pub status: PrescriptionStatus,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the caller when saving a new scan.
#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub user_id: String,
    pub image: String,
    pub object_key: String,
    pub ocr_result: PrescriptionData,
    pub search_result: Option<MedicineSearchResult>,
}

impl Prescription {
    pub fn create(new: NewPrescription) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            image: new.image,
            object_key: new.object_key,
            ocr_result: new.ocr_result,
            search_result: new.search_result,
            status: PrescriptionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_prescription_starts_active() {
        let p = Prescription::create(NewPrescription {
            user_id: "user-1".into(),
            image: "file:///scan.jpg".into(),
            object_key: "scans/1.jpg".into(),
            ocr_result: PrescriptionData::default(),
            search_result: None,
        });
        assert_eq!(p.status, PrescriptionStatus::Active);
        assert_eq!(p.created_at, p.updated_at);

        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["$id"], p.id.to_string());
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["status"], "active");
    }
}
