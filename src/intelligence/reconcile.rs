//! Aligns OCR medicine lines with enrichment records.
//!
//! Pass one assigns each original line, in order, the first unused record
//! whose name contains or is contained by the line's name. Pass two gives
//! each still-unmatched line the record at its own position, if that record
//! is unused. Anything left gets a `not_found` placeholder. A record is
//! never assigned twice, so output length always equals input length.

use crate::models::{CombinedMedicine, MedicalInfo, MedicineInput};

use super::matching::{normalize, normalized_match};

pub fn reconcile(original: &[MedicineInput], enriched: &[MedicalInfo]) -> Vec<CombinedMedicine> {
    let enriched_names: Vec<String> = enriched.iter().map(|e| normalize(&e.name)).collect();
    let mut used = vec![false; enriched.len()];
    let mut assigned: Vec<Option<usize>> = vec![None; original.len()];

    for (i, medicine) in original.iter().enumerate() {
        let name = normalize(&medicine.name);
        if let Some(j) = (0..enriched.len()).find(|&j| !used[j] && normalized_match(&name, &enriched_names[j])) {
            used[j] = true;
            assigned[i] = Some(j);
        }
    }

    for (i, slot) in assigned.iter_mut().enumerate() {
        if slot.is_none() && i < enriched.len() && !used[i] {
            used[i] = true;
            *slot = Some(i);
            tracing::debug!(
                original = %original[i].name,
                enriched = %enriched[i].name,
                position = i,
                "Reconciled by position"
            );
        }
    }

    original
        .iter()
        .zip(assigned)
        .map(|(medicine, slot)| CombinedMedicine {
            prescription: medicine.clone(),
            medical_info: match slot {
                Some(j) => enriched[j].clone(),
                None => MedicalInfo::not_found(&medicine.name),
            },
        })
        .collect()
}
