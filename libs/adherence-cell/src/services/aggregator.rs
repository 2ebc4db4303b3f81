use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{
    AdherenceRecord, AdherenceSummary, DailyAdherence, DoseStatus, MedicineAdherence,
};

pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Percentage rounded to one decimal place; 0 when there is nothing to divide by.
pub fn adherence_rate(taken: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = taken as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// Builds the adherence summary for one prescription's dose records.
///
/// Groups keep the order in which they first appear in `records`; callers
/// wanting chronological daily rows must pass records sorted by
/// `scheduled_date`.
pub fn summarize(records: &[AdherenceRecord]) -> AdherenceSummary {
    if records.is_empty() {
        return AdherenceSummary::default();
    }

    let total = records.len();
    let mut taken = 0;
    let mut skipped = 0;

    let mut daily: Vec<DailyAdherence> = Vec::new();
    let mut daily_index: HashMap<NaiveDate, usize> = HashMap::new();

    let mut medicines: Vec<MedicineAdherence> = Vec::new();
    let mut medicine_index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let status = record.status();

        let day_slot = *daily_index.entry(record.scheduled_date).or_insert_with(|| {
            daily.push(DailyAdherence {
                date: record.scheduled_date,
                ..Default::default()
            });
            daily.len() - 1
        });
        let day = &mut daily[day_slot];

        let med_slot = *medicine_index
            .entry(record.medicine_name.as_str())
            .or_insert_with(|| {
                medicines.push(MedicineAdherence {
                    medicine_name: record.medicine_name.clone(),
                    ..Default::default()
                });
                medicines.len() - 1
            });
        let medicine = &mut medicines[med_slot];
        medicine.total += 1;

        match status {
            DoseStatus::Taken => {
                taken += 1;
                day.taken += 1;
                medicine.taken += 1;
            }
            DoseStatus::Skipped => {
                skipped += 1;
                day.skipped += 1;
                medicine.skipped += 1;
            }
            DoseStatus::Pending => {
                day.pending += 1;
                medicine.pending += 1;
            }
        }
    }

    for medicine in &mut medicines {
        medicine.adherence_rate = adherence_rate(medicine.taken, medicine.total);
    }

    AdherenceSummary {
        total_doses: total,
        taken,
        skipped,
        pending: total - taken - skipped,
        adherence_rate: adherence_rate(taken, total),
        daily_breakdown: daily,
        medicine_breakdown: medicines,
        recent_activity: recent_activity(records),
        patient: None,
    }
}

/// The latest taken-or-skipped doses, newest first.
pub fn recent_activity(records: &[AdherenceRecord]) -> Vec<AdherenceRecord> {
    let mut acted: Vec<&AdherenceRecord> = records
        .iter()
        .filter(|r| r.status() != DoseStatus::Pending)
        .collect();

    // Stable, so ties keep their input order.
    acted.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));

    acted
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .cloned()
        .collect()
}

/// One-line description used when prompting for a new prescription.
pub fn describe(summary: &AdherenceSummary) -> String {
    if summary.total_doses == 0 {
        return "No adherence data available".to_string();
    }

    let percent = (summary.taken as f64 / summary.total_doses as f64 * 100.0).round() as u32;
    format!(
        "Adherence Rate: {}% ({}/{} doses taken, {} skipped)",
        percent, summary.taken, summary.total_doses, summary.skipped
    )
}
