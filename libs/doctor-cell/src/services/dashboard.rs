use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{
    Appointment, AppointmentStatus, DashboardStats, Doctor, MonthlyAppointments, WeeklyPatients,
};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const CHART_MONTHS: i32 = 6;
const CHART_WEEKS: i64 = 4;

fn same_month(date: NaiveDate, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

/// (year, month) pairs for the last `count` calendar months, oldest first,
/// ending with the month of `today`.
fn trailing_months(today: NaiveDate, count: i32) -> Vec<(i32, u32)> {
    let current = today.year() * 12 + today.month0() as i32;
    (0..count)
        .rev()
        .map(|back| {
            let index = current - back;
            (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
        })
        .collect()
}

/// Dashboard counters and chart series for one doctor's appointments.
pub fn compute_dashboard(doctor: &Doctor, appointments: &[Appointment], today: NaiveDate) -> DashboardStats {
    let total_patients = appointments
        .iter()
        .map(|a| a.pid.as_str())
        .collect::<HashSet<_>>()
        .len();

    let today_appointments = appointments.iter().filter(|a| a.scheduled_date == today).count();

    let pending_approvals = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled)
        .count();

    let completed_this_month = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Completed)
        .filter(|a| same_month(a.scheduled_date, today.year(), today.month()))
        .count();
    let monthly_revenue = completed_this_month as f64 * doctor.fee();

    let appointments_data = trailing_months(today, CHART_MONTHS)
        .into_iter()
        .map(|(year, month)| MonthlyAppointments {
            month: MONTH_NAMES[(month - 1) as usize].to_string(),
            count: appointments
                .iter()
                .filter(|a| same_month(a.scheduled_date, year, month))
                .count(),
        })
        .collect();

    let patients_data = (0..CHART_WEEKS)
        .rev()
        .map(|back| {
            let week_start = today - Duration::days(back * 7);
            let week_end = week_start + Duration::days(7);
            let patients = appointments
                .iter()
                .filter(|a| a.scheduled_date >= week_start && a.scheduled_date < week_end)
                .map(|a| a.pid.as_str())
                .collect::<HashSet<_>>()
                .len();

            WeeklyPatients {
                date: format!("Week {}", CHART_WEEKS - back),
                patients,
            }
        })
        .collect();

    DashboardStats {
        total_patients,
        today_appointments,
        pending_approvals,
        monthly_revenue,
        appointments_data,
        patients_data,
    }
}
