use chrono::NaiveDate;

use crate::models::{AppointmentBoard, AppointmentStatus, BoardAppointment};

/// Sorts appointments into the board columns. A scheduled appointment for
/// today appears both under `pending` and `today`.
pub fn categorize(appointments: Vec<BoardAppointment>, today: NaiveDate) -> AppointmentBoard {
    let mut board = AppointmentBoard::default();

    for entry in appointments {
        let status = entry.appointment.status;
        let is_today = entry.appointment.scheduled_date == today;

        if is_today
            && matches!(
                status,
                AppointmentStatus::Scheduled | AppointmentStatus::Confirmed | AppointmentStatus::InProgress
            )
        {
            board.today.push(entry.clone());
        }

        match status {
            AppointmentStatus::Scheduled => board.pending.push(entry),
            AppointmentStatus::Confirmed if !is_today => board.confirmed.push(entry),
            AppointmentStatus::Completed => board.completed.push(entry),
            AppointmentStatus::Cancelled => board.cancelled.push(entry),
            _ => {}
        }
    }

    board
}
