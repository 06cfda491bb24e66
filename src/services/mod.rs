pub mod attendance;
pub mod export;
pub mod filter;
pub mod meetings;

pub use attendance::AttendanceService;
pub use filter::{MeetingFilter, MeetingsQuery, TimeFilter, TimeWindow};
pub use meetings::MeetingService;

use crate::models::Booking;
use crate::store::MeetingStore;
use crate::utils::error::Result;

/// Attendances of `mid` joined with the users' profiles. Attendees without
/// a profile keep `user: None`.
pub(crate) async fn bookings(store: &dyn MeetingStore, mid: i64) -> Result<Vec<Booking>> {
    let attendances = store.attendances(mid).await?;
    let usernames: Vec<String> = attendances.iter().map(|a| a.username.clone()).collect();
    let users = store.find_users(&usernames).await?;

    Ok(attendances
        .into_iter()
        .map(|attendance| {
            let user = users
                .iter()
                .find(|u| u.username == attendance.username)
                .cloned();
            Booking { attendance, user }
        })
        .collect())
}
