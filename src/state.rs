use std::sync::Arc;

use crate::calendar::CalendarSettings;
use crate::images::ImageStore;
use crate::notifications::Outbox;
use crate::services::{AttendanceService, MeetingService};
use crate::store::MeetingStore;

/// Shared state handed to every handler.
pub struct AppState {
    pub meetings: MeetingService,
    pub attendance: AttendanceService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        outbox: Arc<dyn Outbox>,
        images: Arc<dyn ImageStore>,
        calendar: CalendarSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            meetings: MeetingService::new(store.clone(), outbox.clone(), images, calendar.clone()),
            attendance: AttendanceService::new(store, outbox, calendar),
        })
    }
}
