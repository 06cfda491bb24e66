pub mod attendance;
pub mod comment;
pub mod meeting;
pub mod user;

pub use attendance::{AttendRequest, Attendance, Booking};
pub use comment::{Comment, NewComment};
pub use meeting::{CourseOrEvent, Meeting, MeetingDraft, MeetingPatch};
pub use user::User;
