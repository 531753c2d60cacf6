pub mod m202608270001_create_session_tokens;
pub mod m202608270002_create_attendance_records;
pub mod m202608270003_create_class_enrollments;
