pub mod attendance_record;
pub mod class_enrollment;
pub mod session_token;
pub mod token_redemption;

pub use attendance_record::Entity as AttendanceRecord;
pub use class_enrollment::Entity as ClassEnrollment;
pub use session_token::Entity as SessionToken;
pub use token_redemption::Entity as TokenRedemption;
