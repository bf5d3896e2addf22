pub mod attempt;
pub mod band;
pub mod booking;
pub mod exam;
pub mod grading;
pub mod notification;
pub mod writing;

pub use attempt::{Answer, Attempt, AttemptSection, AttemptStatus, SectionStatus};
pub use band::BandMapEntry;
pub use booking::{Booking, BookingStatus};
pub use exam::{Exam, Question, QuestionKind, SectionDef, SectionType};
pub use writing::WritingSubmission;
