pub mod contact;
pub mod resume;
pub mod send_attempt;

pub use contact::{Contact, ContactStats, ContactStatus, NewContact};
pub use resume::{Resume, ResumeInfo};
pub use send_attempt::{SendAttempt, SendOutcome};
