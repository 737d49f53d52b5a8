pub mod contacts;
pub mod resumes;
pub mod send_attempts;
