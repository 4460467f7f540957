pub mod internship;
pub mod jury;
pub mod report;
pub mod role;
pub mod soutenance;
pub mod teacher_invitation;
pub mod user;
