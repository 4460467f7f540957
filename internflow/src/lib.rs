//! InternFlow - internship supervision backend
//!
//! Students submit internships and invite supervising teachers, teachers
//! answer invitations, administrators review internships and manage users.

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod password_policy;
pub mod storage;
pub mod workflow;

#[cfg(test)]
mod test_support;
