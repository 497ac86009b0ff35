//! VitaLab — clinical-lab-services backend.
//!
//! User accounts, a lab-test catalog, bookings, reports with file
//! attachments and company/contact information, exposed over HTTP as a
//! JWT-authenticated REST API with role-based access control.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod storage;
