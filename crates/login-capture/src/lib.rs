//! Landing-page capture service.
//!
//! Two endpoints append visitor events to the recipient's row in the
//! per-task log table. The recipient is identified by the link itself; see
//! [`capture::parse_url_id`].

pub mod capture;
pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

pub use capture::{client_ip, parse_url_id, CaptureTarget};
pub use error::CaptureError;
pub use routes::router;
