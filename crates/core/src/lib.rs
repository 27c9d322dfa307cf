//! Core of the Teach.it study companion.
//!
//! Each module is one step of the learning flow (upload, topic choice,
//! teaching session, evaluation) or the notes vault beside it. Steps talk to
//! the backend only through [`service::TutorService`] and hand each other a
//! [`flow::Route`] rather than sharing state.

pub mod error;
pub mod evaluation;
pub mod flow;
pub mod models;
pub mod offline;
pub mod render;
pub mod resource;
pub mod service;
pub mod session;
pub mod study;
pub mod topics;
pub mod upload;
pub mod vault;

pub use error::{ClientError, Result};
pub use flow::{EvaluationHandoff, Route};
pub use service::TutorService;
