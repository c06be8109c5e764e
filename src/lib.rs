//! `livecoord` - Live coordination engine
//!
//! Drives a crisis-playbook activation demonstration: a roster of
//! stakeholders acknowledges over a target window, a phase machine tracks
//! progress and a scripted task timeline advances. Acknowledgments arrive
//! from a live event channel when one exists, and a fallback simulator
//! guarantees the run completes when it does not.

pub mod activation;
pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod observability;
pub mod scenarios;
pub mod session;
pub mod transport;
