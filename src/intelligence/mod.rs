//! Scoring rules over vitals, alerts and chat messages. Everything here is
//! pure; persistence and publishing live in `monitoring` and `api`.

pub mod analytics;
pub mod concerns;
pub mod emergency;
pub mod health_index;
pub mod message_risk;
pub mod risk_assessment;
pub mod trends;
pub mod vitals_analysis;
pub mod workforce;
