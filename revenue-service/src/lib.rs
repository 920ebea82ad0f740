//! Revenue Service - URSSAF month computation and monthly revenue
//! reconciliation over linked billing/commerce providers.
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
