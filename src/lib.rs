//! Storage resolution for the wedding site: remote datastore first, HTTP
//! gateway where the deployment requires it, local JSON cache when neither
//! answers.

pub mod access;
pub mod config;
pub mod deployment;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod payload;
pub mod routes;
pub mod services;
pub mod storage;
pub mod validation;
