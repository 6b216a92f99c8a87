//! Surveus Survey Pipeline Library
//!
//! This library provides the core functionality for the Surveus survey
//! lifecycle pipeline: eligibility decisioning, personalized question-set
//! generation, external form provisioning, per-customer survey accounting,
//! gated notification, and response collection.
//!
//! # Modules
//!
//! - `collector`: Response collection and normalization.
//! - `config`: Configuration management.
//! - `content`: Content Generation Service client.
//! - `db`: Database connection and pool management.
//! - `eligibility`: Deterministic survey eligibility rules.
//! - `errors`: Error handling types.
//! - `forms_client`: Form Provisioning Service client.
//! - `ledger`: Per-customer survey ledger.
//! - `models`: Core data models.
//! - `notifier`: Notification delivery and mail composition.
//! - `provisioner`: Form provisioning orchestration.
//! - `runner`: Batch runner and per-item outcome reporting.
//! - `storage`: Survey and response storage operations.

pub mod collector;
pub mod config;
pub mod content;
pub mod db;
pub mod eligibility;
pub mod errors;
pub mod forms_client;
pub mod ledger;
pub mod models;
pub mod notifier;
pub mod provisioner;
pub mod runner;
pub mod storage;
