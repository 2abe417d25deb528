//! Sapgate - SAP Business One SQL gateway
//!
//! This crate exposes Business One relational data over HTTP through:
//! - An ad-hoc read-only SQL proxy against caller-specified databases
//! - A cross-table document listing that unions the five marketing
//!   document header tables with dialect-specific SQL (MSSQL / HANA)
//! - Driver-value normalization into JSON-safe rows

pub mod config;
pub mod db;
pub mod documents;
pub mod proxy;
pub mod query_guard;
pub mod sap_query_generator;
pub mod server;
