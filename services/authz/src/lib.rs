//! Keyward authorization service library crate.
//!
//! # Purpose
//! Relation store, authorization backend adapter, relation service, resource
//! authorization facade and the HTTP surface, exposed for the binary and tests.
//!
//! # Notes
//! Layers depend downward only: `api` -> `resource` -> `relation` ->
//! `store`/`backend`/`activity`/`context`.
pub mod activity;
pub mod api;
pub mod app;
pub mod backend;
pub mod config;
pub mod context;
pub mod observability;
pub mod reconcile;
pub mod relation;
pub mod resource;
pub mod store;
