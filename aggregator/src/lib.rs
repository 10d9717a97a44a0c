//! Aggregating CSAF providers
//!
//! ## Idea
//!
//! The aggregator is pointed at a list of providers (by name and domain) and
//! periodically mirrors their advisories into a locally hosted directory tree.
//! For each provider, a [`worker::Worker`] locates the provider metadata
//! document through a chain of well-known locations (falling back to
//! `security.txt` indirection, see [`discover`]), validates it
//! ([`model::metadata::ProviderMetadata`]) and downloads the referenced
//! documents into a fresh staging directory ([`mirror`]).
//!
//! The [`process::Processor`] drives a bounded pool of such workers, publishes
//! each completed staging directory by atomically swapping a symbolic link
//! under `.well-known/csaf-aggregator`, and reconciles the published tree
//! against the current provider list by removing orphaned mirrors. A published
//! link always points at a complete mirror or does not exist at all.

pub mod config;
pub mod discover;
pub mod mirror;
pub mod model;
pub mod process;
pub mod worker;
