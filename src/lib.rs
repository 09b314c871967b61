//! potrans - Batch translation of gettext catalogs
//!
//! Collects untranslated PO/POT entries, sends them in numbered batches to
//! an OpenAI-compatible chat-completion API for Traditional Chinese
//! translation, and writes the results back with a checkpoint after every
//! batch.

pub mod batch;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod translate;
pub mod workflow;
