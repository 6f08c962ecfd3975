//! `mailquery`: mailbox search, query language, compilation to operation
//! trees, paging and typed hit dispatch.
//!
//! This crate provides the core library for parsing search queries,
//! binding them to a [`mailbox::Mailbox`], and rendering paged results.

pub mod config;
pub mod error;
pub mod index;
pub mod mailbox;
pub mod model;
pub mod query;
pub mod search;
