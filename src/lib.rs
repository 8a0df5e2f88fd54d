//! Core library for the roster-tools command line application.
//!
//! One run downloads the member roster export from the portal, compares it
//! with the member ledger spreadsheet, appends the members the ledger has not
//! seen yet and posts a summary notification. The browser-driven export lives
//! under [`roster::tools::export`], the spreadsheet, credential and
//! notification adapters under [`roster::tools::io`], the dedup logic in
//! [`roster::tools::reconcile`], and the run sequencing in
//! [`roster::tools::pipeline`].

pub mod roster;

pub use roster::tools::{
    Result, ToolError, config, error, export, io, model, pipeline, poll, reconcile,
};
