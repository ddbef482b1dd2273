//! Terminal chat client for OpenAI-compatible streaming completion endpoints.
//!
//! ## Layout
//!
//! - [`app`]: the session state machine. Sole owner of conversation history
//!   and transcript; enforces single-flight streaming.
//! - [`runtime`]: spawns one worker thread per run and applies relayed
//!   [`provider::RunEvent`]s back onto the session.
//! - [`tui`]: ratatui render adapter and the foreground event loop.
//! - [`config`], [`instructions`], [`logging`], [`providers`]: startup wiring.
//!
//! ## Provider selection
//!
//! `CODYBOT_PROVIDER=openai` (default) streams from
//! `<base-url>/chat/completions`; `CODYBOT_PROVIDER=mock` uses a scripted
//! offline provider.
//!
//! ## Cancellation
//!
//! Every run event carries its run id and the session drops events for any
//! run other than the active one. Clearing or quitting additionally sets the
//! run's cancel flag so the in-flight request is aborted.

pub mod app;
pub mod commands;
pub mod config;
pub mod instructions;
pub mod logging;
pub mod provider;
pub mod providers;
pub mod runtime;
pub mod tui;
