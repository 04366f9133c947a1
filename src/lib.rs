//! mergeguard — a merge-action guard engine for Bitbucket-style code hosts.
//!
//! Intercepts the merge action on pull-request pages and checks the
//! destination branch against per-repository policy before letting it
//! proceed. The host (a browser-extension runtime or a test harness) mirrors
//! page structure into [`page::PageModel`] snapshots and drives
//! [`guard::GuardController`] with mutation and action events; everything
//! upstream of the user's click fails open.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attribute;
pub mod commands;
pub mod config;
pub mod context;
pub mod guard;
pub mod logging;
pub mod page;
pub mod policy;
pub mod remote;
pub mod resolver;
pub mod settings;
pub mod verdict;
pub mod watcher;
