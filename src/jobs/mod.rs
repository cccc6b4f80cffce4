//! Asynchronous export jobs.
//!
//! An export is submitted once, polled until the server reports a terminal
//! state, and then read back chunk by chunk. [`ExportPoller`] exposes each
//! step; [`ExportCursor`] turns the whole workflow into a page source so the
//! chunks can be consumed through a [`Paginator`](crate::Paginator).

mod backend;
mod cursor;
mod poller;
mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ExportKind, ExportRequest, ExportsApi, JobBackend};
pub use cursor::ExportCursor;
pub use poller::{ExportPoller, PollerOptions, DEFAULT_POLL_INTERVAL};
pub use status::{ExportState, ExportStatus, JobPhase};
