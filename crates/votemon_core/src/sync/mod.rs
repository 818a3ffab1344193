//! Remote sync support.
//!
//! The transport itself lives outside core; this module only prepares what
//! must be uploaded and records confirmed uploads.

pub mod outbox;
