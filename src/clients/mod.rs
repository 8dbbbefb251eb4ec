//! Integration API clients.
//!
//! Every domain operation runs the same sequence: load the stored token
//! record, pass it through the refresher, then make the bearer call. A
//! 401 or 403 from the remote API despite a fresh-looking token maps to
//! `Unauthorized` and is surfaced as-is; there is no automatic
//! refresh-and-retry loop.

pub mod cases;
pub mod drive;

pub use cases::{Case, CasesClient, ClientRecord};
pub use drive::{DriveClient, Folder, UploadedFile};
