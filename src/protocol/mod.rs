//! Wire protocol spoken by the remote agents
//!
//! Agents have no channel back other than the body of the response that
//! triggered them, so everything they report is line-oriented text:
//!
//! - the scan agent prints one record per line (`scan`)
//! - the deploy agent prints `[OK]`/`[FAIL]` progress lines (`report`)
//!
//! Both use the same single-quoted string discipline (`quote`).
//!
//! # Example Usage
//!
//! ```ignore
//! use shipit::protocol::scan;
//!
//! let tree = scan::decode_report(&response)?;
//! println!("remote root: {}", tree.root);
//! ```

pub mod error;
pub mod quote;
pub mod report;
pub mod scan;

pub use error::ProtocolError;
pub use report::{AgentReport, ReportLine, Status};
pub use scan::{RemoteTree, ScanLine};

// vim: ts=4
