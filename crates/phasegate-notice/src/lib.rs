//! Notice rendering for phasegate.
//!
//! Turns transition, gate review and progress data into short text notices
//! with minijinja templates. The crate only renders; delivering notices is
//! left to the caller.
//!
//! # Examples
//!
//! ```
//! use phasegate_notice::{NoticeContext, NoticeEngine, NoticeKind, NoticeManager};
//!
//! let manager = NoticeManager::builtin()?;
//! let ctx = NoticeContext::new("CAPA-1", "Label misprint")
//!     .with_phases("CORRECTION", "ROOT_CAUSE_ANALYSIS")
//!     .with_actor("eng-1")
//!     .with_progress(25);
//!
//! let notice = manager.render_notice(NoticeKind::Transition, &ctx)?;
//! assert!(notice.contains("moved from CORRECTION to ROOT_CAUSE_ANALYSIS"));
//! # Ok::<(), phasegate_notice::NoticeError>(())
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod manager;

// Re-export public types for convenience
pub use context::{NoticeContext, PhaseLine};
pub use engine::{NoticeEngine, NoticeKind};
pub use error::{NoticeError, Result};
pub use manager::NoticeManager;
