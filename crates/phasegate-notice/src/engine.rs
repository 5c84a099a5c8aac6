//! Notice engine trait.

use crate::error::Result;
use serde::Serialize;
use std::fmt;

/// Notices phasegate knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// An entity moved to the next phase.
    Transition,

    /// A gate review decision was recorded.
    GateReview,

    /// Progress summary of an entity.
    Progress,
}

impl NoticeKind {
    /// All kinds, in the order they are listed.
    pub const ALL: [NoticeKind; 3] = [
        NoticeKind::Transition,
        NoticeKind::GateReview,
        NoticeKind::Progress,
    ];

    /// Template name (without extension).
    pub fn template_name(&self) -> &'static str {
        match self {
            NoticeKind::Transition => "transition",
            NoticeKind::GateReview => "gate_review",
            NoticeKind::Progress => "progress",
        }
    }
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

/// Trait for rendering notices from serializable context.
///
/// # Examples
///
/// ```
/// use phasegate_notice::{NoticeContext, NoticeEngine, NoticeKind, NoticeManager};
///
/// # fn main() -> phasegate_notice::Result<()> {
/// let manager = NoticeManager::builtin()?;
/// let ctx = NoticeContext::new("CAPA-1", "Label misprint").with_progress(25);
/// let text = manager.render_notice(NoticeKind::Progress, &ctx)?;
/// assert!(text.contains("25%"));
/// # Ok(())
/// # }
/// ```
pub trait NoticeEngine {
    /// Renders `template` (name without extension) with `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not exist or rendering fails.
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String>;

    /// Renders the template for a notice kind.
    fn render_notice<T: Serialize>(&self, kind: NoticeKind, ctx: &T) -> Result<String> {
        self.render(kind.template_name(), ctx)
    }

    /// Lists available template names, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the template directory cannot be read.
    fn list_templates(&self) -> Result<Vec<String>>;
}
