//! Integration tests for notice rendering from user template directories.

use phasegate_notice::{NoticeContext, NoticeEngine, NoticeError, NoticeKind, NoticeManager};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_from_dir_without_directory_uses_builtin() {
    let manager = NoticeManager::from_dir(None).unwrap();
    assert!(manager.templates_dir.is_none());

    let ctx = NoticeContext::new("CAPA-3", "Burr on housing")
        .with_phase("CORRECTION")
        .with_decision("pending");
    let text = manager.render_notice(NoticeKind::GateReview, &ctx).unwrap();
    assert!(text.contains("Awaiting reviewer decision."));
}

#[test]
fn test_user_template_sees_all_context_fields() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("transition.j2"),
        "{{ entity_id }}|{{ from_phase }}|{{ to_phase }}|{{ acting_user }}|{{ timestamp }}|{{ overall_progress }}",
    )
    .unwrap();

    let manager = NoticeManager::from_dir(Some(temp_dir.path().to_path_buf())).unwrap();
    let ctx = NoticeContext::new("DP-9", "Stent")
        .with_phases("VERIFICATION", "VALIDATION")
        .with_actor("pat")
        .with_timestamp("2024-05-01T10:00:00Z")
        .with_progress(67);

    assert_eq!(
        manager.render_notice(NoticeKind::Transition, &ctx).unwrap(),
        "DP-9|VERIFICATION|VALIDATION|pat|2024-05-01T10:00:00Z|67"
    );
}

#[test]
fn test_broken_user_template_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("progress.j2"), "{% if %}").unwrap();

    let manager = NoticeManager::new(temp_dir.path().to_path_buf()).unwrap();
    let result = manager.render_notice(NoticeKind::Progress, &NoticeContext::default());
    assert!(matches!(result, Err(NoticeError::TemplateNotFound(_))));
}

#[test]
fn test_missing_directory_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let result = NoticeManager::from_dir(Some(temp_dir.path().join("missing")));
    assert!(matches!(result, Err(NoticeError::TemplateDirectoryNotFound(_))));
}
