//! Overlay suppression tests

mod common;

use common::FakePage;
use pretty_assertions::assert_eq;
use scrollshot::capture::{CaptureSurface, NodeId, OverlaySuppressor, Position};

#[tokio::test]
async fn test_hide_then_restore_leaves_no_trace() {
    let page = FakePage::new(800.0, 600.0, 3000.0)
        .overlay(1, Position::Fixed, 0.0, 60.0)
        .overlay(2, Position::Sticky, 100.0, 30.0);

    let hidden = OverlaySuppressor::hide(&page).await.unwrap();
    assert_eq!(hidden.nodes(), &[NodeId(1), NodeId(2)]);
    assert!(page.elements().await.unwrap().iter().all(|el| el.hidden));

    hidden.restore(&page).await.unwrap();
    assert!(page.elements().await.unwrap().iter().all(|el| !el.hidden));
    page.assert_pristine(0.0);
}

#[tokio::test]
async fn test_repeated_cycles_are_idempotent() {
    let page = FakePage::new(800.0, 600.0, 3000.0).overlay(7, Position::Fixed, 0.0, 60.0);

    for cycle in 0..5 {
        let hidden = OverlaySuppressor::hide(&page).await.unwrap();
        assert_eq!(hidden.nodes(), &[NodeId(7)], "cycle {}", cycle);
        hidden.restore(&page).await.unwrap();
        page.assert_pristine(0.0);
    }

    let elements = page.elements().await.unwrap();
    assert_eq!(elements.len(), 1);
    assert!(!elements[0].hidden);
}

#[tokio::test]
async fn test_nothing_to_hide_injects_nothing() {
    let page = FakePage::new(800.0, 600.0, 3000.0)
        .overlay(1, Position::Fixed, 700.0, 60.0)
        .overlay(2, Position::Absolute, 0.0, 60.0);

    let hidden = OverlaySuppressor::hide(&page).await.unwrap();

    assert!(hidden.is_empty());
    assert!(page.state().styles.is_empty());
    hidden.restore(&page).await.unwrap();
    page.assert_pristine(0.0);
}

#[tokio::test]
async fn test_partially_visible_overlay_is_hidden() {
    let page = FakePage::new(800.0, 600.0, 3000.0)
        .overlay(1, Position::Fixed, -40.0, 60.0)
        .overlay(2, Position::Fixed, 590.0, 60.0)
        .overlay(3, Position::Fixed, -60.0, 60.0);

    let hidden = OverlaySuppressor::hide(&page).await.unwrap();

    assert_eq!(hidden.nodes(), &[NodeId(1), NodeId(2)]);
    hidden.restore(&page).await.unwrap();
}
