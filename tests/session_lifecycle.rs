//! Session manager lifecycle: single live session, staleness, disposal order.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use glam::{Vec2, Vec3};

use common::*;
use monospec::session::{
    AssetSession, CameraView, FrameRequest, GizmoAction, ModelSession, ModelState, MountNode, MountSurface, PointerButton,
    SequenceSession, SurfaceEvent, SurfaceSize,
};
use monospec::catalog::MAX_SEQUENCE_FRAMES;
use monospec::token::Generation;

const ZERO: Duration = Duration::ZERO;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn near(a: Vec3, b: Vec3) -> bool {
    a.distance(b) < 1e-3
}

#[test]
fn test_at_most_one_live_session() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    let generation = m.generation().clone();

    for id in ["CUBE", "RED", "CLIP", "SPIN", "CUBE", "ODD", "RED", "SPIN"] {
        m.show(&item(&catalog, id), generation.issue());
        assert!(h.counter.live() <= 1);
        m.tick(ZERO);
    }
    assert_eq!(h.counter.live(), 1);
    assert_eq!(h.counter.started_kinds(), vec!["stl", "img", "webm", "pngseq", "stl", "img", "pngseq"]);

    m.teardown();
    assert_eq!(h.counter.live(), 0);
    assert_eq!(m.mount().node_count(), 0);
    assert_eq!(m.mount().listener_count(), 0);
    assert!(m.active_kind().is_none());
}

#[test]
fn test_model_ready_renders_iso_once() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    let token = m.generation().issue();

    m.show(&item(&catalog, "CUBE"), token);
    assert!(matches!(m.mount().nodes().last(), Some(MountNode::Loading { .. })));
    assert!(pump(&mut m, ZERO, has_viewport));

    assert_eq!(h.rec.log(), vec!["create 400x300", "upload", "material", "lights", "render"]);
    assert!(near(h.rec.last_eye().unwrap(), Vec3::new(0.4, 0.55, 1.0) * 18.0));
    assert!(m.mount().nodes().any(|n| matches!(n, MountNode::Gizmo { wireframe: false })));
    assert!(!m.mount().nodes().any(|n| matches!(n, MountNode::Loading { .. })));

    // Idle: ticking does not render again.
    assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    assert_eq!(h.rec.renders(), 1);
    assert_eq!(h.kit.init_count(), 1);
}

#[test]
fn test_preset_views() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    m.show(&item(&catalog, "FAR"), m.generation().issue());
    assert!(pump(&mut m, ZERO, has_viewport));

    // The model is recentred, so presets orbit the origin at 1.8x its size.
    m.dispatch(SurfaceEvent::Gizmo(GizmoAction::View(CameraView::Top)));
    assert!(near(h.rec.last_eye().unwrap(), Vec3::new(0.0, 18.0, 0.0)));
    m.dispatch(SurfaceEvent::Gizmo(GizmoAction::View(CameraView::Left)));
    assert!(near(h.rec.last_eye().unwrap(), Vec3::new(-18.0, 0.0, 0.0)));
    m.dispatch(SurfaceEvent::Gizmo(GizmoAction::View(CameraView::Back)));
    assert!(near(h.rec.last_eye().unwrap(), Vec3::new(0.0, 0.0, -18.0)));
    assert_eq!(h.rec.renders(), 4);

    m.dispatch(SurfaceEvent::Gizmo(GizmoAction::Wireframe));
    assert_eq!(h.rec.count("material wire"), 1);
    assert_eq!(h.rec.renders(), 5);
    assert!(m.mount().nodes().any(|n| matches!(n, MountNode::Gizmo { wireframe: true })));
}

#[test]
fn test_wheel_renders_on_demand() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    // Not routed before the model is ready.
    assert_eq!(m.dispatch(SurfaceEvent::Wheel { delta: 120.0 }), FrameRequest::Idle);
    assert!(pump(&mut m, ZERO, has_viewport));
    let base = h.rec.renders();

    assert_eq!(m.dispatch(SurfaceEvent::Wheel { delta: 120.0 }), FrameRequest::Animate);
    assert_eq!(h.rec.renders(), base + 1);
    assert!(h.rec.last_eye().unwrap().length() > 18.0 * 1.0001);

    assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    assert_eq!(h.rec.renders(), base + 2);
    for _ in 0..5 {
        assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    }
    assert_eq!(h.rec.renders(), base + 2);
}

#[test]
fn test_drag_loop_runs_only_while_interacting() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    assert!(pump(&mut m, ZERO, has_viewport));
    let base = h.rec.renders();

    let down = SurfaceEvent::PointerDown { button: PointerButton::Primary, pos: Vec2::new(200.0, 150.0) };
    assert_eq!(m.dispatch(down), FrameRequest::Animate);
    assert_eq!(h.rec.renders(), base);
    m.dispatch(SurfaceEvent::PointerMove { pos: Vec2::new(260.0, 150.0) });

    assert_eq!(m.tick(ZERO), FrameRequest::Animate);
    assert_eq!(m.tick(ZERO), FrameRequest::Animate);
    assert_eq!(h.rec.renders(), base + 2);

    m.dispatch(SurfaceEvent::PointerUp { button: PointerButton::Primary });
    assert_eq!(h.rec.renders(), base + 3);
    assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    assert_eq!(h.rec.renders(), base + 4);
}

#[test]
fn test_wheel_during_drag_keeps_loop_running() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    assert!(pump(&mut m, ZERO, has_viewport));
    let base = h.rec.renders();

    let down = SurfaceEvent::PointerDown { button: PointerButton::Primary, pos: Vec2::new(200.0, 150.0) };
    assert_eq!(m.dispatch(down), FrameRequest::Animate);
    assert_eq!(m.tick(ZERO), FrameRequest::Animate);

    // The wheel folds into the running drag instead of ending it.
    assert_eq!(m.dispatch(SurfaceEvent::Wheel { delta: 10.0 }), FrameRequest::Animate);
    assert_eq!(m.tick(ZERO), FrameRequest::Animate);
    assert_eq!(h.rec.renders(), base + 2);

    for x in [220.0, 240.0, 260.0] {
        m.dispatch(SurfaceEvent::PointerMove { pos: Vec2::new(x, 150.0) });
        assert_eq!(m.tick(ZERO), FrameRequest::Animate);
    }
    assert_eq!(h.rec.renders(), base + 5);

    m.dispatch(SurfaceEvent::PointerUp { button: PointerButton::Primary });
    assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    assert_eq!(h.rec.renders(), base + 7);
}

#[test]
fn test_resize_reaches_renderer() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    m.set_pixel_ratio(2.0);
    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    assert!(pump(&mut m, ZERO, has_viewport));
    assert_eq!(h.rec.log()[0], "create 800x600");

    let base = h.rec.renders();
    m.dispatch(SurfaceEvent::Resize { size: SurfaceSize::new(500, 250) });
    assert!(h.rec.log().contains(&"resize 1000x500".to_string()));
    assert_eq!(h.rec.renders(), base + 1);

    // Same size again is not forwarded.
    assert_eq!(m.dispatch(SurfaceEvent::Resize { size: SurfaceSize::new(500, 250) }), FrameRequest::Idle);
    assert_eq!(h.rec.renders(), base + 1);
}

#[test]
fn test_model_disposal_order() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    assert!(pump(&mut m, ZERO, has_viewport));
    assert_eq!(m.mount().listener_count(), 4);

    m.show(&item(&catalog, "RED"), m.generation().issue());
    let log = h.rec.log();
    assert_eq!(&log[log.len() - 3..], ["release_geometry", "release_material", "release_surface"]);
    assert_eq!(m.mount().listener_count(), 0);
    assert!(m.mount().viewport().is_none());
    assert!(!m.mount().nodes().any(|n| matches!(n, MountNode::Gizmo { .. })));
    assert_eq!(m.dispatch(SurfaceEvent::Wheel { delta: 1.0 }), FrameRequest::Idle);
}

#[test]
fn test_model_dispose_is_idempotent() {
    let h = Harness::new();
    let generation = Generation::new();
    let env = h.env();
    let mut mount = MountSurface::new(SurfaceSize::new(320, 240));

    let mut session = ModelSession::start("models/cube.stl", generation.watch(generation.issue()), &env, &mut mount)
        .unwrap();
    for _ in 0..1000 {
        session.tick(ZERO, &mut mount);
        if session.state() == ModelState::Idle {
            break;
        }
        std::thread::sleep(ms(2));
    }
    assert_eq!(session.state(), ModelState::Idle);
    assert_eq!(session.renders(), 1);

    session.dispose(&mut mount).unwrap();
    session.dispose(&mut mount).unwrap();
    assert_eq!(session.state(), ModelState::Disposed);
    assert_eq!(h.rec.count("release_geometry"), 1);
    assert_eq!(h.rec.count("release_material"), 1);
    assert_eq!(h.rec.count("release_surface"), 1);
    assert_eq!(mount.node_count(), 0);
    assert_eq!(mount.listener_count(), 0);

    // Events after disposal are ignored.
    let request = session.handle_event(&SurfaceEvent::Gizmo(GizmoAction::Wireframe), &mut mount);
    assert_eq!(request, FrameRequest::Idle);
    assert_eq!(session.renders(), 1);
}

#[test]
fn test_stale_model_load_is_discarded() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    h.source.hold("models/cube.stl");
    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    m.tick(ZERO);
    m.show(&item(&catalog, "RED"), m.generation().issue());
    h.source.release();

    assert!(pump(&mut m, ZERO, |m| shown_pixel(m).is_some()));
    std::thread::sleep(ms(50));
    m.tick(ZERO);

    assert_eq!(shown_pixel(&m), Some([255, 0, 0, 255]));
    assert!(h.rec.log().iter().all(|e| !e.starts_with("create")));
    assert!(m.mount().viewport().is_none());
    assert_eq!(m.active_kind(), Some("img"));
}

#[test]
fn test_newer_model_wins() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    h.source.hold("models/cube.stl");
    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    m.show(&item(&catalog, "FAR"), m.generation().issue());
    h.source.release();
    assert!(pump(&mut m, ZERO, has_viewport));

    std::thread::sleep(ms(50));
    for _ in 0..5 {
        m.tick(ZERO);
    }
    let creates = h.rec.log().iter().filter(|e| e.starts_with("create")).count();
    assert_eq!(creates, 1);
    assert_eq!(h.rec.renders(), 1);
    assert_eq!(h.counter.live(), 1);
}

#[test]
fn test_unreachable_model_then_recovery() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "GONE"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| placeholder(m).is_some()));
    let (title, hint) = placeholder(&m).unwrap();
    assert_eq!(title, "STL VIEWER UNAVAILABLE");
    assert_eq!(hint, "Check STL path and render backend availability.");

    m.show(&item(&catalog, "BAD"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| placeholder(m).is_some()));
    assert_eq!(placeholder(&m).unwrap().0, "STL VIEWER UNAVAILABLE");
    assert!(h.rec.log().is_empty());

    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    assert!(pump(&mut m, ZERO, has_viewport));
    assert_eq!(h.rec.renders(), 1);
}

#[test]
fn test_failed_upload_releases_scene() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();
    h.rec.fail_upload.store(true, Ordering::SeqCst);

    m.show(&item(&catalog, "CUBE"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| placeholder(m).is_some()));
    assert_eq!(
        h.rec.log(),
        vec!["create 400x300", "upload failed", "release_geometry", "release_material", "release_surface"]
    );
    assert_eq!(placeholder(&m).unwrap().0, "STL VIEWER UNAVAILABLE");
    assert_eq!(m.mount().listener_count(), 0);
}

#[test]
fn test_sequence_advances_by_elapsed_time() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "SPIN"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| shown_pixel(m) == Some([255, 0, 0, 255])));
    std::thread::sleep(ms(100));
    m.tick(ZERO);

    // 10 fps: 250ms is two whole frames.
    let request = m.tick(ms(250));
    assert_eq!(shown_pixel(&m), Some([0, 0, 255, 255]));
    assert_eq!(request, FrameRequest::After(ms(50)));

    m.tick(ms(300));
    assert_eq!(shown_pixel(&m), Some([255, 255, 255, 255]));
    m.tick(ms(400));
    assert_eq!(shown_pixel(&m), Some([255, 0, 0, 255]));

    let size = m.mount().nodes().find_map(|n| match n {
        MountNode::Canvas { size, .. } => *size,
        _ => None,
    });
    assert_eq!(size, Some(SurfaceSize::new(2, 2)));
}

#[test]
fn test_sequence_frame_count_is_capped() {
    let h = Harness::new();
    let generation = Generation::new();
    let env = h.env();
    let mut mount = MountSurface::new(SurfaceSize::new(320, 240));

    let mut session =
        SequenceSession::start("seq/spin_", u32::MAX, 10.0, generation.watch(generation.issue()), &env, &mut mount)
            .unwrap();
    assert_eq!(session.frame_count(), MAX_SEQUENCE_FRAMES as usize);
    session.dispose(&mut mount).unwrap();
    generation.issue();
    assert_eq!(mount.node_count(), 0);
}

#[test]
fn test_sequence_pauses_while_hidden() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "SPIN"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| shown_pixel(m) == Some([255, 0, 0, 255])));
    std::thread::sleep(ms(100));
    m.tick(ZERO);

    m.set_visible(false);
    assert_eq!(m.tick(ms(5000)), FrameRequest::Idle);
    assert_eq!(shown_pixel(&m), Some([255, 0, 0, 255]));

    // Resuming starts a fresh interval instead of catching up.
    m.set_visible(true);
    m.tick(ms(6000));
    assert_eq!(shown_pixel(&m), Some([255, 0, 0, 255]));
    m.tick(ms(6100));
    assert_eq!(shown_pixel(&m), Some([0, 255, 0, 255]));
}

#[test]
fn test_image_and_missing_image() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "RED"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| shown_pixel(m).is_some()));
    let alt = m.mount().nodes().find_map(|n| match n {
        MountNode::Image { alt, .. } => Some(alt.clone()),
        _ => None,
    });
    assert_eq!(alt.as_deref(), Some("Red Card"));

    m.show(&item(&catalog, "NOIMG"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| placeholder(m).is_some()));
    assert_eq!(placeholder(&m).unwrap(), ("MEDIA ERROR".into(), "Image file missing or unsupported.".into()));
}

#[test]
fn test_video_click_toggles_playback() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "CLIP"), m.generation().issue());
    assert!(pump(&mut m, ZERO, |m| shown_pixel(m).is_some()));
    assert_eq!(h.video.opened.load(Ordering::SeqCst), 1);
    assert_eq!(m.playing(), Some(true));

    assert_eq!(m.click(), Some(false));
    assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    assert_eq!(m.click(), Some(true));
    assert_eq!(m.tick(ZERO), FrameRequest::After(monospec::session::POLL_INTERVAL));

    m.set_visible(false);
    assert_eq!(m.tick(ZERO), FrameRequest::Idle);
    m.set_visible(true);

    m.show(&item(&catalog, "RED"), m.generation().issue());
    assert_eq!(m.mount().listener_count(), 0);
    assert!(!m.mount().nodes().any(|n| matches!(n, MountNode::Video { .. })));
    assert_eq!(m.click(), None);
}

#[test]
fn test_missing_video_shows_media_error() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "NOCLIP"), m.generation().issue());
    assert_eq!(placeholder(&m).unwrap(), ("MEDIA ERROR".into(), "Video file missing or unsupported.".into()));
    assert_eq!(h.video.opened.load(Ordering::SeqCst), 0);
    assert!(m.active_kind().is_none());
}

#[test]
fn test_configuration_placeholders() {
    let h = Harness::new();
    let catalog = fixture_catalog();
    let mut m = h.manager();

    m.show(&item(&catalog, "SEQ-BAD"), m.generation().issue());
    assert_eq!(placeholder(&m).unwrap().0, "PNG SEQ MISCONFIGURED");

    m.show(&item(&catalog, "ODD"), m.generation().issue());
    assert_eq!(placeholder(&m).unwrap().0, "NO ASSET CONFIGURED");

    m.show_empty(m.generation().issue());
    assert_eq!(placeholder(&m).unwrap(), ("NO RESULTS".into(), "Adjust filter or add content.".into()));
    assert_eq!(h.counter.started.load(Ordering::SeqCst), 0);
}
