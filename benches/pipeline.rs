use camera_bridge::control::{ControlPolicy, ControlSurface, ControlValue, FocusPoint};
use camera_bridge::device::{FocusMode, SimulatedBackend};
use camera_bridge::pipeline::{CaptureQueue, RequestId};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn queue_cycle(c: &mut Criterion) {
    c.bench_function("queue_fill_drain_64", |b| {
        let mut queue = CaptureQueue::new(64);
        b.iter(|| {
            for i in 0..64 {
                let _ = queue.push(RequestId::new(i));
            }
            while let Some(id) = queue.pop_front() {
                black_box(id);
            }
        })
    });

    c.bench_function("queue_remove_middle", |b| {
        b.iter(|| {
            let mut queue = CaptureQueue::new(16);
            for i in 0..16 {
                let _ = queue.push(RequestId::new(i));
            }
            black_box(queue.remove_where(|id| id.get() == 8))
        })
    });
}

fn control_validation(c: &mut Criterion) {
    let back = SimulatedBackend::default_devices()
        .into_iter()
        .find(|d| d.id() == "back")
        .map(|d| d.capabilities().clone())
        .unwrap_or_default();
    let strict = ControlSurface::new(ControlPolicy::Strict, back.clone());
    let permissive = ControlSurface::new(ControlPolicy::Permissive, back);

    c.bench_function("validate_zoom_strict", |b| {
        b.iter(|| strict.validate(black_box(ControlValue::Zoom(4.0))))
    });
    c.bench_function("validate_focus_permissive", |b| {
        b.iter(|| {
            permissive.validate(black_box(ControlValue::Focus {
                mode: FocusMode::Auto,
                point: Some(FocusPoint::new(1.4, -0.2)),
            }))
        })
    });
}

criterion_group!(benches, queue_cycle, control_validation);
criterion_main!(benches);
