//! Render graph benchmarks: main view build time and per-frame cost with
//! growing opaque buckets.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use umbra::prelude::*;

fn camera_args() -> RenderArgs {
    RenderArgs {
        view_frustum: Some(ViewFrustum::perspective(
            Vec3::ZERO,
            Quat::IDENTITY,
            1.2,
            16.0 / 9.0,
            0.1,
            500.0,
        )),
        viewport: Viewport::from_size(1280, 720),
        ..RenderArgs::default()
    }
}

fn populated_view(count: usize) -> (RenderView, FetchCullSortOutput) {
    let mut view = RenderView::new(&RenderSettings::default(), Scene::default())
        .expect("main view builds");
    let keys = [
        ShapeKey::MATERIAL,
        ShapeKey::MATERIAL | ShapeKey::DEPTH_BIAS,
        ShapeKey::MATERIAL | ShapeKey::NO_CULL_FACE,
    ];

    let scene = &mut view.context_mut().scene;
    let opaques = (0..count)
        .map(|i| {
            let position = Vec3::new((i % 32) as f32, (i / 32) as f32, -5.0 - (i % 7) as f32);
            let id = scene.add_item(Item::shape(
                Aabb::from_sphere(position, 0.5),
                ShapeItem::new(Mat4::from_translation(position), keys[i % keys.len()], 36),
            ));
            scene.item_bound(id).expect("item just added")
        })
        .collect();
    let lights = (0..16)
        .map(|i| {
            let position = Vec3::new(i as f32 * 2.0 - 16.0, 1.0, -10.0);
            let id = scene.add_item(Item::light(Light::point(position, 4.0)));
            scene.item_bound(id).expect("light just added")
        })
        .collect();

    (
        view,
        FetchCullSortOutput {
            opaques,
            lights,
            ..FetchCullSortOutput::default()
        },
    )
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("main_view/build", |b| {
        b.iter(|| {
            let mut gpu = GpuContext::default();
            black_box(RenderDeferredTask::build(&RenderSettings::default(), &mut gpu))
        });
    });
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("main_view/frame");
    for count in [0usize, 256, 4096] {
        let (mut view, items) = populated_view(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &items, |b, items| {
            b.iter(|| black_box(view.render(camera_args(), items.clone())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_frame);
criterion_main!(benches);
