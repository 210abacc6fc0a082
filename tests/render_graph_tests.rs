//! Render Graph Tests
//!
//! Tests for:
//! - Build-time wiring checks (duplicate names, foreign varyings)
//! - Declaration-order dependencies of the main view
//! - Output field projection (`get_n`)
//! - Disabled jobs and sub-tasks publishing defaults
//! - Config registry JSON export, partial updates, clamping and
//!   all-or-nothing updates

use anyhow::Result;
use serde_json::json;

use umbra::graph::{EnabledConfig, Job, Task, Varying, Varyings};
use umbra::jobs::draw::DrawStateSortConfig;
use umbra::jobs::post::BloomApplyConfig;
use umbra::jobs::select::FilterLayeredOutputs;
use umbra::jobs::FilterLayeredItems;
use umbra::prelude::*;
use umbra::{GraphError, RenderError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Publishes a constant.
struct Constant(u32);

impl Job for Constant {
    type Inputs = ();
    type Output = u32;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        _ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> umbra::Result<u32> {
        Ok(self.0)
    }
}

/// Doubles its input.
struct Double;

impl Job for Double {
    type Inputs = Varying<u32>;
    type Output = u32;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        _ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &Varying<u32>,
        varyings: &Varyings,
    ) -> umbra::Result<u32> {
        Ok(varyings.get(inputs)? * 2)
    }
}

fn main_view() -> Result<RenderDeferredTask> {
    let mut gpu = GpuContext::default();
    Ok(RenderDeferredTask::build(&RenderSettings::default(), &mut gpu)?)
}

// ============================================================================
// Wiring
// ============================================================================

#[test]
fn duplicate_job_name_fails_the_build() {
    init_logging();
    let result = Task::<()>::build("T", |b, _| {
        b.add_job("Same", Constant(1), ())?;
        b.add_job("Same", Constant(2), ())?;
        Ok(())
    });
    let Err(err) = result else {
        panic!("duplicate name was accepted");
    };
    assert!(err.is_wiring());
    assert!(matches!(
        err,
        RenderError::Graph(GraphError::DuplicateJobName { .. })
    ));
}

#[test]
fn same_name_in_different_sub_tasks_is_allowed() -> Result<()> {
    let (task, ()) = Task::<()>::build("T", |b, _| {
        b.add_sub_task("A", |a| a.add_job("Job", Constant(1), ()).map(|_| ()))?;
        b.add_sub_task("B", |sub| sub.add_job("Job", Constant(2), ()).map(|_| ()))?;
        Ok(())
    })?;
    assert_eq!(task.job_paths(), vec!["T.A.Job", "T.B.Job"]);
    Ok(())
}

#[test]
fn varying_from_another_task_is_rejected() -> Result<()> {
    let (_other, foreign) = Task::<()>::build("Other", |b, _| b.add_job("Source", Constant(3), ()))?;
    let result = Task::<()>::build("T", |b, _| b.add_job("Consumer", Double, foreign));
    assert!(matches!(
        result,
        Err(RenderError::Graph(GraphError::ForeignVarying { .. }))
    ));
    Ok(())
}

#[test]
fn main_view_consumers_follow_their_producers() -> Result<()> {
    let view = main_view()?;
    let task = view.task();
    let order = task.job_paths();
    let position = |path: &str| order.iter().position(|p| *p == path);

    for job in task.dependencies() {
        let consumer = position(job.path.as_str()).expect("job path listed");
        for input in &job.inputs {
            if input.producer == task.name() {
                continue;
            }
            let producer = position(input.producer.as_str()).expect("producer path listed");
            assert!(
                producer < consumer,
                "{} reads {} which runs later",
                job.path,
                input.producer
            );
        }
    }
    Ok(())
}

// ============================================================================
// Output projection
// ============================================================================

#[test]
fn get_n_reads_the_same_value_as_the_whole_output() -> Result<()> {
    init_logging();
    let mut ctx = RenderContext::default();
    let bound = |ctx: &mut RenderContext, layer| {
        let id = ctx.scene.add_item(
            Item::shape(
                Aabb::from_sphere(Vec3::ZERO, 1.0),
                ShapeItem::new(Mat4::IDENTITY, ShapeKey::MATERIAL, 3),
            )
            .with_layer(layer),
        );
        ctx.scene.item_bound(id).expect("item just added")
    };
    let items = vec![
        bound(&mut ctx, Layer::InFront),
        bound(&mut ctx, Layer::Hud),
        bound(&mut ctx, Layer::InFront),
    ];

    let (mut task, split) = Task::<ItemBounds>::build("Split", |b, input| {
        b.add_job("Filter", FilterLayeredItems::new(Layer::InFront), input)
    })?;
    task.run(&mut ctx, items.clone())?;

    let whole = task.get(&split)?;
    let matching = task.get(&split.get_n(FilterLayeredOutputs::MATCHING))?;
    let non_matching = task.get(&split.get_n(FilterLayeredOutputs::NON_MATCHING))?;
    assert_eq!(matching, &whole.matching);
    assert_eq!(non_matching, &whole.non_matching);
    assert_eq!(matching, &vec![items[0], items[2]]);
    assert_eq!(non_matching, &vec![items[1]]);
    Ok(())
}

// ============================================================================
// Disabled jobs
// ============================================================================

#[test]
fn disabled_sub_task_publishes_defaults() -> Result<()> {
    let mut ctx = RenderContext::default();
    let (mut task, (inner, after)) = Task::<()>::build("T", |b, _| {
        let inner = b.add_sub_task("Sub", |sub| sub.add_job("Seven", Constant(7), ()))?;
        let after = b.add_job("Double", Double, inner)?;
        Ok((inner, after))
    })?;

    task.run(&mut ctx, ())?;
    assert_eq!(*task.get(&after)?, 14);

    task.configs().set_enabled("T.Sub", false)?;
    task.run(&mut ctx, ())?;
    assert_eq!(*task.get(&inner)?, 0);
    assert_eq!(*task.get(&after)?, 0);
    Ok(())
}

// ============================================================================
// Config registry
// ============================================================================

#[test]
fn main_view_configs_export_and_accept_partial_updates() -> Result<()> {
    let view = main_view()?;
    let configs = view.configs();

    let exported = configs.to_json()?;
    assert!(exported.get("RenderMainView.Bloom.BloomApply").is_some());
    assert!(exported.get("RenderMainView.DrawOpaqueDeferred").is_some());

    configs.apply_json(&json!({
        "RenderMainView.Bloom.BloomApply": { "intensity": 0.5 },
        "RenderMainView.DrawOpaqueDeferred": { "state_sort": false }
    }))?;
    let bloom = configs.get::<BloomApplyConfig>("RenderMainView.Bloom.BloomApply")?;
    assert_eq!(bloom.read().intensity, 0.5);
    assert_eq!(bloom.read().size, BloomApplyConfig::default().size);
    let draw = configs.get::<DrawStateSortConfig>("RenderMainView.DrawOpaqueDeferred")?;
    assert!(!draw.read().state_sort);
    Ok(())
}

#[test]
fn unknown_config_path_changes_nothing() -> Result<()> {
    let view = main_view()?;
    let configs = view.configs();
    let result = configs.apply_json(&json!({
        "RenderMainView.Bloom.BloomApply": { "intensity": 0.9 },
        "RenderMainView.NoSuchJob": { "enabled": false }
    }));
    assert!(result.is_err());
    let bloom = configs.get::<BloomApplyConfig>("RenderMainView.Bloom.BloomApply")?;
    assert_eq!(bloom.read().intensity, BloomApplyConfig::default().intensity);
    Ok(())
}

#[test]
fn mistyped_field_changes_nothing() -> Result<()> {
    let view = main_view()?;
    let configs = view.configs();
    let result = configs.apply_json(&json!({
        "RenderMainView.Bloom.BloomApply": { "intensity": 0.9 },
        "RenderMainView.DrawOpaqueDeferred": { "max_drawn": "all" }
    }));
    assert!(matches!(result, Err(umbra::ConfigError::Json(_))));

    let bloom = configs.get::<BloomApplyConfig>("RenderMainView.Bloom.BloomApply")?;
    assert_eq!(bloom.read().intensity, BloomApplyConfig::default().intensity);
    let draw = configs.get::<DrawStateSortConfig>("RenderMainView.DrawOpaqueDeferred")?;
    assert_eq!(draw.read().max_drawn, -1);
    Ok(())
}

#[test]
fn config_type_mismatch_is_reported() -> Result<()> {
    let view = main_view()?;
    let result = view
        .configs()
        .get::<BloomApplyConfig>("RenderMainView.DrawOpaqueDeferred");
    assert!(matches!(result, Err(umbra::ConfigError::TypeMismatch { .. })));
    Ok(())
}
