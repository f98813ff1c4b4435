//! 端到端场景：从声明 Pass 到在记录设备上提交

use std::cell::Cell;

use ash::vk;
use itertools::Itertools;

use super::*;

fn storage_desc() -> RgImageDesc {
    RgImageDesc::new_2d(
        64,
        64,
        vk::Format::R8G8B8A8_UNORM,
        vk::ImageUsageFlags::STORAGE
            | vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST,
    )
}

fn color_desc() -> RgImageDesc {
    RgImageDesc::new_2d(
        128,
        64,
        vk::Format::B8G8R8A8_UNORM,
        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
    )
}

fn noop(_: &mut RgPassContext<'_, RgDummyDevice>) {}

fn sync_of<'g>(graph: &'g RgCompiledGraph<'_, RgDummyDevice>, name: &str) -> &'g RgPassSync {
    let index = graph.find_pass(name).unwrap();
    graph.pass_sync(index).unwrap()
}

fn labels(submission: &RgDummySubmission) -> Vec<&str> {
    submission
        .commands
        .iter()
        .filter_map(|c| match c {
            RgDummyCommand::BeginLabel(name) => Some(name.as_str()),
            _ => None,
        })
        .collect()
}

fn rendering_infos(submission: &RgDummySubmission) -> Vec<&RgRenderingInfo<u64>> {
    submission
        .commands
        .iter()
        .filter_map(|c| match c {
            RgDummyCommand::BeginRendering(info) => Some(info),
            _ => None,
        })
        .collect()
}

fn init() -> (RgDummyDevice, RgFrameResources<RgDummyDevice>) {
    truvis_crate_tools::init_log::init_test_log();
    let mut device = RgDummyDevice::new();
    let mut frames = RgFrameResources::new();
    frames.begin_frame(&mut device, 0);
    (device, frames)
}

#[test]
fn test_compute_write_then_read_needs_one_barrier() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass(
        "write",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "read",
        RgQueueType::Compute,
        move |b| {
            b.read_image(x, RgImageState::SHADER_READ_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let read = sync_of(&graph, "read");
    assert_eq!(read.pre_pass_barrier_count(), 1);
    let barrier = read.barriers.image_barriers[0];
    assert_eq!(barrier.src_state, RgImageState::STORAGE_WRITE_COMPUTE);
    assert_eq!(barrier.dst_state, RgImageState::SHADER_READ_COMPUTE);
    assert!(barrier.queue_transfer.is_none());
    assert!(graph.queue_edges().is_empty());
}

#[test]
fn test_cross_queue_read_uses_semaphore_instead_of_barrier() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass(
        "write",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "copy",
        RgQueueType::Transfer,
        move |b| {
            b.read_image(x, RgImageState::TRANSFER_SRC);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let copy = sync_of(&graph, "copy");
    assert!(copy.barriers.image_barriers.is_empty());
    assert_eq!(copy.acquire_barriers.image_barriers.len(), 1);
    assert_eq!(copy.waits, vec![0]);
    assert_eq!(sync_of(&graph, "write").signals, vec![0]);
    assert_eq!(sync_of(&graph, "write").release_barriers.image_barriers.len(), 1);
    assert_eq!(
        graph.queue_edges(),
        &[RgQueueEdge {
            producer: Some(0),
            src_queue: RgQueueType::Compute,
            consumer: 1,
            dst_queue: RgQueueType::Transfer,
        }]
    );

    graph.execute(&mut device, &mut frames);

    assert_eq!(device.submissions.len(), 2);
    let (compute, transfer) = (&device.submissions[0], &device.submissions[1]);
    assert_eq!(compute.queue, RgQueueType::Compute);
    assert_eq!(transfer.queue, RgQueueType::Transfer);
    assert_eq!(compute.signals.len(), 1);
    assert_eq!(transfer.waits.len(), 1);
    assert_eq!(compute.signals[0].semaphore, transfer.waits[0].semaphore);

    // release 与 acquire 成对出现，队列族与 layout 一致
    let release = compute.image_barriers().find(|b| b.src_queue_family != b.dst_queue_family).unwrap();
    let acquire = transfer.image_barriers().next().unwrap();
    assert_eq!((release.src_queue_family, release.dst_queue_family), (1, 2));
    assert_eq!((acquire.src_queue_family, acquire.dst_queue_family), (1, 2));
    assert_eq!(release.old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(release.new_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    assert_eq!(acquire.new_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    assert_eq!(release.dst_access, vk::AccessFlags2::NONE);
}

#[test]
fn test_shared_queue_family_skips_ownership_transfer() {
    truvis_crate_tools::init_log::init_test_log();
    let mut device = RgDummyDevice::with_queue_families([0, 0, 0]);
    let mut frames = RgFrameResources::new();
    frames.begin_frame(&mut device, 0);

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass(
        "write",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "copy",
        RgQueueType::Transfer,
        move |b| {
            b.read_image(x, RgImageState::TRANSFER_SRC);
            b.force_execution();
        },
        noop,
    );
    builder.compile().unwrap().execute(&mut device, &mut frames);

    let compute = &device.submissions[0];
    let transfer = &device.submissions[1];
    // 只有首次使用的 layout 转换，release 被省略
    assert_eq!(compute.barrier_call_count(), 1);
    let acquire = transfer.image_barriers().next().unwrap();
    assert_eq!(acquire.src_queue_family, vk::QUEUE_FAMILY_IGNORED);
    assert_eq!(acquire.dst_queue_family, vk::QUEUE_FAMILY_IGNORED);
    assert_eq!(acquire.old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(compute.signals[0].semaphore, transfer.waits[0].semaphore);
}

#[test]
fn test_mip_chain_generation_uses_intra_pass_barriers() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let image = builder.create_image("bloom-chain", storage_desc().with_mip_levels(6));
    let views = (0..6).map(|level| builder.create_image_view(RgImageViewDesc::mip(image, level))).collect_vec();

    let setup_views = views.clone();
    builder.add_lambda_pass(
        "downsample",
        RgQueueType::Compute,
        move |b| {
            let (last, chain) = setup_views.split_last().unwrap();
            for view in chain {
                b.write_image_view_then(*view, RgImageState::STORAGE_WRITE_COMPUTE, RgImageState::SHADER_READ_COMPUTE);
            }
            b.write_image_view(*last, RgImageState::STORAGE_WRITE_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let sync = sync_of(&graph, "downsample");
    assert_eq!(sync.intra_pass_barriers.len(), 5);
    for (level, intra) in sync.intra_pass_barriers.iter().enumerate() {
        assert_eq!(intra.view, views[level]);
        assert_eq!(intra.barrier.range.base_mip_level, level as u32);
        assert_eq!(intra.barrier.range.level_count, 1);
        assert_eq!(intra.barrier.src_state, RgImageState::STORAGE_WRITE_COMPUTE);
        assert_eq!(intra.barrier.dst_state, RgImageState::SHADER_READ_COMPUTE);
    }

    // 进入 Pass 时六个 mip 的 layout 转换合并为一个 barrier
    assert_eq!(sync.barriers.image_barriers.len(), 1);
    assert_eq!(sync.barriers.image_barriers[0].range.level_count, 6);
}

#[test]
fn test_secondary_transition_is_recorded_by_the_callback() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let image = builder.create_image("chain", storage_desc().with_mip_levels(3));
    let views = (0..3).map(|level| builder.create_image_view(RgImageViewDesc::mip(image, level))).collect_vec();

    let setup_views = views.clone();
    builder.add_lambda_pass(
        "downsample",
        RgQueueType::Compute,
        move |b| {
            b.write_image_view_then(setup_views[0], RgImageState::STORAGE_WRITE_COMPUTE, RgImageState::SHADER_READ_COMPUTE);
            b.write_image_view_then(setup_views[1], RgImageState::STORAGE_WRITE_COMPUTE, RgImageState::SHADER_READ_COMPUTE);
            b.write_image_view(setup_views[2], RgImageState::STORAGE_WRITE_COMPUTE);
            b.force_execution();
        },
        move |ctx| {
            for view in &views[..2] {
                ctx.cmd.marker("dispatch");
                ctx.transition_to_secondary(*view);
            }
            ctx.cmd.marker("dispatch");
        },
    );
    builder.compile().unwrap().execute(&mut device, &mut frames);

    let submission = &device.submissions[0];
    assert_eq!(submission.markers().len(), 3);
    // 进入时一次，Pass 内两次
    assert_eq!(submission.barrier_call_count(), 3);
    let promoted = submission
        .image_barriers()
        .filter(|b| b.new_layout == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .map(|b| b.range.base_mip_level)
        .collect_vec();
    assert_eq!(promoted, vec![0, 1]);
}

#[test]
fn test_history_image_state_carries_across_frames() {
    let (mut device, mut frames) = init();
    let desc = storage_desc();
    let history = device.create_image("history", &desc);
    let mut history_state = RgImageExternalState::undefined(1);

    // frame 1：从 UNDEFINED 开始
    {
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let h = builder.import_image("history", desc.clone(), history, &mut history_state);
        builder.add_lambda_pass(
            "accumulate",
            RgQueueType::Compute,
            move |b| {
                b.write_image(h, RgImageState::STORAGE_WRITE_COMPUTE);
            },
            noop,
        );
        builder.add_lambda_pass(
            "resolve",
            RgQueueType::Compute,
            move |b| {
                b.read_image(h, RgImageState::SHADER_READ_COMPUTE);
                b.force_execution();
            },
            noop,
        );
        let graph = builder.compile().unwrap();

        let accumulate = sync_of(&graph, "accumulate");
        assert_eq!(accumulate.barriers.image_barriers.len(), 1);
        assert_eq!(accumulate.barriers.image_barriers[0].src_state.layout, vk::ImageLayout::UNDEFINED);
        graph.execute(&mut device, &mut frames);
    }
    assert_eq!(
        history_state.uniform(),
        Some(RgTrackedState::new(RgImageState::SHADER_READ_COMPUTE, Some(RgQueueType::Compute)))
    );

    // frame 2：首次使用与写回的状态一致
    frames.begin_frame(&mut device, 1);
    {
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let h = builder.import_image("history", desc.clone(), history, &mut history_state);
        builder.add_lambda_pass(
            "resolve",
            RgQueueType::Compute,
            move |b| {
                b.read_image(h, RgImageState::SHADER_READ_COMPUTE);
                b.force_execution();
            },
            noop,
        );
        let graph = builder.compile().unwrap();
        assert_eq!(graph.barrier_count(), 0);
        graph.execute(&mut device, &mut frames);
    }
    assert_eq!(device.submissions[1].barrier_call_count(), 0);

    // 导入的图像不归 graph 销毁
    assert!(device.is_live(history));
}

#[test]
fn test_read_run_is_widened_into_one_barrier() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let gbuffer = builder.create_image("gbuffer", color_desc());
    builder.add_lambda_pass(
        "geometry",
        RgQueueType::Graphics,
        move |b| {
            b.write_image(gbuffer, RgImageState::COLOR_ATTACHMENT_WRITE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "lighting",
        RgQueueType::Graphics,
        move |b| {
            b.read_image(gbuffer, RgImageState::SHADER_READ_FRAGMENT);
            b.force_execution();
        },
        noop,
    );
    builder.add_lambda_pass(
        "ssao",
        RgQueueType::Graphics,
        move |b| {
            b.read_image(gbuffer, RgImageState::SHADER_READ_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let lighting = sync_of(&graph, "lighting");
    assert_eq!(lighting.barriers.image_barriers.len(), 1);
    assert_eq!(
        lighting.barriers.image_barriers[0].dst_state.stage,
        vk::PipelineStageFlags2::FRAGMENT_SHADER | vk::PipelineStageFlags2::COMPUTE_SHADER
    );
    assert_eq!(sync_of(&graph, "ssao").pre_pass_barrier_count(), 0);
}

#[test]
fn test_unconsumed_pass_is_culled() {
    let build = |with_dead_pass: bool| {
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let x = builder.create_image("x", storage_desc());
        let scratch = builder.create_image("scratch", storage_desc());
        builder.add_lambda_pass(
            "write",
            RgQueueType::Compute,
            move |b| {
                b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
            },
            noop,
        );
        if with_dead_pass {
            builder.add_lambda_pass(
                "dead",
                RgQueueType::Compute,
                move |b| {
                    b.read_image(x, RgImageState::SHADER_READ_COMPUTE);
                    b.write_image(scratch, RgImageState::STORAGE_WRITE_COMPUTE);
                },
                noop,
            );
        }
        builder.add_lambda_pass(
            "read",
            RgQueueType::Compute,
            move |b| {
                b.read_image(x, RgImageState::SHADER_READ_COMPUTE);
                b.force_execution();
            },
            noop,
        );
        builder.compile().unwrap()
    };

    let culled = build(true);
    let reference = build(false);

    assert_eq!(culled.culled_passes(), &[1]);
    assert!(culled.is_culled(1));
    assert_eq!(culled.execution_order(), &[0, 2]);
    assert!(culled.live_range(culled.resources().iter_images().nth(1).unwrap().0).is_none());

    // 剔除不影响存活 Pass 的同步
    for name in ["write", "read"] {
        assert_eq!(sync_of(&culled, name).barriers, sync_of(&reference, name).barriers);
    }
}

#[test]
fn test_culling_can_be_disabled() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new().with_settings(RgSettings {
        enable_culling: false,
        ..Default::default()
    });
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass(
        "write",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    assert!(graph.culled_passes().is_empty());
    assert_eq!(graph.execution_order(), &[0]);
}

#[test]
fn test_disjoint_transients_alias_one_allocation() {
    let (mut device, mut frames) = init();
    let first_physical = Cell::new(0u64);
    let second_physical = Cell::new(0u64);
    let (first_slot, second_slot) = (&first_physical, &second_physical);

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let a = builder.create_image("a", storage_desc());
    let b_image = builder.create_image("b", storage_desc());
    builder.add_lambda_pass(
        "write-a",
        RgQueueType::Compute,
        move |b| {
            b.write_image(a, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        move |ctx| first_slot.set(ctx.get_image(a).unwrap()),
    );
    builder.add_lambda_pass(
        "read-a",
        RgQueueType::Compute,
        move |b| {
            b.read_image(a, RgImageState::SHADER_READ_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    builder.add_lambda_pass(
        "write-b",
        RgQueueType::Compute,
        move |b| {
            b.write_image(b_image, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        move |ctx| second_slot.set(ctx.get_image(b_image).unwrap()),
    );
    builder.add_lambda_pass(
        "read-b",
        RgQueueType::Compute,
        move |b| {
            b.read_image(b_image, RgImageState::SHADER_READ_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let plan = graph.aliasing_plan();
    assert_eq!(plan.slot_of(a.into()), plan.slot_of(b_image.into()));
    assert_eq!(plan.predecessor(b_image.into()), Some(a.into()));
    let (range_a, range_b) = (graph.live_range(a).unwrap(), graph.live_range(b_image).unwrap());
    assert_eq!((range_a.first, range_a.last), (0, 1));
    assert!(!range_a.overlaps(&range_b));

    // 新租户丢弃旧内容，并等待上一个租户的最后使用
    let takeover = sync_of(&graph, "write-b").barriers.image_barriers[0];
    assert!(takeover.discard);
    assert_eq!(takeover.src_state.stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
    assert_eq!(takeover.src_state.layout, vk::ImageLayout::UNDEFINED);

    graph.execute(&mut device, &mut frames);

    let (first, second) = (first_physical.get(), second_physical.get());
    assert_ne!(first, second);
    assert!(device.memory_of(first).is_some());
    assert_eq!(device.memory_of(first), device.memory_of(second));
}

#[test]
fn test_multi_queue_transients_never_alias() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let shared = builder.create_image("shared", storage_desc());
    let local = builder.create_image("local", storage_desc());
    builder.add_lambda_pass(
        "produce",
        RgQueueType::Compute,
        move |b| {
            b.write_image(shared, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "consume",
        RgQueueType::Graphics,
        move |b| {
            b.read_image(shared, RgImageState::SHADER_READ_FRAGMENT);
            b.force_execution();
        },
        noop,
    );
    builder.add_lambda_pass(
        "later",
        RgQueueType::Compute,
        move |b| {
            b.write_image(local, RgImageState::STORAGE_WRITE_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let plan = graph.aliasing_plan();
    assert_ne!(plan.slot_of(shared.into()), plan.slot_of(local.into()));
}

#[test]
fn test_conflicting_layouts_in_one_pass_are_rejected() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass(
        "bad",
        RgQueueType::Compute,
        move |b| {
            b.read_image(x, RgImageState::SHADER_READ_COMPUTE);
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
            b.force_execution();
        },
        noop,
    );

    let Err(err) = builder.compile() else {
        panic!("compile should fail");
    };
    assert_eq!(
        err,
        RgError::ConflictingUsage {
            pass: "bad".to_string(),
            resource: "x".to_string(),
        }
    );
}

#[test]
fn test_queue_capability_is_checked() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let target = builder.create_image("target", color_desc());
    builder.add_lambda_pass(
        "draw-on-compute",
        RgQueueType::Compute,
        move |b| {
            b.write_image(target, RgImageState::COLOR_ATTACHMENT_WRITE);
        },
        noop,
    );
    let Err(err) = builder.compile() else {
        panic!("attachment on compute queue should fail");
    };
    assert!(matches!(err, RgError::AttachmentOnNonGraphicsQueue { queue: RgQueueType::Compute, .. }));

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass(
        "sample-on-transfer",
        RgQueueType::Transfer,
        move |b| {
            b.read_image(x, RgImageState::SHADER_READ_COMPUTE);
        },
        noop,
    );
    let Err(err) = builder.compile() else {
        panic!("shader stage on transfer queue should fail");
    };
    assert!(matches!(err, RgError::UnsupportedQueueUsage { queue: RgQueueType::Transfer, .. }));
}

#[test]
fn test_unknown_handle_is_rejected() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    builder.add_lambda_pass(
        "stale",
        RgQueueType::Compute,
        |b| {
            b.read_image(RgImageHandle::default(), RgImageState::SHADER_READ_COMPUTE);
        },
        noop,
    );
    let Err(err) = builder.compile() else {
        panic!("null handle should fail");
    };
    assert_eq!(
        err,
        RgError::UnknownResource {
            pass: "stale".to_string()
        }
    );
}

#[test]
fn test_overflowing_view_range_is_rejected() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc().with_mip_levels(4).with_array_layers(2));

    let mips = builder.try_create_image_view(RgImageViewDesc::mip(x, u32::MAX));
    assert_eq!(
        mips,
        Err(RgError::InvalidImageView {
            name: "x".to_string(),
            reason: "mip range is out of bounds".to_string(),
        })
    );

    let mut layers = RgImageViewDesc::mip(x, 0);
    layers.range.base_array_layer = u32::MAX;
    layers.range.layer_count = 2;
    assert_eq!(
        builder.try_create_image_view(layers),
        Err(RgError::InvalidImageView {
            name: "x".to_string(),
            reason: "array layer range is out of bounds".to_string(),
        })
    );

    assert!(builder.try_create_image_view(RgImageViewDesc::mip(x, 3)).is_ok());
}

#[test]
fn test_clear_on_transfer_queue_is_rejected() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc().with_clear(RgClearValue::Color([0.0; 4])));
    builder.add_lambda_pass(
        "upload",
        RgQueueType::Transfer,
        move |b| {
            b.write_image(x, RgImageState::TRANSFER_DST);
            b.force_execution();
        },
        noop,
    );
    let Err(err) = builder.compile() else {
        panic!("clear on transfer queue should fail");
    };
    assert_eq!(
        err,
        RgError::UnsupportedClear {
            pass: "upload".to_string(),
            resource: "x".to_string(),
        }
    );
}

#[test]
fn test_cleared_storage_image_is_cleared_before_first_use() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc().with_clear(RgClearValue::Color([1.0, 0.0, 0.0, 1.0])));
    builder.add_lambda_pass(
        "fill",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
            b.force_execution();
        },
        |ctx| ctx.cmd.marker("dispatch"),
    );
    let graph = builder.compile().unwrap();

    let sync = sync_of(&graph, "fill");
    assert_eq!(sync.clears.len(), 1);
    assert_eq!(sync.clear_barriers.image_barriers[0].dst_state, RgImageState::TRANSFER_DST);
    assert_eq!(sync.barriers.image_barriers[0].src_state, RgImageState::TRANSFER_DST);

    graph.execute(&mut device, &mut frames);

    let commands = &device.submissions[0].commands;
    assert!(matches!(commands[0], RgDummyCommand::BeginLabel(_)));
    assert!(matches!(commands[1], RgDummyCommand::Barrier { .. }));
    let RgDummyCommand::ClearImage { layout, value, .. } = &commands[2] else {
        panic!("expected a clear, got {:?}", commands[2]);
    };
    assert_eq!(*layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(*value, RgClearValue::Color([1.0, 0.0, 0.0, 1.0]));
    assert!(matches!(commands[3], RgDummyCommand::Barrier { .. }));
    assert_eq!(commands[4], RgDummyCommand::Marker("dispatch".to_string()));
    assert_eq!(commands[5], RgDummyCommand::EndLabel);
}

#[test]
fn test_cleared_attachment_uses_load_op_clear() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let clear_value = RgClearValue::Color([0.2, 0.3, 0.4, 1.0]);
    let target = builder.create_image("target", color_desc().with_clear(clear_value));
    builder.add_lambda_pass(
        "draw",
        RgQueueType::Graphics,
        move |b| {
            b.write_image(target, RgImageState::COLOR_ATTACHMENT_WRITE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let sync = sync_of(&graph, "draw");
    assert_eq!(sync.attachment_clears, vec![target]);
    assert!(sync.clears.is_empty());

    graph.execute(&mut device, &mut frames);

    let submission = &device.submissions[0];
    let infos = rendering_infos(submission);
    assert_eq!(infos.len(), 1);
    let attachment = &infos[0].color_attachments[0];
    assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
    assert_eq!(attachment.clear_value, clear_value);
    assert!(submission.commands.contains(&RgDummyCommand::EndRendering));
}

#[test]
fn test_rendering_follows_attachment_view() {
    let (mut device, mut frames) = init();
    let desc = color_desc().with_mip_levels(2);
    let physical = device.create_image("target", &desc);
    let mut target_state = RgImageExternalState::undefined(2);

    {
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let target = builder.import_image("target", desc.clone(), physical, &mut target_state);
        let mip1 = builder.create_image_view(RgImageViewDesc::mip(target, 1));
        builder.add_lambda_pass(
            "draw",
            RgQueueType::Graphics,
            move |b| {
                b.write_image_view(mip1, RgImageState::COLOR_ATTACHMENT_WRITE);
            },
            noop,
        );
        builder.add_lambda_pass(
            "blend",
            RgQueueType::Graphics,
            move |b| {
                b.write_image_view(mip1, RgImageState::COLOR_ATTACHMENT_READ_WRITE);
            },
            noop,
        );
        builder.compile().unwrap().execute(&mut device, &mut frames);
    }

    let submission = &device.submissions[0];
    assert_eq!(labels(submission), vec!["draw", "blend"]);
    let infos = rendering_infos(submission);
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].extent, vk::Extent2D { width: 64, height: 32 });
    // mip 1 导入时为 UNDEFINED，draw 不需要加载旧内容
    assert_eq!(infos[0].color_attachments[0].load_op, vk::AttachmentLoadOp::DONT_CARE);
    assert_eq!(infos[1].color_attachments[0].load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(infos[0].color_attachments[0].layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    // 只有 mip 1 被使用，mip 0 保持未定义
    assert_eq!(target_state.mip(0), RgTrackedState::default());
    assert_eq!(
        target_state.mip(1),
        RgTrackedState::new(RgImageState::COLOR_ATTACHMENT_READ_WRITE, Some(RgQueueType::Graphics))
    );
}

#[test]
fn test_second_writer_loads_attachment() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let scene = builder.create_image("scene", color_desc());
    builder.add_lambda_pass(
        "opaque",
        RgQueueType::Graphics,
        move |b| {
            b.write_image(scene, RgImageState::COLOR_ATTACHMENT_WRITE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "decals",
        RgQueueType::Graphics,
        move |b| {
            b.write_image(scene, RgImageState::COLOR_ATTACHMENT_WRITE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "post",
        RgQueueType::Graphics,
        move |b| {
            b.read_image(scene, RgImageState::SHADER_READ_FRAGMENT);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    assert_eq!(sync_of(&graph, "opaque").attachment_discards, vec![scene]);
    assert!(sync_of(&graph, "decals").attachment_discards.is_empty());
    graph.execute(&mut device, &mut frames);

    let submission = &device.submissions[0];
    assert_eq!(labels(submission), vec!["opaque", "decals", "post"]);
    let infos = rendering_infos(submission);
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].color_attachments[0].load_op, vk::AttachmentLoadOp::DONT_CARE);
    // decals 只写入部分像素，opaque 的结果必须保留
    assert_eq!(infos[1].color_attachments[0].load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(infos[1].color_attachments[0].store_op, vk::AttachmentStoreOp::STORE);
}

#[test]
fn test_depth_prepass_result_is_loaded() {
    let (mut device, mut frames) = init();
    let depth_desc = RgImageDesc::new_2d(
        128,
        64,
        vk::Format::D32_SFLOAT,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
    );

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let depth = builder.create_image("depth", depth_desc);
    let color = builder.create_image("color", color_desc());
    builder.add_lambda_pass(
        "prepass",
        RgQueueType::Graphics,
        move |b| {
            b.write_image(depth, RgImageState::DEPTH_ATTACHMENT_WRITE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "main",
        RgQueueType::Graphics,
        move |b| {
            b.read_image(depth, RgImageState::DEPTH_ATTACHMENT_READ);
            b.write_image(color, RgImageState::COLOR_ATTACHMENT_WRITE);
            b.force_execution();
        },
        noop,
    );
    builder.compile().unwrap().execute(&mut device, &mut frames);

    let infos = rendering_infos(&device.submissions[0]);
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].depth_attachment.as_ref().unwrap().load_op, vk::AttachmentLoadOp::DONT_CARE);
    assert_eq!(infos[1].depth_attachment.as_ref().unwrap().load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(infos[1].color_attachments[0].load_op, vk::AttachmentLoadOp::DONT_CARE);
}

#[test]
fn test_buffer_first_use_and_clear() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let plain = builder.create_buffer("plain", RgBufferDesc::new(1024, vk::BufferUsageFlags::STORAGE_BUFFER));
    let counters = builder.create_buffer(
        "counters",
        RgBufferDesc::new(256, vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST).with_clear(0),
    );
    builder.add_lambda_pass(
        "count",
        RgQueueType::Compute,
        move |b| {
            b.write_buffer(plain, RgBufferState::STORAGE_WRITE_COMPUTE);
            b.read_write_buffer(counters, RgBufferState::STORAGE_READ_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "readback",
        RgQueueType::Compute,
        move |b| {
            b.read_buffer(plain, RgBufferState::STORAGE_READ_COMPUTE);
            b.read_buffer(counters, RgBufferState::STORAGE_READ_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let count = sync_of(&graph, "count");
    assert_eq!(count.clears, vec![RgClearOp::Buffer { buffer: counters, value: 0 }]);
    assert!(!count.clear_barriers.has_barriers());
    // 首次使用的 plain 不需要 barrier；counters 在填充后需要
    assert_eq!(count.barriers.buffer_barriers.len(), 1);
    assert_eq!(count.barriers.buffer_barriers[0].buffer, counters);
    assert_eq!(count.barriers.buffer_barriers[0].src_state, RgBufferState::TRANSFER_DST);

    assert_eq!(sync_of(&graph, "readback").barriers.buffer_barriers.len(), 2);

    graph.execute(&mut device, &mut frames);

    let commands = &device.submissions[0].commands;
    assert!(matches!(commands[1], RgDummyCommand::FillBuffer { size: vk::WHOLE_SIZE, value: 0, .. }));
    assert!(matches!(commands[2], RgDummyCommand::Barrier { .. }));
}

#[test]
fn test_waiting_pass_starts_new_submission() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass("ui", RgQueueType::Graphics, |b| b.force_execution(), noop);
    builder.add_lambda_pass(
        "simulate",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "composite",
        RgQueueType::Graphics,
        move |b| {
            b.read_image(x, RgImageState::SHADER_READ_FRAGMENT);
            b.force_execution();
        },
        noop,
    );
    builder.compile().unwrap().execute(&mut device, &mut frames);

    let graphics = device.submissions_on(RgQueueType::Graphics).collect_vec();
    assert_eq!(graphics.len(), 2);
    assert_eq!(labels(graphics[0]), vec!["ui"]);
    assert!(graphics[0].waits.is_empty());
    assert_eq!(labels(graphics[1]), vec!["composite"]);
    assert_eq!(graphics[1].waits.len(), 1);
}

#[test]
fn test_external_semaphores_wrap_the_frame() {
    let (mut device, mut frames) = init();
    let acquire = device.create_semaphore("swapchain-acquire");
    let present = device.create_semaphore("present-ready");

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    builder
        .wait_external(
            RgQueueType::Graphics,
            RgSemaphoreInfo::binary(acquire, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
        )
        .signal_external(RgQueueType::Graphics, RgSemaphoreInfo::binary(present, vk::PipelineStageFlags2::ALL_COMMANDS));
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass("clear-ui", RgQueueType::Graphics, |b| b.force_execution(), noop);
    builder.add_lambda_pass(
        "simulate",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "composite",
        RgQueueType::Graphics,
        move |b| {
            b.read_image(x, RgImageState::SHADER_READ_FRAGMENT);
            b.force_execution();
        },
        noop,
    );
    builder.compile().unwrap().execute(&mut device, &mut frames);

    let graphics = device.submissions_on(RgQueueType::Graphics).collect_vec();
    let (first, last) = (graphics.first().unwrap(), graphics.last().unwrap());
    assert_eq!(first.waits.iter().map(|w| w.semaphore).collect_vec(), vec![acquire]);
    assert!(last.signals.iter().any(|s| s.semaphore == present));
    assert!(graphics.iter().filter(|s| s.signals.iter().any(|x| x.semaphore == present)).count() == 1);
}

#[test]
fn test_imported_state_on_other_queue_is_released_in_prologue() {
    let (mut device, mut frames) = init();
    let desc = storage_desc();
    let physical = device.create_image("particles", &desc);
    let mut state = RgImageExternalState::new(1, RgImageState::STORAGE_WRITE_COMPUTE, Some(RgQueueType::Compute));

    {
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let particles = builder.import_image("particles", desc.clone(), physical, &mut state);
        builder.add_lambda_pass(
            "draw-particles",
            RgQueueType::Graphics,
            move |b| {
                b.read_image(particles, RgImageState::SHADER_READ_FRAGMENT);
                b.force_execution();
            },
            noop,
        );
        let graph = builder.compile().unwrap();

        assert_eq!(graph.queue_edges()[0].producer, None);
        assert_eq!(graph.queue_edges()[0].src_queue, RgQueueType::Compute);
        assert_eq!(graph.prologue_releases(RgQueueType::Compute).image_barrier_count(), 1);
        graph.execute(&mut device, &mut frames);
    }

    let prologue = &device.submissions[0];
    assert_eq!(prologue.queue, RgQueueType::Compute);
    assert_eq!(prologue.barrier_call_count(), 1);
    let draw = &device.submissions[1];
    assert_eq!(draw.queue, RgQueueType::Graphics);
    assert_eq!(prologue.signals[0].semaphore, draw.waits[0].semaphore);
    assert_eq!(
        state.mip(0),
        RgTrackedState::new(RgImageState::SHADER_READ_FRAGMENT, Some(RgQueueType::Graphics))
    );
}

#[test]
fn test_transients_are_destroyed_after_slot_reuse() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    let y = builder.create_image("y", storage_desc());
    builder.add_lambda_pass(
        "write",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "copy",
        RgQueueType::Transfer,
        move |b| {
            b.read_image(x, RgImageState::TRANSFER_SRC);
            b.write_image(y, RgImageState::TRANSFER_DST);
            b.force_execution();
        },
        noop,
    );
    builder.compile().unwrap().execute(&mut device, &mut frames);

    assert!(frames.pending_release_count() > 0);
    assert!(device.live_object_count() > 0);

    for frame_id in 1..=RgFrameResources::<RgDummyDevice>::FIF_COUNT as u64 {
        frames.begin_frame(&mut device, frame_id);
    }
    assert_eq!(frames.pending_release_count(), 0);
    assert_eq!(device.live_object_count(), frames.pooled_semaphore_count());
    assert_eq!(device.freed_command_lists, 2);

    frames.destroy(&mut device);
    assert_eq!(device.live_object_count(), 0);
}

#[test]
fn test_execution_plan_can_be_printed() {
    truvis_crate_tools::init_log::init_test_log();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new().with_settings(RgSettings {
        print_execution_plan: true,
        ..Default::default()
    });
    let x = builder.create_image("x", storage_desc());
    let scratch = builder.create_buffer("scratch", RgBufferDesc::new(64, vk::BufferUsageFlags::STORAGE_BUFFER));
    builder.add_lambda_pass(
        "write",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
            b.write_buffer(scratch, RgBufferState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "copy",
        RgQueueType::Transfer,
        move |b| {
            b.read_image(x, RgImageState::TRANSFER_SRC);
            b.read_buffer(scratch, RgBufferState::TRANSFER_SRC);
            b.force_execution();
        },
        noop,
    );
    builder.add_lambda_pass("unused", RgQueueType::Graphics, |_| {}, noop);

    let graph = builder.compile().unwrap();
    assert_eq!(graph.culled_passes(), &[2]);
    assert_eq!(graph.queue_edges().len(), 1);
}

#[test]
fn test_write_after_write_on_same_queue_needs_barrier() {
    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let x = builder.create_image("x", storage_desc());
    builder.add_lambda_pass(
        "first",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "second",
        RgQueueType::Compute,
        move |b| {
            b.write_image(x, RgImageState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "read",
        RgQueueType::Compute,
        move |b| {
            b.read_image(x, RgImageState::SHADER_READ_COMPUTE);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let second = sync_of(&graph, "second");
    assert_eq!(second.pre_pass_barrier_count(), 1);
    let barrier = second.barriers.image_barriers[0];
    assert_eq!(barrier.src_state, RgImageState::STORAGE_WRITE_COMPUTE);
    assert_eq!(barrier.dst_state, RgImageState::STORAGE_WRITE_COMPUTE);
    assert!(!barrier.discard);
    assert!(barrier.queue_transfer.is_none());
}

#[test]
fn test_buffer_crosses_queues_with_release_and_acquire() {
    let (mut device, mut frames) = init();

    let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
    let staging = builder.create_buffer(
        "staging",
        RgBufferDesc::new(4096, vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC),
    );
    builder.add_lambda_pass(
        "generate",
        RgQueueType::Compute,
        move |b| {
            b.write_buffer(staging, RgBufferState::STORAGE_WRITE_COMPUTE);
        },
        noop,
    );
    builder.add_lambda_pass(
        "upload",
        RgQueueType::Transfer,
        move |b| {
            b.read_buffer(staging, RgBufferState::TRANSFER_SRC);
            b.force_execution();
        },
        noop,
    );
    let graph = builder.compile().unwrap();

    let generate = sync_of(&graph, "generate");
    let upload = sync_of(&graph, "upload");
    assert_eq!(generate.release_barriers.buffer_barriers.len(), 1);
    assert_eq!(upload.acquire_barriers.buffer_barriers.len(), 1);
    assert!(upload.barriers.buffer_barriers.is_empty());
    let release = generate.release_barriers.buffer_barriers[0];
    assert_eq!(release.src_state, RgBufferState::STORAGE_WRITE_COMPUTE);
    assert_eq!(
        release.queue_transfer,
        Some(RgQueueTransfer {
            src: RgQueueType::Compute,
            dst: RgQueueType::Transfer,
        })
    );
    assert_eq!(upload.acquire_barriers.buffer_barriers[0].dst_state, RgBufferState::TRANSFER_SRC);
    assert_eq!(graph.queue_edges().len(), 1);
    graph.execute(&mut device, &mut frames);

    let compute = device.submissions_on(RgQueueType::Compute).next().unwrap();
    let transfer = device.submissions_on(RgQueueType::Transfer).next().unwrap();
    let release = compute.buffer_barriers().next().unwrap();
    let acquire = transfer.buffer_barriers().next().unwrap();
    assert_eq!((release.src_queue_family, release.dst_queue_family), (1, 2));
    assert_eq!((acquire.src_queue_family, acquire.dst_queue_family), (1, 2));
    assert_eq!(release.buffer, acquire.buffer);
    assert_eq!(compute.signals[0].semaphore, transfer.waits[0].semaphore);
}

fn simulate(b: &mut RgPassBuilder<'_, '_, RgDummyDevice>, h: RgImageHandle) {
    b.write_image(h, RgImageState::STORAGE_WRITE_COMPUTE);
}

fn draw(b: &mut RgPassBuilder<'_, '_, RgDummyDevice>, h: RgImageHandle) {
    b.read_image(h, RgImageState::SHADER_READ_FRAGMENT);
    b.force_execution();
}

/// 跨帧导入的状态与同一帧内连续执行两个 Pass 得到相同的同步
#[test]
fn test_cross_frame_handoff_matches_single_graph() {
    let (mut device, mut frames) = init();
    let desc = storage_desc();
    let physical = device.create_image("particles", &desc);

    // 同一个 graph 中依次执行
    let (combined_release, combined_draw) = {
        let mut state = RgImageExternalState::undefined(1);
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let h = builder.import_image("particles", desc.clone(), physical, &mut state);
        builder.add_lambda_pass("simulate", RgQueueType::Compute, move |b| simulate(b, h), noop);
        builder.add_lambda_pass("draw", RgQueueType::Graphics, move |b| draw(b, h), noop);
        let graph = builder.compile().unwrap();
        (sync_of(&graph, "simulate").release_barriers.clone(), sync_of(&graph, "draw").clone())
    };
    assert_eq!(combined_release.image_barrier_count(), 1);

    // 分成两帧执行
    let mut state = RgImageExternalState::undefined(1);
    {
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let h = builder.import_image("particles", desc.clone(), physical, &mut state);
        builder.add_lambda_pass("simulate", RgQueueType::Compute, move |b| simulate(b, h), noop);
        builder.compile().unwrap().execute(&mut device, &mut frames);
    }
    assert_eq!(
        state.mip(0),
        RgTrackedState::new(RgImageState::STORAGE_WRITE_COMPUTE, Some(RgQueueType::Compute))
    );

    frames.begin_frame(&mut device, 1);
    {
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let h = builder.import_image("particles", desc.clone(), physical, &mut state);
        builder.add_lambda_pass("draw", RgQueueType::Graphics, move |b| draw(b, h), noop);
        let graph = builder.compile().unwrap();

        let frame_draw = sync_of(&graph, "draw");
        assert_eq!(graph.prologue_releases(RgQueueType::Compute), &combined_release);
        assert_eq!(frame_draw.acquire_barriers, combined_draw.acquire_barriers);
        assert_eq!(frame_draw.barriers, combined_draw.barriers);
        assert_eq!(frame_draw.waits.len(), combined_draw.waits.len());
        graph.execute(&mut device, &mut frames);
    }
    assert_eq!(
        state.mip(0),
        RgTrackedState::new(RgImageState::SHADER_READ_FRAGMENT, Some(RgQueueType::Graphics))
    );
}

#[test]
fn test_imported_write_state_is_synchronized_next_frame() {
    let (mut device, mut frames) = init();
    let desc = storage_desc();
    let physical = device.create_image("volume", &desc);

    let second_barriers = {
        let mut state = RgImageExternalState::undefined(1);
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let h = builder.import_image("volume", desc.clone(), physical, &mut state);
        for name in ["inject", "propagate"] {
            builder.add_lambda_pass(
                name,
                RgQueueType::Compute,
                move |b| {
                    b.write_image(h, RgImageState::STORAGE_WRITE_COMPUTE);
                },
                noop,
            );
        }
        let graph = builder.compile().unwrap();
        sync_of(&graph, "propagate").barriers.clone()
    };

    let mut state = RgImageExternalState::undefined(1);
    for (frame_id, name) in ["inject", "propagate"].into_iter().enumerate() {
        if frame_id > 0 {
            frames.begin_frame(&mut device, frame_id as u64);
        }
        let mut builder = RenderGraphBuilder::<RgDummyDevice>::new();
        let h = builder.import_image("volume", desc.clone(), physical, &mut state);
        builder.add_lambda_pass(
            name,
            RgQueueType::Compute,
            move |b| {
                b.write_image(h, RgImageState::STORAGE_WRITE_COMPUTE);
            },
            noop,
        );
        let graph = builder.compile().unwrap();
        if name == "propagate" {
            assert_eq!(sync_of(&graph, name).barriers, second_barriers);
            assert!(graph.queue_edges().is_empty());
        }
        graph.execute(&mut device, &mut frames);
    }

    // 第二帧的写后写 barrier 不丢弃内容
    let barrier = device.submissions[1].image_barriers().next().unwrap();
    assert_eq!(barrier.old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(barrier.src_access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
}
