//! Tests that need a real device.
//!
//! Each test requests an adapter first and returns early when none is
//! available, so the suite still passes on machines without a GPU.

use std::borrow::Cow;
use std::sync::Arc;

use glam::Vec3;

use ember_engine::Error;
use ember_engine::camera::Camera;
use ember_engine::device::{GpuContext, GpuSettings};
use ember_engine::render::{
    ConstantRing, FrameRenderer, GeometryDescriptor, GeometryRegistry, ImageData, MaterialManager,
    MeshShading, ObjectConstants, RenderableKind, Skybox, Texture, layouts,
};
use ember_engine::scene::{RenderComponent, Scene, Transform};
use ember_engine::shader::{DefaultPipeline, ShaderCache};

fn gpu() -> Option<(GpuContext, ShaderCache)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let settings = GpuSettings {
        enable_debug_layer: false,
        ..GpuSettings::default()
    };
    match GpuContext::initialize(&settings) {
        Ok(ctx) => Some((ctx, ShaderCache::with_builtin_sources())),
        Err(err) => {
            eprintln!("no GPU adapter available, skipping: {err}");
            None
        }
    }
}

fn broken_registry() -> Arc<GeometryRegistry> {
    let mut registry = GeometryRegistry::builtin();
    let mut cube = GeometryDescriptor::cube();
    cube.shading = MeshShading {
        pipeline_name: Cow::Borrowed("test/broken"),
        source_path: Cow::Borrowed("missing/broken.wgsl"),
        macros: Vec::new(),
    };
    registry.register(RenderableKind::Cube, cube);
    Arc::new(registry)
}

// ── context ──────────────────────────────────────────────────────────────

#[test]
fn fence_values_increase_and_complete() {
    let Some((mut ctx, _)) = gpu() else { return };
    let a = ctx.signal();
    let b = ctx.signal();
    assert!(b > a);
    ctx.wait_for_fence(b).unwrap();
    assert!(ctx.completed_fence_value() >= b);
    // waiting again is a no-op
    ctx.wait_for_fence(a).unwrap();
}

#[test]
fn waiting_on_unsignaled_fence_is_rejected() {
    let Some((mut ctx, _)) = gpu() else { return };
    let future = ctx.last_signaled_fence_value() + 10;
    assert!(matches!(ctx.wait_for_fence(future), Err(Error::Configuration(_))));
}

#[test]
fn descriptor_indices_are_never_reused() {
    let Some((mut ctx, _)) = gpu() else { return };
    let a = ctx.allocate_descriptor().unwrap();
    ctx.retire_descriptor(a);
    let b = ctx.allocate_descriptor().unwrap();
    assert!(b.index() > a.index());
    assert!(ctx.descriptor(a).is_none());
}

// ── shader cache ─────────────────────────────────────────────────────────

#[test]
fn default_pipelines_are_created_once() {
    let Some((ctx, mut shaders)) = gpu() else { return };
    shaders.create_default_pipelines(&ctx).unwrap();
    let count = shaders.pipeline_count();
    let compiled = shaders.compilation_count();
    shaders.create_default_pipelines(&ctx).unwrap();
    assert_eq!(shaders.pipeline_count(), count);
    assert_eq!(shaders.compilation_count(), compiled);

    let unlit = shaders.default_pipeline(DefaultPipeline::Unlit).unwrap();
    let colored = shaders.default_pipeline(DefaultPipeline::VertexColor).unwrap();
    assert!(!Arc::ptr_eq(&unlit, &colored));
}

#[test]
fn removed_pipeline_name_can_be_reused() {
    let Some((ctx, mut shaders)) = gpu() else { return };
    shaders.create_default_pipelines(&ctx).unwrap();
    let name = DefaultPipeline::Unlit.name();
    assert!(shaders.remove_pipeline_state(name));
    assert!(!shaders.has_pipeline_state(name));
    shaders.create_default_pipelines(&ctx).unwrap();
    assert!(shaders.has_pipeline_state(name));
}

// ── constant ring ────────────────────────────────────────────────────────

#[test]
fn ring_slots_are_aligned_and_disjoint() {
    let Some((ctx, _)) = gpu() else { return };
    let mut ring = ConstantRing::<ObjectConstants>::new("test ring");
    ring.initialize(&ctx, 3).unwrap();
    assert!(ring.is_valid());

    let align = ctx.device().limits().min_uniform_buffer_offset_alignment;
    let size = std::mem::size_of::<ObjectConstants>() as u64;
    let slots: Vec<_> = (0..3).map(|k| ring.gpu_address(k).unwrap()).collect();
    for (k, slot) in slots.iter().enumerate() {
        assert_eq!(slot.offset % align, 0);
        for other in slots.iter().skip(k + 1) {
            let (a, b) = (slot.offset as u64, other.offset as u64);
            assert!(a + size <= b || b + size <= a);
        }
    }

    let data = ObjectConstants::new(glam::Mat4::IDENTITY, glam::Mat4::IDENTITY);
    ring.update_data(ctx.queue(), 2, &data).unwrap();
    assert!(ring.update_data(ctx.queue(), 3, &data).is_err());
    assert!(ring.gpu_address(3).is_none());
}

// ── textures ─────────────────────────────────────────────────────────────

#[test]
fn texture_with_unaligned_rows_uploads() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let layout = layouts::texture_2d_layout(&ctx, &mut shaders);
    let image = ImageData::new(3, 2, vec![200; 24]);
    let texture = Texture::upload(&mut ctx, "odd", &image, &layout).unwrap();
    assert_eq!(texture.size(), (3, 2));
    assert!(ctx.descriptor(texture.descriptor()).is_some());
    texture.release(&mut ctx);
    assert!(ctx.descriptor(texture.descriptor()).is_none());
}

// ── render component ─────────────────────────────────────────────────────

#[test]
fn kind_switch_releases_old_renderer_first() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let mut component = RenderComponent::new(RenderableKind::Triangle);
    component.initialize(&mut ctx, &mut shaders).unwrap();
    assert!(component.is_valid());
    let old = component.renderer().unwrap().frame_descriptor();

    component
        .set_renderable_kind(RenderableKind::Cube, &mut ctx, &mut shaders)
        .unwrap();

    assert!(ctx.descriptor(old).is_none(), "triangle bind group still live");
    assert!(component.is_valid());
    assert_eq!(component.kind(), RenderableKind::Cube);
    assert_eq!(component.renderer().unwrap().label(), "cube");
}

#[test]
fn failed_rebuild_leaves_component_invalid() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let mut component = RenderComponent::with_registry(RenderableKind::Triangle, broken_registry());
    component.initialize(&mut ctx, &mut shaders).unwrap();
    let old = component.renderer().unwrap().frame_descriptor();

    let err = component
        .set_renderable_kind(RenderableKind::Cube, &mut ctx, &mut shaders)
        .unwrap_err();

    assert!(matches!(err, Error::ShaderCompilation { .. }), "{err}");
    assert!(!component.is_valid());
    assert!(component.renderer().is_none());
    assert_eq!(component.kind(), RenderableKind::Cube);
    assert!(ctx.descriptor(old).is_none());

    component
        .set_renderable_kind(RenderableKind::Triangle, &mut ctx, &mut shaders)
        .unwrap();
    assert!(component.is_valid());
}

#[test]
fn repeated_kind_switches_bound_descriptor_growth() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let mut component = RenderComponent::new(RenderableKind::Triangle);
    component.initialize(&mut ctx, &mut shaders).unwrap();

    let before = ctx.descriptors_allocated();
    let switches = 20;
    for i in 0..switches {
        let kind = if i % 2 == 0 { RenderableKind::Cube } else { RenderableKind::Triangle };
        component.set_renderable_kind(kind, &mut ctx, &mut shaders).unwrap();
    }
    let grown = ctx.descriptors_allocated() - before;
    assert!(grown <= switches, "{grown} slots for {switches} switches");
    assert!(ctx.descriptors_allocated() <= ctx.descriptor_capacity());
}

#[test]
fn destroyed_object_returns_its_descriptor_slot() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let mut scene = Scene::new();
    let id = scene
        .create_game_object("doomed")
        .add_component(RenderComponent::new(RenderableKind::Cube))
        .id();
    scene.initialize_render_components(&mut ctx, &mut shaders, None).unwrap();
    let handle = scene
        .get_mut(id)
        .and_then(|o| o.get_component_mut::<RenderComponent>())
        .and_then(|r| r.renderer().map(|m| m.frame_descriptor()))
        .unwrap();

    assert!(scene.destroy_game_object(id));
    assert_eq!(scene.retired_count(), 1);
    assert_eq!(scene.release_retired(&mut ctx), 1);
    assert!(ctx.descriptor(handle).is_none(), "slot still holds a bind group");
    assert_eq!(scene.retired_count(), 0);
}

#[test]
fn frame_loop_releases_renderers_of_queued_destroys() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let mut scene = Scene::new();
    let id = scene
        .create_game_object("doomed")
        .add_component(RenderComponent::new(RenderableKind::Triangle))
        .id();
    scene.initialize_render_components(&mut ctx, &mut shaders, None).unwrap();
    let handle = scene
        .get(id)
        .and_then(|o| o.get_component::<RenderComponent>())
        .and_then(|r| r.renderer().map(|m| m.frame_descriptor()))
        .unwrap();

    scene.queue_destroy(id);
    scene.late_update(0.016);
    assert!(scene.get(id).is_none());

    let mut renderer = FrameRenderer::new(&ctx, 16, 16).unwrap();
    renderer.render(&mut ctx, &mut scene, &Camera::new(), None).unwrap();
    assert!(ctx.descriptor(handle).is_none());
    assert_eq!(scene.retired_count(), 0);
}

// ── skybox ───────────────────────────────────────────────────────────────

#[test]
fn malformed_cubemap_consumes_no_descriptor_slots() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let before = ctx.descriptors_allocated();
    let short = ImageData {
        width: 1,
        height: 1,
        layers: 6,
        pixels: vec![0; 5],
    };

    let result = Skybox::new(&mut ctx, &mut shaders, &short);

    assert!(matches!(result, Err(Error::ResourceCreation { .. })));
    assert_eq!(ctx.descriptors_allocated(), before);
}

// ── frame loop ───────────────────────────────────────────────────────────

#[test]
fn frames_cycle_ring_slots_and_wait_on_reuse() {
    let Some((mut ctx, mut shaders)) = gpu() else { return };
    let materials = MaterialManager::new(&mut ctx, &mut shaders).unwrap();

    let mut scene = Scene::new();
    let cube = scene.create_game_object("cube");
    cube.transform = Transform::from_position(Vec3::new(0.0, 0.0, 0.0));
    cube.add_component(RenderComponent::new(RenderableKind::Cube));
    let plane = scene.create_game_object("plane");
    plane.add_component(RenderComponent::new(RenderableKind::Plane));
    scene
        .initialize_render_components(&mut ctx, &mut shaders, Some(&materials))
        .unwrap();

    let mut skybox = Skybox::new(&mut ctx, &mut shaders, &ImageData::solid_cube([0, 0, 255, 255])).unwrap();
    let mut camera = Camera::new();
    camera.set_position(Vec3::new(0.0, 1.0, -4.0));
    camera.look_at(Vec3::ZERO, Vec3::Y);

    let frames_in_flight = ctx.frames_in_flight();
    let mut renderer = FrameRenderer::new(&ctx, 64, 64).unwrap();
    let mut fences = Vec::new();
    for n in 0..(frames_in_flight * 3) {
        scene.update(0.016);
        scene.late_update(0.016);
        let stats = renderer
            .render(&mut ctx, &mut scene, &camera, Some(&mut skybox))
            .unwrap();
        assert_eq!(stats.frame_index, n % frames_in_flight);
        if n >= frames_in_flight {
            assert_eq!(stats.waited_for, fences[(n - frames_in_flight) as usize]);
        } else {
            assert_eq!(stats.waited_for, 0);
        }
        fences.push(stats.fence);
    }
    assert!(fences.windows(2).all(|w| w[0] < w[1]));

    ctx.wait_for_gpu().unwrap();
    skybox.shutdown(&mut ctx);
    assert!(!skybox.is_valid());
}
