use std::time::Duration;

use anyhow::{Context, Result};
use glam::{Vec3, Vec4};

use ember_engine::camera::{Camera, FpsCameraController, MovementInput};
use ember_engine::device::{GpuContext, GpuSettings};
use ember_engine::logging::{LoggingConfig, init_logging};
use ember_engine::render::{
    FrameRenderer, ImageData, MaterialManager, MaterialProperties, RenderableKind, Skybox,
};
use ember_engine::scene::{Component, RenderComponent, Scene, Transform};
use ember_engine::shader::{MESH_PATH, SKYBOX_PATH, ShaderCache, ShaderDesc};
use ember_engine::time::FrameClock;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;
const DEFAULT_FRAMES: u32 = 120;

/// Rotates its object at a fixed rate, in degrees per second.
struct Spin(Vec3);

impl Component for Spin {
    fn update(&mut self, transform: &mut Transform, dt: f32) {
        transform.rotate(self.0 * dt);
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let frames = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u32>()
            .with_context(|| format!("frame count `{arg}` is not a number"))?,
        None => DEFAULT_FRAMES,
    };

    let settings = GpuSettings::default().with_env_overrides();
    let mut ctx = GpuContext::initialize(&settings).context("creating GPU context")?;

    let mut shaders = ShaderCache::with_builtin_sources();
    shaders
        .warm(&[
            ShaderDesc::vertex(MESH_PATH),
            ShaderDesc::fragment(MESH_PATH),
            ShaderDesc::vertex(SKYBOX_PATH),
            ShaderDesc::fragment(SKYBOX_PATH),
        ])
        .context("warming shader cache")?;
    shaders
        .create_default_pipelines(&ctx)
        .context("creating default pipelines")?;

    let mut materials = MaterialManager::new(&mut ctx, &mut shaders).context("creating materials")?;
    let floor = materials.create_material(
        &ctx,
        &mut shaders,
        "floor",
        MaterialProperties::default().with_albedo(Vec4::new(0.35, 0.4, 0.35, 1.0)),
        None,
    )?;

    let mut scene = build_scene();
    if let Some(plane) = scene.find_game_object_mut("floor") {
        if let Some(render) = plane.get_component_mut::<RenderComponent>() {
            render.set_material(Some(floor));
        }
    }
    scene
        .initialize_render_components(&mut ctx, &mut shaders, Some(&materials))
        .context("initializing render components")?;

    let mut skybox = Skybox::new(&mut ctx, &mut shaders, &ImageData::solid_cube([40, 60, 110, 255]))
        .context("creating skybox")?;

    let mut camera = Camera::new();
    camera.set_position(Vec3::new(0.0, 2.0, -6.0));
    camera.look_at(Vec3::ZERO, Vec3::Y);
    camera.update_aspect(WIDTH as f32 / HEIGHT as f32);
    let controller = FpsCameraController::default();
    let drift = MovementInput {
        right: true,
        ..Default::default()
    };

    let mut renderer = FrameRenderer::new(&ctx, WIDTH, HEIGHT)?;
    let mut clock = FrameClock::with_clamps(Duration::from_micros(100), Duration::from_millis(100));

    scene.start();
    for _ in 0..frames {
        let time = clock.tick();
        scene.update(time.dt);
        scene.late_update(time.dt);
        controller.process_keyboard(&mut camera, drift, time.dt * 0.1);

        let stats = renderer
            .render(&mut ctx, &mut scene, &camera, Some(&mut skybox))
            .context("rendering frame")?;
        log::debug!(
            "frame {} slot {} fence {} (waited for {})",
            stats.frame_number,
            stats.frame_index,
            stats.fence,
            stats.waited_for
        );
    }
    ctx.wait_for_gpu()?;

    log::info!(
        "rendered {frames} frames at ~{:.1} fps, {} descriptors used, {} shaders compiled",
        clock.fps(),
        ctx.descriptors_allocated(),
        shaders.compilation_count()
    );

    skybox.shutdown(&mut ctx);
    scene.release_retired(&mut ctx);
    for object in scene.game_objects_mut() {
        if let Some(render) = object.get_component_mut::<RenderComponent>() {
            render.release(&mut ctx);
        }
    }
    Ok(())
}

fn build_scene() -> Scene {
    let mut scene = Scene::new();

    let triangle = scene.create_game_object("triangle");
    triangle.transform = Transform::from_position(Vec3::new(-1.5, 0.5, 0.0));
    triangle.add_component(RenderComponent::new(RenderableKind::Triangle));
    triangle.add_component(Spin(Vec3::new(0.0, 90.0, 0.0)));

    let cube = scene.create_game_object("cube");
    cube.transform = Transform::from_position(Vec3::new(1.5, 0.5, 0.0));
    cube.add_component(RenderComponent::new(RenderableKind::Cube));
    cube.add_component(Spin(Vec3::new(30.0, 45.0, 0.0)));

    let floor = scene.create_game_object("floor");
    floor.transform = Transform::from_position(Vec3::new(0.0, -0.5, 0.0)).with_scale(Vec3::splat(8.0));
    floor.add_component(RenderComponent::new(RenderableKind::Plane));

    scene
}
