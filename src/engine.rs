//! Main engine orchestrator
//!
//! [`Engine`] is the application loop around a [`RenderContext`]: it owns
//! the PBR shader, the shared sphere geometry, the default scene and the
//! image-based-lighting textures, and turns them into one uniform map and
//! one draw call per object every frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;

use crate::backend::{CullMode, Device};
use crate::context::{ContextConfig, GraphicsError, RenderContext, UniformMap};
use crate::input::InputState;
use crate::resources::{
    primitives, GeometryDescriptor, PendingTexture, ShaderDescriptor, TextureDescriptor,
    TextureLoader,
};
use crate::scene::{
    setup, Camera, CameraController, DirectionalLight, OrbitController, PointLight, SceneObject,
};
use crate::shader::{pbr_shader, PbrShaderOptions};

/// Configuration for the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Initial viewport width
    pub width: u32,
    /// Initial viewport height
    pub height: u32,
    pub clear_color: [f32; 4],
    pub culling: Option<CullMode>,
    pub sphere_radius: f32,
    /// Horizontal and vertical segments of the sphere mesh
    pub sphere_segments: u32,
    /// Defines the PBR shader is compiled with
    pub shader: PbrShaderOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            culling: None,
            sphere_radius: 0.5,
            sphere_segments: 20,
            shader: PbrShaderOptions {
                light_probe: true,
                ..Default::default()
            },
        }
    }
}

/// User-facing render switches, typically bound to a settings panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderToggles {
    pub diffuse: bool,
    pub specular: bool,
    pub ibl_diffuse: bool,
    pub ibl_specular: bool,
    /// Point lights with an index below this are lit
    pub active_lights: u32,
    /// Replaces every object's albedo when set
    pub albedo: Option<Vec3>,
    /// One-shot: consumed by the next [`Engine::update`]
    pub reset_camera: bool,
}

impl Default for RenderToggles {
    fn default() -> Self {
        Self {
            diffuse: true,
            specular: true,
            ibl_diffuse: true,
            ibl_specular: true,
            active_lights: 4,
            albedo: None,
            reset_camera: false,
        }
    }
}

impl RenderToggles {
    fn write_uniforms(&self, uniforms: &mut UniformMap) {
        uniforms
            .set("enableDiffuse", self.diffuse)
            .set("enableSpecular", self.specular)
            .set("enableIBLDiffuse", self.ibl_diffuse)
            .set("enableIBLSpecular", self.ibl_specular);
    }
}

/// Image-based-lighting inputs of the PBR shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentMap {
    Diffuse,
    Specular,
    BrdfLut,
}

impl EnvironmentMap {
    pub const ALL: [EnvironmentMap; 3] = [
        EnvironmentMap::Diffuse,
        EnvironmentMap::Specular,
        EnvironmentMap::BrdfLut,
    ];

    /// Sampler uniform the map is bound to
    pub fn uniform_name(&self) -> &'static str {
        match self {
            EnvironmentMap::Diffuse => "diffuse_IBL",
            EnvironmentMap::Specular => "specular_IBL",
            EnvironmentMap::BrdfLut => "BRDFIntegrationMap",
        }
    }

    fn index(&self) -> usize {
        match self {
            EnvironmentMap::Diffuse => 0,
            EnvironmentMap::Specular => 1,
            EnvironmentMap::BrdfLut => 2,
        }
    }
}

/// Image files of an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentPaths {
    pub diffuse: PathBuf,
    pub specular: PathBuf,
    pub brdf_lut: PathBuf,
}

impl EnvironmentPaths {
    /// `diffuse-RGBM.png`, `specular-RGBM.png` and `brdf-lut.png` in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            diffuse: dir.join("diffuse-RGBM.png"),
            specular: dir.join("specular-RGBM.png"),
            brdf_lut: dir.join("brdf-lut.png"),
        }
    }

    pub fn path(&self, map: EnvironmentMap) -> &Path {
        match map {
            EnvironmentMap::Diffuse => &self.diffuse,
            EnvironmentMap::Specular => &self.specular,
            EnvironmentMap::BrdfLut => &self.brdf_lut,
        }
    }
}

/// What one call to [`Engine::render`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub objects: usize,
    pub draw_calls: u64,
    pub draws_skipped: u64,
    pub textures_bound: u64,
    pub uniforms_rejected: u64,
}

/// The main engine
pub struct Engine<D: Device> {
    context: RenderContext<D>,
    config: EngineConfig,
    shader: ShaderDescriptor,
    sphere: Arc<GeometryDescriptor>,
    objects: Vec<SceneObject>,
    lights: Vec<PointLight>,
    directional_lights: Vec<DirectionalLight>,
    camera: Camera,
    controller: OrbitController,
    environment: [Option<TextureDescriptor>; 3],
    pending: Vec<(EnvironmentMap, PendingTexture)>,
    uniforms: UniformMap,
    pub toggles: RenderToggles,
}

impl<D: Device> Engine<D> {
    /// Build the default scene on `device`. Nothing is uploaded until
    /// [`Engine::init`].
    pub fn new(device: D, config: EngineConfig) -> Result<Self, GraphicsError> {
        let context = RenderContext::with_config(
            device,
            ContextConfig {
                clear_color: config.clear_color,
                depth_test: true,
                culling: config.culling,
            },
        );
        let sphere = Arc::new(
            GeometryDescriptor::new(primitives::sphere(
                config.sphere_radius,
                config.sphere_segments,
                config.sphere_segments,
            ))?
            .with_label("sphere"),
        );
        let mut engine = Self {
            context,
            shader: pbr_shader(config.shader),
            objects: setup::sphere_grid(Arc::clone(&sphere)),
            lights: setup::default_point_lights(),
            directional_lights: Vec::new(),
            sphere,
            camera: Camera::default(),
            controller: OrbitController::new(Vec3::new(0.0, 0.0, setup::GRID_DEPTH)),
            environment: [None, None, None],
            pending: Vec::new(),
            uniforms: UniformMap::new(),
            toggles: RenderToggles::default(),
            config,
        };
        engine.resize(engine.config.width, engine.config.height);
        Ok(engine)
    }

    /// Upload the sphere and compile the shader.
    pub fn init(&mut self) -> Result<(), GraphicsError> {
        self.context.upload_geometry(&self.sphere)?;
        self.context.compile_program(&self.shader)?;
        log::info!(
            "Engine initialized: {} objects, {} point lights",
            self.objects.len(),
            self.lights.len()
        );
        Ok(())
    }

    /// Start decoding the environment maps in the background. Objects are
    /// drawn without them until they arrive.
    pub fn request_environment(&mut self, paths: &EnvironmentPaths) {
        for map in EnvironmentMap::ALL {
            log::debug!("Loading {:?} environment map from {}", map, paths.path(map).display());
            self.pending.push((map, TextureLoader::spawn(paths.path(map))));
        }
    }

    /// Upload an already decoded environment map, replacing the current one.
    pub fn set_environment_map(
        &mut self,
        map: EnvironmentMap,
        texture: TextureDescriptor,
    ) -> Result<(), GraphicsError> {
        self.context.upload_texture(&texture)?;
        if let Some(previous) = self.environment[map.index()].replace(texture) {
            self.context.destroy_texture(&previous);
        }
        Ok(())
    }

    pub fn environment_map(&self, map: EnvironmentMap) -> Option<&TextureDescriptor> {
        self.environment[map.index()].as_ref()
    }

    /// Number of environment maps still decoding
    pub fn pending_environment_maps(&self) -> usize {
        self.pending.len()
    }

    /// Apply input and collect finished texture decodes.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        if std::mem::take(&mut self.toggles.reset_camera) {
            self.controller.reset(&mut self.camera);
        }
        self.controller.update(&mut self.camera, input, dt);
        self.poll_environment();
    }

    fn poll_environment(&mut self) {
        let mut finished = Vec::new();
        self.pending.retain_mut(|(map, pending)| match pending.poll() {
            Some(result) => {
                finished.push((*map, result));
                false
            }
            None => true,
        });
        for (map, result) in finished {
            match result {
                Ok(texture) => {
                    let texture = texture.with_label(map.uniform_name());
                    if let Err(err) = self.set_environment_map(map, texture) {
                        log::error!("Failed to upload {map:?} environment map: {err}");
                    }
                }
                Err(err) => log::warn!("Environment map {map:?} unavailable: {err}"),
            }
        }
    }

    /// Draw every object.
    pub fn render(&mut self) -> FrameStats {
        let before = self.context.stats();

        self.context.clear();
        self.context.set_depth_test(true);

        self.uniforms.clear();
        self.toggles.write_uniforms(&mut self.uniforms);
        self.camera.write_uniforms(&mut self.uniforms);
        for (i, light) in self.lights.iter().enumerate() {
            light.write_uniforms(i, (i as u32) < self.toggles.active_lights, &mut self.uniforms);
        }
        for (i, light) in self.directional_lights.iter().enumerate() {
            light.write_uniforms(i, &mut self.uniforms);
        }
        for map in EnvironmentMap::ALL {
            if let Some(texture) = &self.environment[map.index()] {
                self.uniforms.set_texture(map.uniform_name(), texture);
            }
        }

        let view_projection = self.camera.view_projection_matrix();
        for object in &self.objects {
            object.write_uniforms(view_projection, &mut self.uniforms);
            if let Some(albedo) = self.toggles.albedo {
                self.uniforms.set("uMaterial.albedo", albedo);
            }
            // Failures are logged by the context; the frame goes on.
            let _ = self.context.draw(&object.geometry, &self.shader, &self.uniforms);
        }

        let after = self.context.stats();
        FrameStats {
            objects: self.objects.len(),
            draw_calls: after.draw_calls - before.draw_calls,
            draws_skipped: after.draws_skipped - before.draws_skipped,
            textures_bound: after.textures_bound - before.textures_bound,
            uniforms_rejected: after.uniforms_rejected - before.uniforms_rejected,
        }
    }

    /// Update the viewport and the camera aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.context.resize(width, height);
        self.camera.set_viewport(width, height);
    }

    /// Recompile the shader with new options. The previous program is gone
    /// even if the new one fails to compile.
    pub fn set_shader_options(&mut self, options: PbrShaderOptions) -> Result<(), GraphicsError> {
        self.config.shader = options;
        options.apply(&mut self.shader);
        self.context.compile_program(&self.shader)
    }

    pub fn add_directional_light(&mut self, light: DirectionalLight) {
        self.directional_lights.push(light);
    }

    /// Release every GPU object the engine created.
    pub fn destroy(&mut self) {
        for texture in self.environment.iter_mut().filter_map(Option::take) {
            self.context.destroy_texture(&texture);
        }
        self.context.destroy_program(&self.shader);
        self.context.destroy_geometry(&self.sphere);
    }

    pub fn context(&self) -> &RenderContext<D> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext<D> {
        &mut self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shader(&self) -> &ShaderDescriptor {
        &self.shader
    }

    pub fn sphere(&self) -> &Arc<GeometryDescriptor> {
        &self.sphere
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut Vec<SceneObject> {
        &mut self.objects
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut Vec<PointLight> {
        &mut self.lights
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn controller_mut(&mut self) -> &mut OrbitController {
        &mut self.controller
    }
}
