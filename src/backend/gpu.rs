use std::iter;

use wgpu::{include_wgsl, util::DeviceExt};

use super::SceneBuffers;
use crate::binding;
use crate::camera::Camera;
use crate::config::{SIZE_OF_CAMERA, SIZE_OF_PIXEL};
use crate::error::RenderError;
use crate::intersection::{Intersection, Ray};

/// Camera floats padded to whole `vec4`s for the uniform buffer.
const CAMERA_UNIFORM_LEN: usize = SIZE_OF_CAMERA.div_ceil(4) * 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    width: u32,
    height: u32,
    texture_width: u32,
    texture_height: u32,
    lights_len: u32,
    _pad0: [u32; 3],
}

const _: () = assert!(std::mem::size_of::<KernelParams>() % 16 == 0);

/// Runs the kernel as a wgpu compute shader.
pub struct GpuBackend {
    // Wgpu objects
    device: wgpu::Device,
    queue: wgpu::Queue,
    compute_pipeline: wgpu::ComputePipeline,
    frame_lay: wgpu::BindGroupLayout,
    scene_lay: wgpu::BindGroupLayout,
    slots_lay: wgpu::BindGroupLayout,

    // Frame inputs
    camera_uniform: wgpu::Buffer,
    params_uniform: wgpu::Buffer,
    indices_buf: Option<wgpu::Buffer>,
    frame_grp: Option<wgpu::BindGroup>,
    // Scene inputs
    shapes_buf: Option<wgpu::Buffer>,
    lights_buf: Option<wgpu::Buffer>,
    texture_buf: Option<wgpu::Buffer>,
    scene_grp: Option<wgpu::BindGroup>,
    // Per-pixel slots
    rays_buf: Option<wgpu::Buffer>,
    hit_buf: Option<wgpu::Buffer>,
    pixels_buf: Option<wgpu::Buffer>,
    rgb_buf: Option<wgpu::Buffer>,
    staging_buf: Option<wgpu::Buffer>,
    slots_grp: Option<wgpu::BindGroup>,

    width: u32,
    height: u32,
}

impl GpuBackend {
    const CAMERA_UNIFORM_BIND: u32 = 0;
    const INDICES_BUF_BIND: u32 = 1;
    const PARAMS_UNIFORM_BIND: u32 = 2;

    const SHAPES_BUF_BIND: u32 = 0;
    const LIGHTS_BUF_BIND: u32 = 1;
    const TEXTURE_BUF_BIND: u32 = 2;

    const RAYS_BUF_BIND: u32 = 0;
    const HIT_REC_BUF_BIND: u32 = 1;
    const PIXELS_BUF_BIND: u32 = 2;
    const RGB_BUF_BIND: u32 = 3;

    const WORKGROUP_SIZE: u32 = 8;

    pub async fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;
        log::info!("GPU backend on {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ray caster device"),
                    ..Default::default()
                },
                None,
            )
            .await?;

        Ok(Self::from_device(device, queue, width, height))
    }

    /// Builds the pipeline on an existing device, e.g. the one presenting to the window.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let frame_lay = binding::frame_group_lay(
            &device,
            Self::CAMERA_UNIFORM_BIND,
            Self::INDICES_BUF_BIND,
            Self::PARAMS_UNIFORM_BIND,
        );
        let scene_lay = binding::scene_group_lay(
            &device,
            Self::SHAPES_BUF_BIND,
            Self::LIGHTS_BUF_BIND,
            Self::TEXTURE_BUF_BIND,
        );
        let slots_lay = binding::slots_group_lay(
            &device,
            Self::RAYS_BUF_BIND,
            Self::HIT_REC_BUF_BIND,
            Self::PIXELS_BUF_BIND,
            Self::RGB_BUF_BIND,
        );

        let compute_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ray cast pipeline layout"),
            bind_group_layouts: &[&frame_lay, &scene_lay, &slots_lay],
            push_constant_ranges: &[],
        });

        let shader_mod = device.create_shader_module(include_wgsl!("../shaders/raycast.wgsl"));
        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Ray cast pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &shader_mod,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let camera_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera uniform"),
            size: (CAMERA_UNIFORM_LEN * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel params uniform"),
            size: std::mem::size_of::<KernelParams>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            compute_pipeline,
            frame_lay,
            scene_lay,
            slots_lay,
            camera_uniform,
            params_uniform,
            indices_buf: None,
            frame_grp: None,
            shapes_buf: None,
            lights_buf: None,
            texture_buf: None,
            scene_grp: None,
            rays_buf: None,
            hit_buf: None,
            pixels_buf: None,
            rgb_buf: None,
            staging_buf: None,
            slots_grp: None,
            width,
            height,
        }
    }

    pub fn num_rays(&self) -> u32 {
        self.width * self.height
    }

    fn storage_buf(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Zero-sized bindings are invalid, so empty tagged buffers get one zero float.
    fn tagged_buf(&self, label: &str, values: &[f32]) -> wgpu::Buffer {
        if values.is_empty() {
            self.storage_buf(label, bytemuck::cast_slice(&[0.0_f32]))
        } else {
            self.storage_buf(label, bytemuck::cast_slice(values))
        }
    }

    fn replace(slot: &mut Option<wgpu::Buffer>, buffer: wgpu::Buffer) {
        if let Some(old) = slot.replace(buffer) {
            old.destroy();
        }
    }

    fn create_scene_bufs(&mut self, scene: &SceneBuffers<'_>) {
        let shapes = self.tagged_buf("Shapes", scene.shapes);
        let lights = self.tagged_buf("Lights", scene.lights);
        let texture = self.storage_buf("Texture", bytemuck::cast_slice(scene.texture.data()));

        self.scene_grp = Some(binding::bind_group_from(
            &self.device,
            "Scene inputs",
            &[
                (Self::SHAPES_BUF_BIND, &shapes),
                (Self::LIGHTS_BUF_BIND, &lights),
                (Self::TEXTURE_BUF_BIND, &texture),
            ],
            &self.scene_lay,
        ));
        Self::replace(&mut self.shapes_buf, shapes);
        Self::replace(&mut self.lights_buf, lights);
        Self::replace(&mut self.texture_buf, texture);
    }

    fn create_slot_bufs(&mut self) {
        let num_rays = self.num_rays() as usize;

        let rays = self.storage_buf("Ray buffer", bytemuck::cast_slice(&vec![Ray::default(); num_rays]));
        let hits = self.storage_buf(
            "Hit rec buffer",
            bytemuck::cast_slice(&vec![Intersection::MISS; num_rays]),
        );
        let pixels = self.storage_buf(
            "Pixel buffer",
            bytemuck::cast_slice(&vec![0.0_f32; num_rays * SIZE_OF_PIXEL]),
        );
        let rgb_size = (num_rays * std::mem::size_of::<u32>()) as wgpu::BufferAddress;
        let rgb = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("RGB buffer"),
            size: rgb_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("RGB staging buffer"),
            size: rgb_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        self.slots_grp = Some(binding::bind_group_from(
            &self.device,
            "Pixel slots",
            &[
                (Self::RAYS_BUF_BIND, &rays),
                (Self::HIT_REC_BUF_BIND, &hits),
                (Self::PIXELS_BUF_BIND, &pixels),
                (Self::RGB_BUF_BIND, &rgb),
            ],
            &self.slots_lay,
        ));
        Self::replace(&mut self.rays_buf, rays);
        Self::replace(&mut self.hit_buf, hits);
        Self::replace(&mut self.pixels_buf, pixels);
        Self::replace(&mut self.rgb_buf, rgb);
        Self::replace(&mut self.staging_buf, staging);
    }

    pub fn put_scene(&mut self, scene: &SceneBuffers<'_>) {
        self.create_scene_bufs(scene);
        self.create_slot_bufs();

        let params = KernelParams {
            width: self.width,
            height: self.height,
            texture_width: scene.texture.width(),
            texture_height: scene.texture.height(),
            lights_len: scene.lights.len() as u32,
            _pad0: [0; 3],
        };
        self.queue
            .write_buffer(&self.params_uniform, 0, bytemuck::bytes_of(&params));
        log::debug!(
            "Uploaded {} shape floats, {} light floats, {} rays",
            scene.shapes.len(),
            scene.lights.len(),
            self.num_rays()
        );
    }

    pub fn put_frame(&mut self, camera: &Camera, shape_indices: &[i32]) {
        let mut camera_values = [0.0_f32; CAMERA_UNIFORM_LEN];
        camera_values[..SIZE_OF_CAMERA].copy_from_slice(camera.as_slice());
        self.queue
            .write_buffer(&self.camera_uniform, 0, bytemuck::cast_slice(&camera_values));

        let indices_size = std::mem::size_of_val(shape_indices) as wgpu::BufferAddress;
        match self.indices_buf.as_ref() {
            Some(buf) if buf.size() == indices_size => {
                self.queue
                    .write_buffer(buf, 0, bytemuck::cast_slice(shape_indices));
            }
            _ => {
                let buf = self.storage_buf("Shape indices", bytemuck::cast_slice(shape_indices));
                self.frame_grp = Some(binding::bind_group_from(
                    &self.device,
                    "Frame inputs",
                    &[
                        (Self::CAMERA_UNIFORM_BIND, &self.camera_uniform),
                        (Self::INDICES_BUF_BIND, &buf),
                        (Self::PARAMS_UNIFORM_BIND, &self.params_uniform),
                    ],
                    &self.frame_lay,
                ));
                Self::replace(&mut self.indices_buf, buf);
            }
        }
    }

    pub fn execute(&mut self) -> Result<(), RenderError> {
        let (Some(frame_grp), Some(scene_grp), Some(slots_grp)) =
            (&self.frame_grp, &self.scene_grp, &self.slots_grp)
        else {
            return Err(RenderError::SceneNotUploaded);
        };
        let (Some(rgb_buf), Some(staging_buf)) = (&self.rgb_buf, &self.staging_buf) else {
            return Err(RenderError::SceneNotUploaded);
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ray cast encoder"),
            });

        let workgrp_x = self.width.div_ceil(Self::WORKGROUP_SIZE);
        let workgrp_y = self.height.div_ceil(Self::WORKGROUP_SIZE);

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Ray cast pass"),
            ..Default::default()
        });
        compute_pass.set_pipeline(&self.compute_pipeline);
        compute_pass.set_bind_group(0, frame_grp, &[]);
        compute_pass.set_bind_group(1, scene_grp, &[]);
        compute_pass.set_bind_group(2, slots_grp, &[]);
        compute_pass.dispatch_workgroups(workgrp_x, workgrp_y, 1);
        std::mem::drop(compute_pass);

        encoder.copy_buffer_to_buffer(rgb_buf, 0, staging_buf, 0, rgb_buf.size());

        self.queue.submit(iter::once(encoder.finish()));
        Ok(())
    }

    pub async fn get_output(&self, rgb: &mut [u32]) -> Result<(), RenderError> {
        let staging_buf = self
            .staging_buf
            .as_ref()
            .ok_or(RenderError::SceneNotUploaded)?;
        let expected = self.num_rays() as usize;
        if rgb.len() != expected {
            return Err(RenderError::OutputSize {
                expected,
                actual: rgb.len(),
            });
        }

        let slice = staging_buf.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        // The browser resolves the mapping on its own event loop.
        #[cfg(not(target_arch = "wasm32"))]
        let _ = self.device.poll(wgpu::Maintain::Wait);

        receiver.await.map_err(|_| RenderError::MapCancelled)??;
        {
            let data = slice.get_mapped_range();
            rgb.copy_from_slice(bytemuck::cast_slice(&data[..]));
        }
        staging_buf.unmap();
        Ok(())
    }
}

impl Drop for GpuBackend {
    fn drop(&mut self) {
        let bufs = [
            &self.indices_buf,
            &self.shapes_buf,
            &self.lights_buf,
            &self.texture_buf,
            &self.rays_buf,
            &self.hit_buf,
            &self.pixels_buf,
            &self.rgb_buf,
            &self.staging_buf,
        ];
        for buf in bufs.into_iter().flatten() {
            buf.destroy();
        }
        self.camera_uniform.destroy();
        self.params_uniform.destroy();
    }
}
