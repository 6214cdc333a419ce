pub fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn buf_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Per-frame inputs: camera, visibility list and kernel parameters.
pub fn frame_group_lay(
    device: &wgpu::Device,
    camera_bind: u32,
    indices_bind: u32,
    params_bind: u32,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Frame inputs"),
        entries: &[
            uniform_entry(camera_bind),
            buf_entry(indices_bind, true),
            uniform_entry(params_bind),
        ],
    })
}

/// Scene inputs, constant for a session: shapes, lights and texels.
pub fn scene_group_lay(
    device: &wgpu::Device,
    shapes_bind: u32,
    lights_bind: u32,
    texture_bind: u32,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Scene inputs"),
        entries: &[
            buf_entry(shapes_bind, true),
            buf_entry(lights_bind, true),
            buf_entry(texture_bind, true),
        ],
    })
}

/// Per-pixel slots the kernel writes: rays, intersections, base colours, packed output.
pub fn slots_group_lay(
    device: &wgpu::Device,
    rays_bind: u32,
    hit_bind: u32,
    pixels_bind: u32,
    rgb_bind: u32,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Pixel slots"),
        entries: &[
            buf_entry(rays_bind, false),
            buf_entry(hit_bind, false),
            buf_entry(pixels_bind, false),
            buf_entry(rgb_bind, false),
        ],
    })
}

pub fn bind_group_from(
    device: &wgpu::Device,
    label: &str,
    buffers: &[(u32, &wgpu::Buffer)],
    layout: &wgpu::BindGroupLayout,
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = buffers
        .iter()
        .map(|&(binding, buffer)| wgpu::BindGroupEntry {
            binding,
            resource: buffer.as_entire_binding(),
        })
        .collect();

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}
