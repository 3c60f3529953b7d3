use wgpu::util::DeviceExt;

/// Ambient plus one directional light, bound to group 2 of the PBR pipeline.
#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    // rgb colour, w is the intensity
    pub ambient: [f32; 4],
    // direction towards the light, w unused
    pub direction: [f32; 4],
    // rgb colour, w is the intensity
    pub color: [f32; 4],
}

impl LightUniform {
    /// White ambient light at `ambient` intensity and a white directional light
    /// shining from `from` (towards the origin) at `intensity`.
    pub fn new(ambient: f32, from: [f32; 3], intensity: f32) -> Self {
        let dir = cgmath::Vector3::from(from);
        let dir = cgmath::InnerSpace::normalize(dir);
        Self {
            ambient: [1.0, 1.0, 1.0, ambient],
            direction: [dir.x, dir.y, dir.z, 0.0],
            color: [1.0, 1.0, 1.0, intensity],
        }
    }
}

impl Default for LightUniform {
    fn default() -> Self {
        Self::new(0.5, [1.0, 1.0, 1.0], 0.8)
    }
}

impl LightResources {
    pub fn new(
        uniform: LightUniform,
        device: &wgpu::Device,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group = mk_bind_group(device, bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_light_points_from_the_upper_right() {
        let light = LightUniform::default();
        assert_eq!(light.ambient[3], 0.5);
        assert_eq!(light.color[3], 0.8);
        let d = light.direction;
        let len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-6);
        assert!(d[0] > 0.0 && d[0] == d[1] && d[1] == d[2]);
    }

    #[test]
    fn uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightUniform>() % 16, 0);
    }
}
