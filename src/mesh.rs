// mesh.rs - 全景球网格 (从球内部观看)

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SphereVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
}

/// UV 球，x 轴取反，从球心看进去贴图方向正确。uv (0, 0) 对应图片左上角
pub fn build_sphere(radius: f32, width_segments: usize, height_segments: usize) -> SphereMesh {
    let mut vertices = Vec::with_capacity((width_segments + 1) * (height_segments + 1));
    let mut indices = Vec::with_capacity(width_segments * height_segments * 6);

    for i in 0..=height_segments {
        let v = i as f32 / height_segments as f32;
        let theta = std::f32::consts::PI * v;
        let y = radius * theta.cos();
        let sin_t = theta.sin();

        for j in 0..=width_segments {
            let u = j as f32 / width_segments as f32;
            let phi = 2.0 * std::f32::consts::PI * u;

            // 镜像 x：纹理从球内看不再左右颠倒
            let x = radius * phi.cos() * sin_t;
            let z = radius * phi.sin() * sin_t;

            vertices.push(SphereVertex {
                position: [x, y, z],
                uv: [u, v],
            });
        }
    }

    let stride = (width_segments + 1) as u32;
    for i in 0..height_segments as u32 {
        for j in 0..width_segments as u32 {
            let a = i * stride + j;
            let b = a + stride;

            indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
        }
    }

    SphereMesh { vertices, indices }
}
