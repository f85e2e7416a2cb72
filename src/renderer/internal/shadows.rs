use std::collections::HashMap;
use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::asset::{Handle, MeshData};
use crate::renderer::backend::{DepthTargetDescriptor, DepthTargetId, ShadowBackend};
use crate::renderer::internal::RenderContext;
use crate::renderer::pipeline_builder::DepthPipelineBuilder;
use crate::renderer::program::VariantId;
use crate::renderer::shadows::programs::DEPTH_SHADER;
use crate::renderer::shadows::ShadowPrograms;
use crate::renderer::Vertex;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_DRAW_CAPACITY: u64 = 256;

/// Per-draw uniform, padded to the dynamic offset alignment.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    mvp: [[f32; 4]; 4],
    _padding: [[f32; 4]; 12],
}

impl DrawUniform {
    const STRIDE: u64 = mem::size_of::<DrawUniform>() as u64;
    const BINDING_SIZE: u64 = mem::size_of::<[[f32; 4]; 4]>() as u64;

    fn new(mvp: Mat4) -> Self {
        Self {
            mvp: mvp.to_cols_array_2d(),
            _padding: [[0.0; 4]; 12],
        }
    }
}

struct DepthArray {
    _texture: wgpu::Texture,
    array_view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
}

impl DepthArray {
    fn new(device: &wgpu::Device, desc: &DepthTargetDescriptor) -> Self {
        let layers = desc.layers.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.size,
                height: desc.size,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{}ArrayView", desc.label)),
            format: Some(DEPTH_FORMAT),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            aspect: wgpu::TextureAspect::DepthOnly,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: Some(layers),
            ..Default::default()
        });

        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("{}Layer{layer}", desc.label)),
                    format: Some(DEPTH_FORMAT),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu::TextureAspect::DepthOnly,
                    base_mip_level: 0,
                    mip_level_count: None,
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Self {
            _texture: texture,
            array_view,
            layer_views,
        }
    }

    fn layer_view(&self, layer: u32) -> Option<&wgpu::TextureView> {
        let view = self.layer_views.get(layer as usize);
        if view.is_none() {
            log::warn!(
                "Shadow layer index {} out of range (layers: {})",
                layer,
                self.layer_views.len()
            );
        }
        view
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ShadowCasterVertices"),
            contents: bytemuck::cast_slice(data.vertices()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ShadowCasterIndices"),
            contents: bytemuck::cast_slice(data.indices()),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: data.index_count(),
        }
    }

    fn fits(&self, data: &MeshData) -> bool {
        self.vertex_buffer.size() == mem::size_of_val(data.vertices()) as u64
            && self.index_buffer.size() == mem::size_of_val(data.indices()) as u64
    }
}

#[derive(Clone, Copy, Debug)]
enum Recorded {
    Clear { target: DepthTargetId, layer: u32 },
    Bind { target: DepthTargetId, layer: u32 },
    Draw { mesh: Handle<MeshData>, slot: u32, cube: bool },
}

/// One render pass worth of replayed work.
struct PassPlan {
    target: DepthTargetId,
    layer: u32,
    clear: bool,
    draws: Vec<(Handle<MeshData>, u32, bool)>,
}

/// [`ShadowBackend`] on a wgpu device.
///
/// Commands are buffered in call order and turned into render passes by
/// [`WgpuShadowBackend::submit`]. A clear directly followed by a bind of the
/// same layer becomes a single pass with a clear load op.
pub struct WgpuShadowBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    programs: ShadowPrograms,
    depth_pipeline: wgpu::RenderPipeline,
    cube_pipeline: wgpu::RenderPipeline,
    draw_layout: wgpu::BindGroupLayout,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_capacity: u64,
    sampler: wgpu::Sampler,
    targets: HashMap<DepthTargetId, DepthArray>,
    meshes: HashMap<Handle<MeshData>, GpuMesh>,
    next_target: u32,
    recorded: Vec<Recorded>,
    draws: Vec<DrawUniform>,
    cube_active: bool,
}

impl WgpuShadowBackend {
    pub fn new(context: &RenderContext, programs: ShadowPrograms) -> Self {
        let device = &context.device;

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ShadowDrawLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(DrawUniform::BINDING_SIZE),
                },
                count: None,
            }],
        });

        let (draw_buffer, draw_bind_group) =
            Self::create_draw_buffer(device, &draw_layout, INITIAL_DRAW_CAPACITY);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ShadowDepthShader"),
            source: wgpu::ShaderSource::Wgsl(DEPTH_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ShadowPipelineLayout"),
            bind_group_layouts: &[&draw_layout],
            push_constant_ranges: &[],
        });

        let depth_pipeline = DepthPipelineBuilder::new(device, &pipeline_layout, &shader)
            .with_label("ShadowDepthPipeline")
            .with_vertex_entry("vs_depth")
            .with_vertex_buffer(Vertex::depth_layout())
            .with_bias(2, 2.0)
            .build();

        let cube_pipeline = DepthPipelineBuilder::new(device, &pipeline_layout, &shader)
            .with_label("ShadowDepthCubePipeline")
            .with_vertex_entry("vs_depth_cube")
            .with_vertex_buffer(Vertex::depth_layout())
            .with_bias(1, 1.0)
            .with_no_culling()
            .build();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ShadowSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        log::info!(
            "Shadow backend ready: {} draw slots of {} bytes",
            INITIAL_DRAW_CAPACITY,
            DrawUniform::STRIDE
        );

        Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            programs,
            depth_pipeline,
            cube_pipeline,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            sampler,
            targets: HashMap::new(),
            meshes: HashMap::new(),
            next_target: 0,
            recorded: Vec::new(),
            draws: Vec::new(),
            cube_active: false,
        }
    }

    fn create_draw_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        capacity: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowDrawBuffer"),
            size: capacity * DrawUniform::STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ShadowDrawBindGroup"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(DrawUniform::BINDING_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn grow(&mut self, required: u64) {
        let new_capacity = required.max(self.draw_capacity * 2);
        log::info!(
            "Growing shadow draw buffer: {} -> {}",
            self.draw_capacity,
            new_capacity
        );
        let (buffer, bind_group) =
            Self::create_draw_buffer(&self.device, &self.draw_layout, new_capacity);
        self.draw_buffer = buffer;
        self.draw_bind_group = bind_group;
        self.draw_capacity = new_capacity;
    }

    /// Array view of a target, for binding as `texture_depth_2d_array`.
    pub fn array_view(&self, target: DepthTargetId) -> Option<&wgpu::TextureView> {
        self.targets.get(&target).map(|t| &t.array_view)
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Encodes and submits everything recorded since the last submit.
    pub fn submit(&mut self) {
        if self.recorded.is_empty() {
            return;
        }

        let required = self.draws.len() as u64;
        if required > self.draw_capacity {
            self.grow(required);
        }
        if !self.draws.is_empty() {
            self.queue
                .write_buffer(&self.draw_buffer, 0, bytemuck::cast_slice(&self.draws));
        }

        let plans = plan_passes(&self.recorded);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ShadowEncoder"),
            });
        for plan in &plans {
            self.encode_pass(&mut encoder, plan);
        }
        self.queue.submit(Some(encoder.finish()));

        log::trace!(
            "Submitted {} shadow passes with {} draws",
            plans.len(),
            self.draws.len()
        );
        self.recorded.clear();
        self.draws.clear();
    }

    fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, plan: &PassPlan) {
        let Some(view) = self
            .targets
            .get(&plan.target)
            .and_then(|t| t.layer_view(plan.layer))
        else {
            return;
        };

        let load = if plan.clear {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ShadowPass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let mut current_cube = None;
        for &(mesh, slot, cube) in &plan.draws {
            let Some(gpu) = self.meshes.get(&mesh) else {
                log::warn!("Skipping draw of non-resident mesh {:?}", mesh);
                continue;
            };
            if current_cube != Some(cube) {
                pass.set_pipeline(if cube {
                    &self.cube_pipeline
                } else {
                    &self.depth_pipeline
                });
                current_cube = Some(cube);
            }
            let offset = (slot as u64 * DrawUniform::STRIDE) as u32;
            pass.set_bind_group(0, &self.draw_bind_group, &[offset]);
            pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
            pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..gpu.index_count, 0, 0..1);
        }
    }
}

/// Removes every command aimed at `target`, including draws issued while one
/// of its layers was bound.
fn forget_target(recorded: &mut Vec<Recorded>, target: DepthTargetId) {
    let mut bound_to_target = false;
    recorded.retain(|command| match command {
        Recorded::Clear { target: t, .. } => *t != target,
        Recorded::Bind { target: t, .. } => {
            bound_to_target = *t == target;
            !bound_to_target
        }
        Recorded::Draw { .. } => !bound_to_target,
    });
}

fn plan_passes(recorded: &[Recorded]) -> Vec<PassPlan> {
    let mut plans: Vec<PassPlan> = Vec::new();
    let mut bound: Option<(DepthTargetId, u32)> = None;
    let mut open = false;

    for command in recorded {
        match *command {
            Recorded::Clear { target, layer } => {
                plans.push(PassPlan {
                    target,
                    layer,
                    clear: true,
                    draws: Vec::new(),
                });
                open = false;
            }
            Recorded::Bind { target, layer } => {
                bound = Some((target, layer));
                // a pending clear of the same layer becomes this pass's load op
                let reuse = matches!(
                    plans.last(),
                    Some(last) if last.clear && last.draws.is_empty()
                        && last.target == target && last.layer == layer
                );
                if !reuse {
                    plans.push(PassPlan {
                        target,
                        layer,
                        clear: false,
                        draws: Vec::new(),
                    });
                }
                open = true;
            }
            Recorded::Draw { mesh, slot, cube } => {
                let Some((target, layer)) = bound else {
                    log::warn!("Depth draw of {:?} with no bound target", mesh);
                    continue;
                };
                if !open {
                    plans.push(PassPlan {
                        target,
                        layer,
                        clear: false,
                        draws: Vec::new(),
                    });
                    open = true;
                }
                if let Some(plan) = plans.last_mut() {
                    plan.draws.push((mesh, slot, cube));
                }
            }
        }
    }

    plans
}

impl ShadowBackend for WgpuShadowBackend {
    fn create_depth_target(&mut self, desc: &DepthTargetDescriptor) -> DepthTargetId {
        let target = DepthTargetId::new(self.next_target);
        self.next_target += 1;
        self.targets.insert(target, DepthArray::new(&self.device, desc));
        log::debug!(
            "Created depth target {:?} '{}' ({}px x {} layers)",
            target,
            desc.label,
            desc.size,
            desc.layers
        );
        target
    }

    fn destroy_depth_target(&mut self, target: DepthTargetId) {
        forget_target(&mut self.recorded, target);
        if self.targets.remove(&target).is_none() {
            log::warn!("Destroying unknown depth target {:?}", target);
        }
    }

    fn clear_depth_target(&mut self, target: DepthTargetId, layer: Option<u32>) {
        let Some(array) = self.targets.get(&target) else {
            log::warn!("Clearing unknown depth target {:?}", target);
            return;
        };
        match layer {
            Some(layer) => self.recorded.push(Recorded::Clear { target, layer }),
            None => {
                let layers = array.layer_views.len() as u32;
                self.recorded
                    .extend((0..layers).map(|layer| Recorded::Clear { target, layer }));
            }
        }
    }

    fn bind_depth_target(&mut self, target: DepthTargetId, layer: u32) {
        self.recorded.push(Recorded::Bind { target, layer });
    }

    fn write_variant_uniform(&mut self, variant: VariantId) {
        self.cube_active = variant == self.programs.depth_cube;
    }

    fn is_geometry_resident(&self, mesh: Handle<MeshData>) -> bool {
        self.meshes.contains_key(&mesh)
    }

    fn build_geometry(&mut self, mesh: Handle<MeshData>, data: &MeshData) {
        self.meshes.insert(mesh, GpuMesh::new(&self.device, data));
    }

    fn update_geometry(&mut self, mesh: Handle<MeshData>, data: &MeshData) {
        match self.meshes.get(&mesh) {
            Some(gpu) if gpu.fits(data) => {
                self.queue
                    .write_buffer(&gpu.vertex_buffer, 0, bytemuck::cast_slice(data.vertices()));
                self.queue
                    .write_buffer(&gpu.index_buffer, 0, bytemuck::cast_slice(data.indices()));
            }
            _ => self.build_geometry(mesh, data),
        }
    }

    fn draw_depth(&mut self, mesh: Handle<MeshData>, mvp: Mat4) {
        let slot = self.draws.len() as u32;
        self.draws.push(DrawUniform::new(mvp));
        self.recorded.push(Recorded::Draw {
            mesh,
            slot,
            cube: self.cube_active,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_uniform_fills_one_alignment_slot() {
        assert_eq!(DrawUniform::STRIDE, 256);
        assert_eq!(DrawUniform::BINDING_SIZE, 64);
    }

    #[test]
    fn clear_then_bind_merges_into_one_pass() {
        let target = DepthTargetId::new(0);
        let mesh = Handle::new(0);
        let plans = plan_passes(&[
            Recorded::Clear { target, layer: 0 },
            Recorded::Bind { target, layer: 0 },
            Recorded::Draw { mesh, slot: 0, cube: false },
            Recorded::Draw { mesh, slot: 1, cube: false },
            Recorded::Clear { target, layer: 1 },
        ]);
        assert_eq!(plans.len(), 2);
        assert!(plans[0].clear);
        assert_eq!(plans[0].draws.len(), 2);
        assert_eq!(plans[1].layer, 1);
        assert!(plans[1].draws.is_empty());
    }

    #[test]
    fn forgetting_a_target_drops_its_draws() {
        let kept = DepthTargetId::new(0);
        let gone = DepthTargetId::new(1);
        let mesh = Handle::new(0);
        let mut recorded = vec![
            Recorded::Bind { target: kept, layer: 0 },
            Recorded::Draw { mesh, slot: 0, cube: false },
            Recorded::Clear { target: gone, layer: 0 },
            Recorded::Bind { target: gone, layer: 0 },
            Recorded::Draw { mesh, slot: 1, cube: false },
            Recorded::Draw { mesh, slot: 2, cube: false },
            Recorded::Bind { target: kept, layer: 1 },
            Recorded::Draw { mesh, slot: 3, cube: false },
        ];
        forget_target(&mut recorded, gone);
        assert_eq!(recorded.len(), 4);

        let plans = plan_passes(&recorded);
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(|plan| plan.target == kept));
        let slots: Vec<u32> = plans
            .iter()
            .flat_map(|plan| plan.draws.iter().map(|draw| draw.1))
            .collect();
        assert_eq!(slots, vec![0, 3]);
    }

    #[test]
    fn draws_without_bind_are_dropped() {
        let plans = plan_passes(&[Recorded::Draw {
            mesh: Handle::new(0),
            slot: 0,
            cube: true,
        }]);
        assert!(plans.is_empty());
    }
}
