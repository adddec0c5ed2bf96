//! Bind group layouts and GPU-side copies of scene resources.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::error::FrameError;
use crate::grid::{Cell, GpuCell, GridSize};
use crate::scene::BindingLayout;
use crate::textures::{FilterMode, TextureHandle};

fn uniform_entry(visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Binding 0 is always the scene's uniform block.
pub(super) fn render_bind_group_layout(device: &wgpu::Device, layout: BindingLayout) -> wgpu::BindGroupLayout {
    let both = wgpu::ShaderStages::VERTEX_FRAGMENT;
    let entries: Vec<wgpu::BindGroupLayoutEntry> = match layout {
        BindingLayout::UniformOnly => vec![uniform_entry(both)],
        BindingLayout::Textured { layers } => {
            let mut entries = vec![
                uniform_entry(both),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ];
            entries.extend((0..layers).map(|i| wgpu::BindGroupLayoutEntry {
                binding: 2 + i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }));
            entries
        }
        BindingLayout::GridInstanced => vec![
            uniform_entry(both),
            storage_entry(1, wgpu::ShaderStages::VERTEX, true),
        ],
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Scene Bind Group Layout"),
        entries: &entries,
    })
}

/// Uniforms, read-only `current` cells, writable `next` cells.
pub(super) fn compute_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let compute = wgpu::ShaderStages::COMPUTE;
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Grid Compute Bind Group Layout"),
        entries: &[
            uniform_entry(compute),
            storage_entry(1, compute, true),
            storage_entry(2, compute, false),
        ],
    })
}

/// Uploaded textures keyed by [`TextureHandle::id`].
pub(super) struct TextureCache {
    views: HashMap<u64, wgpu::TextureView>,
    filters: HashMap<u64, FilterMode>,
    /// Bound in place of missing layers. Fully transparent.
    fallback: wgpu::TextureView,
    nearest: wgpu::Sampler,
    linear: wgpu::Sampler,
}

impl TextureCache {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let fallback = upload_rgba(device, queue, "Fallback Texture", &[0, 0, 0, 0], 1, 1);
        Self {
            views: HashMap::new(),
            filters: HashMap::new(),
            fallback,
            nearest: sampler(device, wgpu::FilterMode::Nearest),
            linear: sampler(device, wgpu::FilterMode::Linear),
        }
    }

    /// Upload every handle not seen before.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, handles: &[Option<TextureHandle>]) {
        for handle in handles.iter().flatten() {
            if self.views.contains_key(&handle.id()) {
                continue;
            }
            let data = handle.data();
            log::debug!("Uploading texture '{}' ({}x{})", handle.name(), data.width, data.height);
            let view = upload_rgba(device, queue, handle.name(), &data.data, data.width, data.height);
            self.views.insert(handle.id(), view);
            self.filters.insert(handle.id(), data.filter);
        }
    }

    /// Exactly `layers` views, substituting the fallback for missing ones.
    pub fn views(&self, handles: &[Option<TextureHandle>], layers: usize) -> Vec<&wgpu::TextureView> {
        (0..layers)
            .map(|i| {
                handles
                    .get(i)
                    .and_then(Option::as_ref)
                    .and_then(|handle| self.views.get(&handle.id()))
                    .unwrap_or(&self.fallback)
            })
            .collect()
    }

    /// Linear if any layer asks for it, nearest otherwise.
    pub fn sampler_for(&self, handles: &[Option<TextureHandle>]) -> &wgpu::Sampler {
        let linear = handles
            .iter()
            .flatten()
            .any(|handle| self.filters.get(&handle.id()) == Some(&FilterMode::Linear));
        if linear {
            &self.linear
        } else {
            &self.nearest
        }
    }
}

fn sampler(device: &wgpu::Device, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Layer Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    data: &[u8],
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        data,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Device-side cell buffers plus a staging buffer for readback.
pub(super) struct GridStorage {
    size: GridSize,
    pub current: wgpu::Buffer,
    pub next: wgpu::Buffer,
    pub staging: wgpu::Buffer,
}

impl GridStorage {
    fn new(device: &wgpu::Device, size: GridSize) -> Self {
        let byte_len = Self::bytes_for(size);
        let storage = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: byte_len,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let current = storage("Grid Current");
        let next = storage("Grid Next");
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Readback"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            size,
            current,
            next,
            staging,
        }
    }

    /// Buffers for `size`, reallocating if the grid size changed.
    pub fn ensure<'a>(slot: &'a mut Option<GridStorage>, device: &wgpu::Device, size: GridSize) -> &'a GridStorage {
        if slot.as_ref().is_some_and(|grid| grid.size != size) {
            *slot = None;
        }
        slot.get_or_insert_with(|| {
            log::debug!("Allocating grid buffers for {}x{}", size.width, size.height);
            GridStorage::new(device, size)
        })
    }

    fn bytes_for(size: GridSize) -> u64 {
        (size.cell_count() * std::mem::size_of::<GpuCell>()) as u64
    }

    pub fn byte_len(&self) -> u64 {
        Self::bytes_for(self.size)
    }

    /// Block until the staging buffer is readable and copy it into `next`.
    pub fn read_next(&self, device: &wgpu::Device, next: &mut [Cell]) -> Result<(), FrameError> {
        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(FrameError::BufferMapping(err.to_string())),
            Err(err) => return Err(FrameError::BufferMapping(err.to_string())),
        }

        {
            let data = slice.get_mapped_range();
            let cells: &[GpuCell] = bytemuck::cast_slice(&data);
            for (dst, src) in next.iter_mut().zip(cells) {
                *dst = src.to_cell();
            }
        }
        self.staging.unmap();
        Ok(())
    }
}
