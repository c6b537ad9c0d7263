use std::sync::Arc;

use anyhow::{Context, anyhow};
use wgpu::{
    Adapter, Backends, Device, DownlevelFlags, Instance, Queue, Surface, SurfaceConfiguration,
};
use winit::dpi::PhysicalSize;
use winit::window::Window;

pub struct Gpu {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

pub struct SurfaceState {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
}

impl SurfaceState {
    pub fn configure(&self, device: &Device) {
        self.surface.configure(device, &self.config);
    }

    pub fn resize(&mut self, device: &Device, size: PhysicalSize<u32>) {
        if size.width != 0 && size.height != 0 {
            self.config.width = size.width;
            self.config.height = size.height;
            self.configure(device);
        }
    }
}

/// Map a user-supplied backend name to a backend bit, case-insensitively.
/// Unknown names leave all backends enabled rather than failing.
pub fn backends_from_name(name: Option<&str>) -> Backends {
    let Some(name) = name else {
        return Backends::all();
    };
    match name.to_lowercase().as_str() {
        "vulkan" => Backends::VULKAN,
        "metal" => Backends::METAL,
        "dx12" => Backends::DX12,
        "gl" => Backends::GL,
        other => {
            log::warn!("unknown backend name {other:?}, considering all backends");
            Backends::all()
        }
    }
}

/// One enumerated adapter, reduced to what the selection policy needs.
pub struct AdapterCandidate {
    pub name: String,
    pub score: u64,
}

/// Device-type rank, with the largest compute dispatch capability as the
/// tie-breaker. The wgpu stand-in for "most compute units".
pub fn adapter_score(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> u64 {
    let type_rank: u64 = match info.device_type {
        wgpu::DeviceType::DiscreteGpu => 4,
        wgpu::DeviceType::IntegratedGpu => 3,
        wgpu::DeviceType::VirtualGpu => 2,
        wgpu::DeviceType::Other => 1,
        wgpu::DeviceType::Cpu => 0,
    };
    (type_rank << 32) | limits.max_compute_invocations_per_workgroup as u64
}

/// Selection policy: prefer an explicit (case-insensitive) name match,
/// otherwise take the highest score. First seen wins on equal scores, so the
/// pick is deterministic for a fixed enumeration order.
pub fn pick_adapter(candidates: &[AdapterCandidate], preferred: Option<&str>) -> Option<usize> {
    if let Some(preferred) = preferred.filter(|p| !p.is_empty()) {
        let preferred = preferred.to_lowercase();
        if let Some(idx) = candidates
            .iter()
            .position(|c| c.name.to_lowercase().contains(&preferred))
        {
            return Some(idx);
        }
    }

    let mut best: Option<usize> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        match best {
            Some(b) if candidate.score <= candidates[b].score => (),
            _ => best = Some(idx),
        }
    }
    best
}

/// Whether the device can run the integration kernels at all, and therefore
/// whether the render buffer can be shared with them.
pub fn supports_compute(adapter: &Adapter) -> bool {
    adapter
        .get_downlevel_capabilities()
        .flags
        .contains(DownlevelFlags::COMPUTE_SHADERS)
}

pub async fn init(
    window: Arc<Window>,
    backend_name: Option<&str>,
    device_name: Option<&str>,
) -> anyhow::Result<(Gpu, SurfaceState)> {
    let backends = backends_from_name(backend_name);
    let instance = Instance::new(&wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });

    let size = window.inner_size();
    let surface = instance
        .create_surface(window)
        .context("surface creation failed")?;

    let adapters: Vec<Adapter> = instance
        .enumerate_adapters(backends)
        .into_iter()
        .filter(|a| a.is_surface_supported(&surface))
        .collect();

    let candidates: Vec<AdapterCandidate> = adapters
        .iter()
        .map(|a| {
            let info = a.get_info();
            let score = adapter_score(&info, &a.limits());
            log::info!("adapter: {} ({:?}, score {score})", info.name, info.backend);
            AdapterCandidate {
                name: info.name,
                score,
            }
        })
        .collect();

    let picked = pick_adapter(&candidates, device_name)
        .ok_or_else(|| anyhow!("no compatible graphics adapter found"))?;
    if let Some(preferred) = device_name {
        if !candidates[picked]
            .name
            .to_lowercase()
            .contains(&preferred.to_lowercase())
        {
            log::info!("no adapter matches {preferred:?}, falling back to strongest");
        }
    }
    let adapter = adapters.into_iter().nth(picked).expect("picked in range");
    log::info!("using {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .context("device request failed")?;

    let mut config = surface
        .get_default_config(&adapter, size.width.max(1), size.height.max(1))
        .ok_or_else(|| anyhow!("surface is not supported by the chosen adapter"))?;
    config.present_mode = wgpu::PresentMode::AutoVsync;
    surface.configure(&device, &config);

    Ok((
        Gpu {
            instance,
            adapter,
            device,
            queue,
        },
        SurfaceState { surface, config },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(items: &[(&str, u64)]) -> Vec<AdapterCandidate> {
        items
            .iter()
            .map(|(name, score)| AdapterCandidate {
                name: name.to_string(),
                score: *score,
            })
            .collect()
    }

    #[test]
    fn preferred_substring_wins_over_score() {
        let c = candidates(&[("NVIDIA RTX 4090", 100), ("Intel UHD 770", 10)]);
        assert_eq!(pick_adapter(&c, Some("intel")), Some(1));
    }

    #[test]
    fn no_match_falls_back_to_highest_score() {
        let c = candidates(&[("Intel UHD 770", 10), ("NVIDIA RTX 4090", 100)]);
        assert_eq!(pick_adapter(&c, Some("amd")), Some(1));
        assert_eq!(pick_adapter(&c, None), Some(1));
    }

    #[test]
    fn first_seen_wins_on_equal_scores() {
        let c = candidates(&[("Device A", 50), ("Device B", 50)]);
        assert_eq!(pick_adapter(&c, None), Some(0));
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert_eq!(pick_adapter(&[], Some("anything")), None);
        assert_eq!(pick_adapter(&[], None), None);
    }

    #[test]
    fn backend_names_resolve() {
        assert_eq!(backends_from_name(Some("vulkan")), Backends::VULKAN);
        assert_eq!(backends_from_name(Some("Metal")), Backends::METAL);
        assert_eq!(backends_from_name(Some("dx12")), Backends::DX12);
        assert_eq!(backends_from_name(Some("gl")), Backends::GL);
        assert_eq!(backends_from_name(None), Backends::all());
    }

    #[test]
    fn partial_backend_names_fall_back_to_all() {
        // A fragment must not silently pick whichever name happens to
        // contain it.
        assert_eq!(backends_from_name(Some("u")), Backends::all());
        assert_eq!(backends_from_name(Some("l")), Backends::all());
        assert_eq!(backends_from_name(Some("")), Backends::all());
    }
}
