//! Headless Vulkan probe.
//!
//! `VKBOOT_VALIDATION=1` enables validation layers, `VKBOOT_DEVICE=<name>`
//! restricts selection to one device.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vkboot::ash::vk;
use vkboot::{
    version_string, DeviceBuilder, InstanceBuilder, PhysicalDeviceSelector,
    QueueType, SelectionCriteria, SystemInfo, VulkanLoader,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let loader = VulkanLoader::load().context("loading Vulkan")?;
    let info = SystemInfo::query(&loader)?;
    info!(
        api_version = %version_string(info.instance_api_version),
        layers = info.available_layers.len(),
        extensions = info.available_extensions.len(),
        validation = info.validation_layers_available,
        "Vulkan loader"
    );

    let validation = std::env::var("VKBOOT_VALIDATION").is_ok_and(|v| v == "1");
    let instance = InstanceBuilder::new()
        .app_name("vkboot-probe")
        .engine_name("vkboot")
        .desired_api_version(vk::API_VERSION_1_3)
        .headless(true)
        .request_validation_layers(validation)
        .use_default_debug_messenger()
        .build(&loader)
        .context("creating instance")?;

    let result = probe(&instance);

    // SAFETY: probe destroys everything it created from the instance.
    unsafe { instance.destroy() };
    result
}

fn probe(instance: &vkboot::Instance) -> anyhow::Result<()> {
    let mut criteria = SelectionCriteria::new().require_present(false);
    if let Ok(name) = std::env::var("VKBOOT_DEVICE") {
        criteria = criteria.set_name(name);
    }

    let selector = PhysicalDeviceSelector::new(instance).criteria(criteria);
    let ranking = selector.rank_devices()?;

    for device in &ranking.suitable {
        let props = device.properties();
        info!(
            device = %device.name(),
            device_type = ?props.device_type,
            api_version = %version_string(props.api_version),
            local_memory_mb = device.largest_device_local_heap() / (1024 * 1024),
            suitability = ?device.suitability(),
            "Candidate"
        );
    }
    for (name, reason) in &ranking.rejections {
        warn!(device = %name, "Rejected: {reason}");
    }

    if ranking.suitable.is_empty() {
        anyhow::bail!(
            "no suitable device among {} candidates",
            ranking.rejections.len()
        );
    }

    let best = ranking.suitable.into_iter().next().context("empty candidate list")?;
    let device = DeviceBuilder::new(best).build(instance)?;

    for kind in [QueueType::Graphics, QueueType::Compute, QueueType::Transfer] {
        match device.get_queue_index(kind) {
            Ok(index) => info!(?kind, index, "Queue family"),
            Err(e) => info!(?kind, "{e}"),
        }
    }

    let idle = device.wait_idle();
    // SAFETY: nothing else was created from the device.
    unsafe { device.destroy() };
    Ok(idle?)
}
