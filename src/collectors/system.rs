use crate::collectors::{CollectError, MetricsSource, Readings};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{CpuExt, DiskExt, System, SystemExt};
use tracing::debug;

pub const CPU_OBSERVATION_WINDOW: Duration = Duration::from_secs(1);

pub struct SystemSource {
    system: System,
    disk_mount: PathBuf,
}

impl SystemSource {
    pub fn new(disk_mount: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            disk_mount: disk_mount.into(),
        }
    }
}

impl MetricsSource for SystemSource {
    async fn read(&mut self) -> Result<Readings, CollectError> {
        self.system.refresh_cpu();
        tokio::time::sleep(CPU_OBSERVATION_WINDOW).await;
        self.system.refresh_cpu();
        let per_cpu: Vec<f32> = self.system.cpus().iter().map(|c| c.cpu_usage()).collect();
        let cpu_percent = average_cpu_usage(&per_cpu).ok_or(CollectError::NoCpus)?;

        self.system.refresh_memory();
        let total = self.system.total_memory();
        let used = total.saturating_sub(self.system.available_memory());
        let memory_percent = usage_percent(used, total).ok_or(CollectError::MemoryUnavailable)?;

        self.system.refresh_disks_list();
        self.system.refresh_disks();
        let disk_percent = resolve_disk_percent(
            self.system
                .disks()
                .iter()
                .map(|d| (d.mount_point(), d.total_space(), d.available_space())),
            &self.disk_mount,
        )?;

        debug!(
            cpu_count = per_cpu.len(),
            memory_total_bytes = total,
            disk_mount = %self.disk_mount.display(),
            "host readings collected"
        );

        Ok(Readings {
            cpu_percent,
            memory_percent,
            disk_percent,
        })
    }
}

fn average_cpu_usage(per_cpu: &[f32]) -> Option<f64> {
    if per_cpu.is_empty() {
        return None;
    }
    let sum: f32 = per_cpu.iter().sum();
    Some((sum / per_cpu.len() as f32) as f64)
}

fn usage_percent(used: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((used as f64 / total as f64) * 100.0)
}

// sysinfo leaves out pseudo filesystems such as tmpfs, so a mount it does
// not list is measured with statvfs on the path itself.
fn resolve_disk_percent<'a>(
    disks: impl IntoIterator<Item = (&'a Path, u64, u64)>,
    mount: &Path,
) -> Result<f64, CollectError> {
    if let Some(percent) = disk_usage_percent(disks, mount) {
        return Ok(percent);
    }
    debug!(mount = %mount.display(), "mount not listed by sysinfo, using statvfs");
    path_usage_percent(mount)
}

#[cfg(unix)]
fn path_usage_percent(mount: &Path) -> Result<f64, CollectError> {
    let stat = nix::sys::statvfs::statvfs(mount).map_err(|errno| CollectError::DiskStat {
        mount: mount.display().to_string(),
        source: std::io::Error::from(errno),
    })?;
    let fragment = stat.fragment_size() as u64;
    let total = (stat.blocks() as u64).saturating_mul(fragment);
    let available = (stat.blocks_available() as u64).saturating_mul(fragment);
    Ok(usage_percent(total.saturating_sub(available), total).unwrap_or(0.0))
}

#[cfg(not(unix))]
fn path_usage_percent(mount: &Path) -> Result<f64, CollectError> {
    Err(CollectError::DiskNotFound {
        mount: mount.display().to_string(),
    })
}

fn disk_usage_percent<'a>(
    disks: impl IntoIterator<Item = (&'a Path, u64, u64)>,
    mount: &Path,
) -> Option<f64> {
    let (_, total, available) = disks.into_iter().find(|(m, _, _)| *m == mount)?;
    Some(usage_percent(total.saturating_sub(available), total).unwrap_or(0.0))
}
