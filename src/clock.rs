//! Process user-CPU clock used as the calibration signal.
//!
//! On Linux the value comes from `/proc/self/stat` (field 14, utime) converted
//! from clock ticks. Other platforms fall back to wall time since the clock was
//! created, which over-reports CPU time but keeps calibration terminating.

use std::time::Instant;

/// Source of cumulative user-CPU seconds for the current process.
pub trait CpuClock {
    fn user_cpu_seconds(&self) -> f64;
}

/// The real process clock.
#[derive(Debug)]
pub struct ProcessClock {
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    origin: Instant,
}

impl ProcessClock {
    pub fn new() -> Self {
        #[cfg(not(target_os = "linux"))]
        log::warn!("user CPU time unavailable on this platform; using wall time");
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for ProcessClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuClock for ProcessClock {
    fn user_cpu_seconds(&self) -> f64 {
        #[cfg(target_os = "linux")]
        {
            read_proc_utime_seconds().unwrap_or(0.0)
        }
        #[cfg(not(target_os = "linux"))]
        {
            self.origin.elapsed().as_secs_f64()
        }
    }
}

/// Parse `/proc/self/stat` for the user-mode CPU time in seconds.
#[cfg(target_os = "linux")]
fn read_proc_utime_seconds() -> Option<f64> {
    let contents = std::fs::read_to_string("/proc/self/stat").ok()?;
    parse_utime_ticks(&contents).map(|ticks| ticks as f64 / ticks_per_second() as f64)
}

/// Extract utime (in ticks) from the contents of a `/proc/<pid>/stat` file.
///
/// The comm field is parenthesised and may contain spaces, so fields are
/// counted from the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_utime_ticks(stat: &str) -> Option<u64> {
    let close_paren = stat.rfind(')')?;
    let rest = stat.get(close_paren + 2..)?;
    // fields[0] is field 3 (state); utime is field 14.
    rest.split_whitespace().nth(11)?.parse().ok()
}

#[cfg(target_os = "linux")]
fn ticks_per_second() -> u64 {
    // SAFETY: sysconf(_SC_CLK_TCK) has no preconditions.
    let ticks = unsafe { sysconf_clk_tck() };
    if ticks > 0 {
        ticks as u64
    } else {
        100
    }
}

/// `sysconf(_SC_CLK_TCK)` without a libc dependency; `_SC_CLK_TCK` is 2 on
/// both glibc and musl.
#[cfg(target_os = "linux")]
unsafe fn sysconf_clk_tck() -> i64 {
    const SC_CLK_TCK: i32 = 2;
    extern "C" {
        fn sysconf(name: i32) -> i64;
    }
    sysconf(SC_CLK_TCK)
}
