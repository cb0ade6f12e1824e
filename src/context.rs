//! Run-wide context and best-effort host metadata.

use std::path::Path;
use std::process::Command;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Mode;

/// Settings fixed at startup and stamped onto every result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    pub mode: Mode,
    pub hostname: String,
    pub os_name: String,
    /// UTC, `YYYYMMDD-HHMM`.
    pub date: String,
    pub tag: String,
}

impl RunContext {
    /// Capture host, date and tag. `tag` overrides the source revision.
    pub fn detect(mode: Mode, tag: Option<String>) -> Self {
        Self {
            mode,
            hostname: hostname(),
            os_name: os_name(),
            date: utc_stamp(SystemTime::now()),
            tag: tag
                .or_else(git_short_commit)
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn hostname() -> String {
    command_stdout("uname", &["-n"])
        .or_else(|| {
            std::fs::read_to_string("/proc/sys/kernel/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .map(|name| short_hostname(&name).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// First label of a possibly fully qualified host name.
fn short_hostname(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

fn os_name() -> String {
    command_stdout("uname", &["-s"]).unwrap_or_else(|| std::env::consts::OS.to_string())
}

fn git_short_commit() -> Option<String> {
    command_stdout("git", &["rev-parse", "--short", "HEAD"]).or_else(|| {
        // CI checkouts without a .git directory.
        std::env::var("GIT_SHA")
            .ok()
            .or_else(|| std::env::var("GITHUB_SHA").ok())
            .map(|s| s.chars().take(7).collect())
    })
}

/// Format `now` as `YYYYMMDD-HHMM` in UTC.
pub fn utc_stamp(now: SystemTime) -> String {
    let secs = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (year, month, day) = days_to_ymd(secs / 86_400);
    let time_of_day = secs % 86_400;
    format!(
        "{:04}{:02}{:02}-{:02}{:02}",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60
    )
}

fn days_to_ymd(mut days: u64) -> (u64, u64, u64) {
    // Howard Hinnant's civil_from_days.
    days += 719_468;
    let era = days / 146_097;
    let doe = days - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Store `value` under a dotted `key`, creating one nested object per segment.
///
/// An intermediate segment that already holds a scalar is replaced by an object.
pub fn insert_embedded(map: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            map.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_embedded(inner, rest, value);
            }
        }
    }
}

const SYSCTL: &str = "/usr/sbin/sysctl";

const SYSCTL_KEYS: [&str; 8] = [
    "kern.ostype",
    "kern.version",
    "kern.hostname",
    "hw.machine",
    "hw.model",
    "hw.cputype",
    "hw.busfrequency",
    "hw.cpufrequency",
];

/// Best-effort host description as nested JSON; empty when nothing is known.
pub fn sys_info() -> Value {
    let pairs = if Path::new(SYSCTL).exists() && cfg!(target_os = "macos") {
        sysctl_pairs()
    } else {
        proc_pairs()
    };

    let mut info = Map::new();
    for (key, value) in pairs {
        insert_embedded(&mut info, &key, Value::String(value));
    }
    Value::Object(info)
}

fn sysctl_pairs() -> Vec<(String, String)> {
    let mut args = vec!["-a"];
    args.extend(SYSCTL_KEYS);
    command_stdout(SYSCTL, &args)
        .map(|text| parse_key_values(&text))
        .unwrap_or_default()
}

/// Parse `key: value` or `key = value` lines.
fn parse_key_values(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let idx = line.find([':', '='])?;
            let key = line[..idx].trim();
            let value = line[idx + 1..].trim();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn proc_pairs() -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, path) in [
        ("kern.ostype", "/proc/sys/kernel/ostype"),
        ("kern.version", "/proc/sys/kernel/osrelease"),
        ("kern.hostname", "/proc/sys/kernel/hostname"),
    ] {
        if let Ok(value) = std::fs::read_to_string(path) {
            pairs.push((key.to_string(), value.trim().to_string()));
        }
    }
    pairs.push(("hw.machine".to_string(), std::env::consts::ARCH.to_string()));

    if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
        let fields = parse_key_values(&cpuinfo);
        if let Some((_, model)) = fields.iter().find(|(k, _)| k == "model name") {
            pairs.push(("hw.model".to_string(), model.clone()));
        }
        if let Some((_, mhz)) = fields.iter().find(|(k, _)| k == "cpu MHz") {
            pairs.push(("hw.cpufrequency".to_string(), mhz.clone()));
        }
    }
    if let Ok(n) = std::thread::available_parallelism() {
        pairs.push(("hw.ncpu".to_string(), n.get().to_string()));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_utc_stamp() {
        assert_eq!(utc_stamp(UNIX_EPOCH), "19700101-0000");
        // 2024-02-29T13:37:00Z
        let t = UNIX_EPOCH + Duration::from_secs(1_709_213_820);
        assert_eq!(utc_stamp(t), "20240229-1337");
    }

    #[test]
    fn test_short_hostname() {
        assert_eq!(short_hostname("build-7.example.com"), "build-7");
        assert_eq!(short_hostname("laptop"), "laptop");
    }

    #[test]
    fn test_insert_embedded_expands_dotted_keys() {
        let mut m = Map::new();
        insert_embedded(&mut m, "kern.ostype", json!("Darwin"));
        insert_embedded(&mut m, "kern.hostname", json!("mac"));
        insert_embedded(&mut m, "hw.model", json!("MacBookPro"));
        insert_embedded(&mut m, "a.b.c", json!(1));
        insert_embedded(&mut m, "flat", json!(2));
        assert_eq!(
            Value::Object(m),
            json!({
                "kern": {"ostype": "Darwin", "hostname": "mac"},
                "hw": {"model": "MacBookPro"},
                "a": {"b": {"c": 1}},
                "flat": 2
            })
        );
    }

    #[test]
    fn test_insert_embedded_replaces_scalar_parent() {
        let mut m = Map::new();
        insert_embedded(&mut m, "hw", json!("x"));
        insert_embedded(&mut m, "hw.model", json!("y"));
        assert_eq!(Value::Object(m), json!({"hw": {"model": "y"}}));
    }

    #[test]
    fn test_parse_key_values() {
        let text = "kern.ostype: Darwin\nhw.cpufrequency = 2400000000\nnoise\n";
        assert_eq!(
            parse_key_values(text),
            vec![
                ("kern.ostype".to_string(), "Darwin".to_string()),
                ("hw.cpufrequency".to_string(), "2400000000".to_string()),
            ]
        );
    }

    #[test]
    fn test_detect_honors_tag_override() {
        let ctx = RunContext::detect(Mode::Native, Some("v1".to_string()));
        assert_eq!(ctx.tag, "v1");
        assert_eq!(ctx.mode, Mode::Native);
        assert_eq!(ctx.date.len(), "YYYYMMDD-HHMM".len());
        assert!(!ctx.hostname.is_empty());
    }

    #[test]
    fn test_sys_info_is_an_object() {
        assert!(sys_info().is_object());
    }
}
