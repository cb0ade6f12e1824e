use serde::{Deserialize, Serialize};

use crate::Mode;

/// One measured (scenario, power) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub base: u32,
    pub power: u32,
    pub size: u64,
    pub log2_size: u32,
    pub generator_name: String,
    pub operation_name: String,

    /// Calibrated batch size for exactly this payload and operation.
    pub iterations: u64,
    pub user_cpu_seconds: f64,
    pub wall_seconds: f64,
    pub estimation_wall_seconds: f64,

    pub ops_per_second: f64,
    pub microseconds_per_op: f64,

    pub mode: Mode,
    pub hostname: String,
    pub os_name: String,
    pub date: String,
    pub tag: String,
}

/// `floor(log2(size))`; zero for a size of zero.
pub fn log2_floor(size: u64) -> u32 {
    size.checked_ilog2().unwrap_or(0)
}

/// Throughput derived from a measured batch.
///
/// User CPU time is the basis. A batch too short to register any CPU time
/// falls back to wall time, and a batch with neither reports zeros.
pub fn throughput(iterations: u64, user_cpu_seconds: f64, wall_seconds: f64) -> (f64, f64) {
    let basis = if user_cpu_seconds > 0.0 {
        user_cpu_seconds
    } else {
        wall_seconds
    };
    if basis <= 0.0 || iterations == 0 {
        return (0.0, 0.0);
    }
    let n = iterations as f64;
    (n / basis, 1_000_000.0 * basis / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log2_floor() {
        assert_eq!(log2_floor(1), 0);
        assert_eq!(log2_floor(2), 1);
        assert_eq!(log2_floor(8), 3);
        assert_eq!(log2_floor(1000), 9);
        assert_eq!(log2_floor(1 << 17), 17);
    }

    #[test]
    fn test_throughput() {
        let (ops, usec) = throughput(1_000, 0.5, 0.6);
        assert_eq!(ops, 2_000.0);
        assert_eq!(usec, 500.0);

        let (ops, _) = throughput(10, 0.0, 0.5);
        assert_eq!(ops, 20.0);

        assert_eq!(throughput(10, 0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_camel_case_field_names() {
        let record = ResultRecord {
            base: 2,
            power: 3,
            size: 8,
            log2_size: 3,
            generator_name: "value_string_size".into(),
            operation_name: "insert".into(),
            iterations: 100,
            user_cpu_seconds: 0.5,
            wall_seconds: 0.6,
            estimation_wall_seconds: 0.2,
            ops_per_second: 200.0,
            microseconds_per_op: 5000.0,
            mode: Mode::Interpreted,
            hostname: "h".into(),
            os_name: "Linux".into(),
            date: "20260101-0000".into(),
            tag: "abc1234".into(),
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["log2Size"], 3);
        assert_eq!(v["generatorName"], "value_string_size");
        assert_eq!(v["opsPerSecond"], 200.0);
        assert_eq!(v["estimationWallSeconds"], 0.2);
        assert_eq!(v["mode"], "interpreted");
        assert_eq!(v["osName"], "Linux");
    }
}
