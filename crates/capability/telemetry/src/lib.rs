//! 追踪初始化、总线流量计数与会话 ID 生成。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};
use tracing_subscriber::{EnvFilter, fmt};

/// 流量计数快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficSnapshot {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bits: u64,
    pub rx_bits: u64,
}

/// 单设备或单端点的收发计数（估算值，仅供看板）。
#[derive(Debug, Default)]
pub struct TrafficCounters {
    tx_packets: AtomicU64,
    rx_packets: AtomicU64,
    tx_bits: AtomicU64,
    rx_bits: AtomicU64,
}

impl TrafficCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功事务的请求/响应字节数。
    pub fn record(&self, tx_bytes: u64, rx_bytes: u64) {
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.tx_bits
            .fetch_add(tx_bytes.saturating_mul(8), Ordering::Relaxed);
        self.rx_bits
            .fetch_add(rx_bytes.saturating_mul(8), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            tx_bits: self.tx_bits.load(Ordering::Relaxed),
            rx_bits: self.rx_bits.load(Ordering::Relaxed),
        }
    }
}

/// 端点累计收发字节。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointTotals {
    pub sent_bytes: u64,
    pub received_bytes: u64,
    pub transactions: u64,
}

/// 进程级端点统计（串口名或 host:port → 累计字节）。
#[derive(Debug, Default)]
pub struct EndpointStatistics {
    endpoints: RwLock<HashMap<String, EndpointTotals>>,
}

impl EndpointStatistics {
    pub fn record(&self, endpoint: &str, sent_bytes: u64, received_bytes: u64) {
        let mut endpoints = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let totals = endpoints.entry(endpoint.to_string()).or_default();
        totals.sent_bytes = totals.sent_bytes.saturating_add(sent_bytes);
        totals.received_bytes = totals.received_bytes.saturating_add(received_bytes);
        totals.transactions += 1;
    }

    /// 查询单个端点；从未记录时为零。
    pub fn get(&self, endpoint: &str) -> EndpointTotals {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .copied()
            .unwrap_or_default()
    }

    /// 所有端点，按名称排序。
    pub fn all(&self) -> Vec<(String, EndpointTotals)> {
        let endpoints = self
            .endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = endpoints
            .iter()
            .map(|(name, totals)| (name.clone(), *totals))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

static ENDPOINTS: OnceLock<EndpointStatistics> = OnceLock::new();

/// 获取全局端点统计。
pub fn endpoint_statistics() -> &'static EndpointStatistics {
    ENDPOINTS.get_or_init(EndpointStatistics::default)
}

/// 轮询指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub poll_cycles: u64,
    pub poll_failures: u64,
    pub decode_failures: u64,
    pub write_success: u64,
    pub write_failure: u64,
}

/// 轮询指标。
#[derive(Debug, Default)]
pub struct PollMetrics {
    poll_cycles: AtomicU64,
    poll_failures: AtomicU64,
    decode_failures: AtomicU64,
    write_success: AtomicU64,
    write_failure: AtomicU64,
}

impl PollMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            write_success: self.write_success.load(Ordering::Relaxed),
            write_failure: self.write_failure.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<PollMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static PollMetrics {
    METRICS.get_or_init(PollMetrics::default)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的设备会话 ID，同时用作总线使用者标识。
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录完成的轮询周期。
pub fn record_poll_cycle() {
    metrics().poll_cycles.fetch_add(1, Ordering::Relaxed);
}

/// 记录失败的轮询周期。
pub fn record_poll_failure() {
    metrics().poll_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录点位解码失败。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入成功次数。
pub fn record_write_success() {
    metrics().write_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入失败次数。
pub fn record_write_failure() {
    metrics().write_failure.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_bits() {
        let counters = TrafficCounters::new();
        counters.record(8, 9);
        counters.record(12, 8);
        assert_eq!(
            counters.snapshot(),
            TrafficSnapshot {
                tx_packets: 2,
                rx_packets: 2,
                tx_bits: 160,
                rx_bits: 136,
            }
        );
    }

    #[test]
    fn endpoint_totals_per_name() {
        let stats = EndpointStatistics::default();
        stats.record("/dev/ttyUSB0", 8, 11);
        stats.record("/dev/ttyUSB0", 8, 11);
        stats.record("10.0.0.5:502", 12, 15);
        assert_eq!(
            stats.get("/dev/ttyUSB0"),
            EndpointTotals {
                sent_bytes: 16,
                received_bytes: 22,
                transactions: 2,
            }
        );
        assert_eq!(stats.get("missing"), EndpointTotals::default());
        let names: Vec<_> = stats.all().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["/dev/ttyUSB0", "10.0.0.5:502"]);
    }
}
