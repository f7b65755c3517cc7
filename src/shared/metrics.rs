//! Prometheus Metrics Module
//!
//! 提供计算服务的核心运行指标
//!
//! ## 指标类型
//! - **Counter**: 连接总数（接受/拒绝）、请求总数、错误总数、缓存命中
//! - **Histogram**: 计算耗时
//! - **Gauge**: 活跃连接数、正在执行的计算数
//!
//! ## 使用示例
//! ```rust,ignore
//! use topmoves_service::shared::metrics::METRICS;
//!
//! // 记录一次请求
//! METRICS.requests_total.with_label_values(&["top_moves_hybrid", "ok"]).inc();
//!
//! // 记录计算耗时
//! let timer = METRICS.compute_duration.with_label_values(&["ok"]).start_timer();
//! // ... 执行计算 ...
//! timer.observe_duration();
//! ```

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    /// 全局Metrics实例
    pub static ref METRICS: Metrics = Metrics::new();
}

/// 计算服务核心指标
pub struct Metrics {
    /// 连接总数 (按结果: accepted/rejected)
    pub connections_total: CounterVec,

    /// 活跃连接数 (按前端: tcp/http)
    pub active_connections: GaugeVec,

    /// 请求总数 (按操作和结果码)
    pub requests_total: CounterVec,

    /// 计算耗时分布 (秒)
    pub compute_duration: HistogramVec,

    /// 正在执行的计算数
    pub computations_in_flight: GaugeVec,

    /// 错误总数 (按大类和错误码)
    pub errors_total: CounterVec,

    /// 结果缓存查询 (hit/miss)
    pub cache_lookups: CounterVec,
}

impl Metrics {
    /// 创建新的Metrics实例
    pub fn new() -> Self {
        Self {
            connections_total: register_counter_vec!(
                "topmoves_connections_total",
                "Total number of client connections by admission result",
                &["result"]
            )
            .expect("register topmoves_connections_total"),

            active_connections: register_gauge_vec!(
                "topmoves_active_connections",
                "Number of connections currently being handled",
                &["frontend"]
            )
            .expect("register topmoves_active_connections"),

            requests_total: register_counter_vec!(
                "topmoves_requests_total",
                "Total number of requests by operation and outcome",
                &["op", "outcome"]
            )
            .expect("register topmoves_requests_total"),

            compute_duration: register_histogram_vec!(
                "topmoves_compute_duration_seconds",
                "Search duration in seconds",
                &["outcome"],
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            )
            .expect("register topmoves_compute_duration_seconds"),

            computations_in_flight: register_gauge_vec!(
                "topmoves_computations_in_flight",
                "Number of searches currently running on worker threads",
                &["engine"]
            )
            .expect("register topmoves_computations_in_flight"),

            errors_total: register_counter_vec!(
                "topmoves_errors_total",
                "Total number of errors",
                &["category", "code"]
            )
            .expect("register topmoves_errors_total"),

            cache_lookups: register_counter_vec!(
                "topmoves_cache_lookups_total",
                "Result cache lookups",
                &["result"]
            )
            .expect("register topmoves_cache_lookups_total"),
        }
    }

    /// 已处理的请求总数（所有操作和结果）
    pub fn total_requests(&self) -> u64 {
        self.requests_total
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .map(|metric| metric.get_counter().get_value())
            .sum::<f64>() as u64
    }

    /// 导出Prometheus格式的指标
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "指标编码失败");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
