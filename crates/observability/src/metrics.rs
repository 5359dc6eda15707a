//! GrandOutput 指标收集模块
//!
//! 记录日志行分发、重新配置、Sink 激活以及请求结果等运行指标。

use std::collections::BTreeMap;

use contracts::LogLevel;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// 注册指标说明 (exporter 安装后调用一次)
pub fn describe_metrics() {
    describe_counter!("grand_output_lines_total", "Log lines fanned out, by level");
    describe_counter!(
        "grand_output_lines_without_sink_total",
        "Log lines dispatched while no sink was active"
    );
    describe_counter!("grand_output_reconfigurations_total", "Applied configuration snapshots");
    describe_gauge!("grand_output_active_sinks", "Sinks in the active view");
    describe_counter!(
        "grand_output_reconfiguration_failures_total",
        "Sinks excluded because their activation failed"
    );
    describe_histogram!("grand_output_reconfiguration_ms", "Reconciliation duration (ms)");
    describe_counter!("grand_output_sink_activations_total", "Sink activations, by kind and status");
    describe_counter!("grand_output_requests_total", "Guarded units of work, by outcome");
    describe_counter!("grand_output_critical_errors_total", "Critical errors, emitted or dropped");
}

/// 记录一条分发的日志行
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_line_dispatched;
///
/// record_line_dispatched(line.level, view.len());
/// ```
pub fn record_line_dispatched(level: LogLevel, sink_count: usize) {
    counter!("grand_output_lines_total", "level" => level.as_str()).increment(1);
    if sink_count == 0 {
        counter!("grand_output_lines_without_sink_total").increment(1);
    }
}

/// 记录一次重新配置
pub fn record_reconfiguration(active_sinks: usize, failed: usize, duration_ms: f64) {
    counter!("grand_output_reconfigurations_total").increment(1);
    gauge!("grand_output_active_sinks").set(active_sinks as f64);
    if failed > 0 {
        counter!("grand_output_reconfiguration_failures_total").increment(failed as u64);
    }
    histogram!("grand_output_reconfiguration_ms").record(duration_ms);
}

/// 记录 Sink 激活
pub fn record_sink_activation(kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "grand_output_sink_activations_total",
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录请求结果 (completed / faulted / canceled)
pub fn record_request(outcome: &'static str) {
    counter!("grand_output_requests_total", "outcome" => outcome).increment(1);
}

/// 记录关键错误
pub fn record_critical_error(emitted: bool) {
    let status = if emitted { "emitted" } else { "dropped" };
    counter!("grand_output_critical_errors_total", "status" => status).increment(1);
}

/// 输出指标聚合器
///
/// 在内存中聚合指标，便于命令行退出时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct OutputMetricsAggregator {
    /// 各级别日志行数
    pub lines_by_level: BTreeMap<LogLevel, u64>,

    /// 重新配置次数
    pub reconfigurations: u64,

    /// 激活失败的 Sink 数
    pub failed_activations: u64,

    /// 重新配置耗时统计 (毫秒)
    pub reconcile_stats: RunningStats,
}

impl OutputMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条日志行
    pub fn record_line(&mut self, level: LogLevel) {
        *self.lines_by_level.entry(level).or_default() += 1;
    }

    /// 记录一次重新配置
    pub fn record_reconfiguration(&mut self, failed: usize, duration_ms: f64) {
        self.reconfigurations += 1;
        self.failed_activations += failed as u64;
        self.reconcile_stats.push(duration_ms);
    }

    /// 日志行总数
    pub fn total_lines(&self) -> u64 {
        self.lines_by_level.values().sum()
    }

    /// 获取摘要
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_lines: self.total_lines(),
            lines_by_level: self.lines_by_level.clone(),
            reconfigurations: self.reconfigurations,
            failed_activations: self.failed_activations,
            reconcile_ms: StatsSummary::from(&self.reconcile_stats),
        }
    }

    /// 重置所有统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub total_lines: u64,
    pub lines_by_level: BTreeMap<LogLevel, u64>,
    pub reconfigurations: u64,
    pub failed_activations: u64,
    pub reconcile_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== GrandOutput Summary ===")?;
        writeln!(f, "Lines: {}", self.total_lines)?;
        for (level, count) in &self.lines_by_level {
            writeln!(f, "  {level}: {count}")?;
        }
        writeln!(
            f,
            "Reconfigurations: {} (failed activations: {})",
            self.reconfigurations, self.failed_activations
        )?;
        write!(f, "Reconcile (ms): {}", self.reconcile_ms)
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
            min: stats.min(),
            max: stats.max(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
