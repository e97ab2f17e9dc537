//! Distributor 指标模块
//!
//! 把 `DistributorStats` / `OutcomeStats` 快照发布到 `metrics` facade，
//! 并在内存中计算两次快照之间的吞吐率。

use std::time::{Duration, Instant};

use contracts::{DistributorStats, OutcomeStats};
use metrics::{counter, gauge};

/// 从 DistributorStats 快照记录指标
///
/// 快照里的计数是累计值，所以用 `absolute` 写入 counter。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_distributor_stats;
///
/// record_distributor_stats(&distributor.stats());
/// ```
pub fn record_distributor_stats(stats: &DistributorStats) {
    counter!("alert_distributor_messages_enqueued_total").absolute(stats.enqueued);
    counter!("alert_distributor_messages_dispatched_total").absolute(stats.dispatched);

    counter!("alert_distributor_messages_dropped_total", "reason" => "queue_full")
        .absolute(stats.dropped_full);
    counter!("alert_distributor_messages_dropped_total", "reason" => "shutdown")
        .absolute(stats.rejected_shutdown);

    counter!("alert_distributor_delivery_failures_total").absolute(stats.delivery_failures);
    counter!("alert_distributor_delivery_timeouts_total").absolute(stats.delivery_timeouts);

    gauge!("alert_distributor_queue_depth").set(stats.queue_len as f64);
    gauge!("alert_distributor_ingestion_units").set(stats.ingestion_units as f64);
}

/// 记录单个 worker-pool target 的任务结果统计
pub fn record_outcome_stats(target: &str, stats: &OutcomeStats) {
    let outcomes = [
        ("completed", stats.completed),
        ("timed_out", stats.timed_out),
        ("cancelled", stats.cancelled),
        ("errored", stats.errored),
    ];

    counter!("alert_distributor_tasks_submitted_total", "target" => target.to_string())
        .absolute(stats.submitted);
    for (outcome, value) in outcomes {
        counter!(
            "alert_distributor_task_outcomes_total",
            "target" => target.to_string(),
            "outcome" => outcome
        )
        .absolute(value);
    }
    gauge!("alert_distributor_tasks_pending", "target" => target.to_string())
        .set(stats.pending() as f64);
}

/// 吞吐率跟踪器
///
/// 保存上一次快照，按时间差计算入队/分发速率。
#[derive(Debug, Clone, Default)]
pub struct ThroughputTracker {
    last: Option<(Instant, DistributorStats)>,
}

impl ThroughputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录新快照，返回与上一次快照之间的摘要
    ///
    /// 第一次调用只建立基线，返回 `None`。
    pub fn update(&mut self, stats: DistributorStats, now: Instant) -> Option<ThroughputSummary> {
        let previous = self.last.replace((now, stats));
        let (then, before) = previous?;

        let elapsed = now.saturating_duration_since(then);
        let secs = elapsed.as_secs_f64();
        let rate = |delta: u64| if secs > 0.0 { delta as f64 / secs } else { 0.0 };

        Some(ThroughputSummary {
            interval: elapsed,
            enqueued_per_sec: rate(stats.enqueued.saturating_sub(before.enqueued)),
            dispatched_per_sec: rate(stats.dispatched.saturating_sub(before.dispatched)),
            dropped: (stats.dropped_full + stats.rejected_shutdown)
                .saturating_sub(before.dropped_full + before.rejected_shutdown),
            failures: (stats.delivery_failures + stats.delivery_timeouts)
                .saturating_sub(before.delivery_failures + before.delivery_timeouts),
            queue_len: stats.queue_len,
        })
    }

    /// 清除基线
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// 两次快照之间的吞吐摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThroughputSummary {
    pub interval: Duration,
    pub enqueued_per_sec: f64,
    pub dispatched_per_sec: f64,
    /// 区间内丢弃的消息（队列满 + 关闭中拒绝）
    pub dropped: u64,
    /// 区间内投递失败或超时的次数
    pub failures: u64,
    pub queue_len: usize,
}

impl std::fmt::Display for ThroughputSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "enqueued={:.1}/s dispatched={:.1}/s dropped={} failures={} queued={} (over {:.1}s)",
            self.enqueued_per_sec,
            self.dispatched_per_sec,
            self.dropped,
            self.failures,
            self.queue_len,
            self.interval.as_secs_f64()
        )
    }
}
