use crate::aggregation::thresholds::{ThresholdMode, TriggerStage};
use crate::types::{AccountId, ClassifiedTrade};
use std::collections::VecDeque;
use tracing::{debug, info};

/// A trade retained while inside the active window
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeWindowEntry {
    pub actor: AccountId,
    /// Positive for buys, negative for sells
    pub signed_amount: f64,
    pub timestamp_ms: i64,
}

/// First crossing of a stage's threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCrossing {
    pub stage: TriggerStage,
    pub threshold: f64,
    pub net_volume: f64,
}

/// Result of recording one trade
#[derive(Debug, Clone, PartialEq)]
pub struct WindowUpdate {
    pub net_volume: f64,
    pub entries: usize,
    /// A fresh window was opened for this trade
    pub opened: bool,
    /// Entries dropped by the slide preceding this trade
    pub expired: usize,
    pub crossing: Option<ThresholdCrossing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSnapshot {
    pub window_start_ms: Option<i64>,
    pub net_volume: f64,
    pub entries: usize,
    pub fired: Vec<TriggerStage>,
}

/// Sliding window of external net buying pressure.
///
/// `net_volume()` is always `max(0, sum of entry amounts)`. Each stage fires at
/// most once per window; only a window opened after full expiry re-arms them.
#[derive(Debug)]
pub struct VolumeWindow {
    levels: Vec<(TriggerStage, f64)>,
    window_ms: i64,
    window_start_ms: Option<i64>,
    signed_sum: f64,
    entries: VecDeque<VolumeWindowEntry>,
    fired: Vec<bool>,
}

impl VolumeWindow {
    pub fn new(mode: ThresholdMode, window_ms: i64) -> Self {
        let levels = mode.levels();
        let fired = vec![false; levels.len()];
        Self {
            levels,
            window_ms: window_ms.max(1),
            window_start_ms: None,
            signed_sum: 0.0,
            entries: VecDeque::new(),
            fired,
        }
    }

    pub fn net_volume(&self) -> f64 {
        self.signed_sum.max(0.0)
    }

    pub fn window_start_ms(&self) -> Option<i64> {
        self.window_start_ms
    }

    /// Drop all state, optionally switching mode
    pub fn reset(&mut self, mode: ThresholdMode) {
        *self = Self::new(mode, self.window_ms);
    }

    /// Record an external trade. Owned trades are ignored.
    pub fn record(&mut self, trade: &ClassifiedTrade) -> Option<WindowUpdate> {
        if trade.is_owned {
            debug!("Ignoring owned trade {}", trade.signature);
            return None;
        }
        Some(self.record_at(
            trade.actor.clone(),
            trade.signed_amount(),
            trade.timestamp_ms,
        ))
    }

    pub fn record_at(&mut self, actor: AccountId, signed_amount: f64, now_ms: i64) -> WindowUpdate {
        let (expired, opened) = if self.window_start_ms.is_none() {
            self.open(now_ms);
            (0, true)
        } else {
            self.slide(now_ms)
        };

        self.entries.push_back(VolumeWindowEntry {
            actor,
            signed_amount,
            timestamp_ms: now_ms,
        });
        self.signed_sum += signed_amount;

        let net_volume = self.net_volume();
        let crossing = self.evaluate(net_volume);

        debug!(
            "Window update: net {:.4} SOL over {} entries ({:+.4})",
            net_volume,
            self.entries.len(),
            signed_amount
        );

        WindowUpdate {
            net_volume,
            entries: self.entries.len(),
            opened,
            expired,
            crossing,
        }
    }

    /// Re-base the window if its age exceeds the window length.
    ///
    /// Returns the number of dropped entries and whether the window was
    /// re-opened empty (which re-arms every stage).
    pub fn slide(&mut self, now_ms: i64) -> (usize, bool) {
        let Some(start) = self.window_start_ms else {
            return (0, false);
        };

        if now_ms - start <= self.window_ms {
            return (0, false);
        }

        let cutoff = now_ms - self.window_ms;
        let mut dropped = 0;
        while let Some(front) = self.entries.front() {
            if front.timestamp_ms >= cutoff {
                break;
            }
            self.signed_sum -= front.signed_amount;
            self.entries.pop_front();
            dropped += 1;
        }

        match self.entries.front() {
            Some(oldest) => {
                self.window_start_ms = Some(oldest.timestamp_ms);
                debug!(
                    "Window slid: dropped {}, restarts at {} with net {:.4}",
                    dropped,
                    oldest.timestamp_ms,
                    self.net_volume()
                );
                (dropped, false)
            }
            None => {
                self.open(now_ms);
                debug!("Window expired fully, dropped {}", dropped);
                (dropped, true)
            }
        }
    }

    pub fn snapshot(&self) -> AggregationSnapshot {
        AggregationSnapshot {
            window_start_ms: self.window_start_ms,
            net_volume: self.net_volume(),
            entries: self.entries.len(),
            fired: self
                .levels
                .iter()
                .zip(self.fired.iter())
                .filter(|(_, fired)| **fired)
                .map(|((stage, _), _)| *stage)
                .collect(),
        }
    }

    fn open(&mut self, now_ms: i64) {
        self.window_start_ms = Some(now_ms);
        self.signed_sum = 0.0;
        self.entries.clear();
        self.fired.iter_mut().for_each(|flag| *flag = false);
    }

    /// Fire the lowest unfired stage that is met; at most one per update
    fn evaluate(&mut self, net_volume: f64) -> Option<ThresholdCrossing> {
        for (index, (stage, threshold)) in self.levels.iter().enumerate() {
            if self.fired[index] {
                continue;
            }
            if net_volume < *threshold {
                return None;
            }

            self.fired[index] = true;
            info!(
                "Threshold crossed: {} ({:.4} >= {:.4} SOL)",
                stage, net_volume, threshold
            );
            return Some(ThresholdCrossing {
                stage: *stage,
                threshold: *threshold,
                net_volume,
            });
        }
        None
    }
}
