//! ループ時刻管理
//!
//! update駆動（tick）とdraw駆動（frame）はそれぞれ前回時刻を持ち、互いに同期しない。
//! 共有するのはtickで記録した圧縮率のみ。
//!
//! 時刻はホストのミリ秒（`performance.now()` 相当）、経過時間は秒で扱う。

use tracing::debug;

use super::config::LoopConfig;

/// サブステップ数計算時の誤差許容（0.2 / 0.02 = 10.000000000000002 対策）
const SUBSTEP_TOLERANCE: f64 = 1e-9;

/// earlyUpdate / update / draw に渡す時刻情報
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// 経過時間（秒）
    pub delta: f64,
    /// 今回の時刻（ミリ秒）
    pub now: f64,
    /// 前回の時刻（ミリ秒）
    pub before: f64,
}

/// 1tick分の時間配分
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// 切り詰め後の時刻情報
    pub time: FrameTime,
    /// calculusのサブステップ数
    pub substeps: u32,
    /// サブステップ1回の幅（秒）
    pub substep_dt: f64,
    /// 圧縮率（切り詰め後 / 実経過）。切り詰めなしなら1
    pub compression: f64,
}

/// tick / frame の時刻を管理する
#[derive(Debug, Clone)]
pub struct LoopClock {
    max_substep_dt: f64,
    max_delta: f64,
    running: bool,
    last_tick: f64,
    last_frame: f64,
    compression: f64,
}

impl LoopClock {
    pub fn new(config: &LoopConfig) -> Self {
        Self {
            max_substep_dt: config.max_substep_dt,
            max_delta: config.max_delta(),
            running: false,
            last_tick: 0.0,
            last_frame: 0.0,
            compression: 1.0,
        }
    }

    /// 両駆動の基準時刻をリセットして開始
    pub fn start(&mut self, now: f64) {
        self.running = true;
        self.last_tick = now;
        self.last_frame = now;
        self.compression = 1.0;
    }

    /// 停止。動作中だった場合true
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 直近のtickで記録した圧縮率
    pub fn compression(&self) -> f64 {
        self.compression
    }

    /// update駆動の1tick分を計算。停止中はNone
    pub fn tick(&mut self, now: f64) -> Option<TickReport> {
        if !self.running {
            return None;
        }
        let before = std::mem::replace(&mut self.last_tick, now);
        let actual = elapsed_secs(before, now);

        let (delta, compression) = if actual > self.max_delta {
            (self.max_delta, self.max_delta / actual)
        } else {
            (actual, 1.0)
        };
        if compression < 1.0 {
            debug!(actual, clamped = delta, compression, "tick delta clamped");
        }
        self.compression = compression;

        let substeps = if delta > 0.0 {
            ((delta / self.max_substep_dt - SUBSTEP_TOLERANCE).ceil() as u32).max(1)
        } else {
            0
        };
        let substep_dt = if substeps > 0 {
            delta / f64::from(substeps)
        } else {
            0.0
        };

        Some(TickReport {
            time: FrameTime { delta, now, before },
            substeps,
            substep_dt,
            compression,
        })
    }

    /// draw駆動の1frame分を計算。経過時間は圧縮率で縮める。停止中はNone
    pub fn frame(&mut self, now: f64) -> Option<FrameTime> {
        if !self.running {
            return None;
        }
        let before = std::mem::replace(&mut self.last_frame, now);
        Some(FrameTime {
            delta: elapsed_secs(before, now) * self.compression,
            now,
            before,
        })
    }
}

/// ミリ秒の時刻差を秒に変換（巻き戻りは0）
fn elapsed_secs(before: f64, now: f64) -> f64 {
    ((now - before) / 1000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> LoopClock {
        let mut clock = LoopClock::new(&LoopConfig::default());
        clock.start(1000.0);
        clock
    }

    #[test]
    fn test_substeps() {
        let mut clock = started();
        let report = clock.tick(1050.0).unwrap();

        assert!((report.time.delta - 0.05).abs() < 1e-12);
        assert_eq!(report.substeps, 3);
        assert!((report.substep_dt - 0.05 / 3.0).abs() < 1e-12);
        assert_eq!(report.compression, 1.0);
        assert_eq!(report.time.before, 1000.0);
        assert_eq!(report.time.now, 1050.0);
    }

    #[test]
    fn test_exact_multiple_has_no_extra_step() {
        let mut clock = started();
        let report = clock.tick(1200.0).unwrap();
        assert_eq!(report.substeps, 10);

        let report = clock.tick(1220.0).unwrap();
        assert_eq!(report.substeps, 1);
    }

    #[test]
    fn test_clamping() {
        let mut clock = started();
        let report = clock.tick(6000.0).unwrap();

        assert!((report.time.delta - 0.2).abs() < 1e-12);
        assert!((report.compression - 0.04).abs() < 1e-12);
        assert_eq!(report.substeps, 10);
        assert!((clock.compression() - 0.04).abs() < 1e-12);

        // 次のtickで切り詰めがなければ1に戻る
        clock.tick(6010.0).unwrap();
        assert_eq!(clock.compression(), 1.0);
    }

    #[test]
    fn test_frame_scaled_by_compression() {
        let mut clock = started();
        clock.tick(6000.0).unwrap();

        let time = clock.frame(1500.0).unwrap();
        assert!((time.delta - 0.5 * 0.04).abs() < 1e-12);
        assert_eq!(time.before, 1000.0);
    }

    #[test]
    fn test_zero_and_negative_delta() {
        let mut clock = started();

        let report = clock.tick(1000.0).unwrap();
        assert_eq!(report.substeps, 0);
        assert_eq!(report.time.delta, 0.0);

        let report = clock.tick(900.0).unwrap();
        assert_eq!(report.substeps, 0);
        assert_eq!(report.time.delta, 0.0);
    }

    #[test]
    fn test_stopped_clock() {
        let mut clock = LoopClock::new(&LoopConfig::default());
        assert!(clock.tick(10.0).is_none());
        assert!(clock.frame(10.0).is_none());
        assert!(!clock.stop());

        clock.start(0.0);
        assert!(clock.stop());
        assert!(!clock.stop());
        assert!(clock.tick(20.0).is_none());
    }

    #[test]
    fn test_restart_discards_timing_state() {
        let mut clock = started();
        clock.tick(6000.0).unwrap();

        clock.start(10_000.0);
        assert_eq!(clock.compression(), 1.0);
        let report = clock.tick(10_020.0).unwrap();
        assert_eq!(report.time.before, 10_000.0);
        assert_eq!(report.substeps, 1);
    }
}
