//! ループ設定
//!
//! JSONなどの部分的な設定から読み込めるよう、全フィールドにデフォルトを持つ。

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// シミュレーションループ設定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// calculusサブステップの最大幅（秒）
    pub max_substep_dt: f64,
    /// tickの経過時間がサブステップ幅の何倍を超えたら切り詰めるか
    pub max_dt_ratio: f64,
    /// update駆動の呼び出し間隔（ミリ秒）
    pub tick_interval_ms: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_substep_dt: 0.02,
            max_dt_ratio: 10.0,
            tick_interval_ms: 10,
        }
    }
}

impl LoopConfig {
    /// 1tickで進める最大時間（秒）
    pub fn max_delta(&self) -> f64 {
        self.max_substep_dt * self.max_dt_ratio
    }

    pub fn validate(&self) -> EcsResult<()> {
        if !self.max_substep_dt.is_finite() || self.max_substep_dt <= 0.0 {
            return Err(EcsError::InvalidConfig(format!(
                "max_substep_dt must be a positive number of seconds, got {}",
                self.max_substep_dt
            )));
        }
        if !self.max_dt_ratio.is_finite() || self.max_dt_ratio < 1.0 {
            return Err(EcsError::InvalidConfig(format!(
                "max_dt_ratio must be at least 1, got {}",
                self.max_dt_ratio
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(EcsError::InvalidConfig(
                "tick_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoopConfig::default();
        assert_eq!(config.max_substep_dt, 0.02);
        assert_eq!(config.max_dt_ratio, 10.0);
        assert!((config.max_delta() - 0.2).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: LoopConfig = serde_json::from_str(r#"{ "max_substep_dt": 0.01 }"#).unwrap();
        assert_eq!(config.max_substep_dt, 0.01);
        assert_eq!(config.max_dt_ratio, 10.0);
        assert_eq!(config.tick_interval_ms, 10);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LoopConfig {
            max_substep_dt: 0.005,
            max_dt_ratio: 4.0,
            tick_interval_ms: 16,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<LoopConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            LoopConfig {
                max_substep_dt: 0.0,
                ..Default::default()
            },
            LoopConfig {
                max_substep_dt: f64::NAN,
                ..Default::default()
            },
            LoopConfig {
                max_dt_ratio: 0.5,
                ..Default::default()
            },
            LoopConfig {
                tick_interval_ms: 0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(EcsError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }
}
