// crates/ecs-web/src/lib.rs

use wasm_bindgen::prelude::*;

use ecs_runtime::{LoopConfig, Simulation};

mod driver;
mod utils;

pub use driver::WebDriver;
use utils::{console_log, to_js_error};

// パニック時のスタックトレース表示
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// JSオブジェクトからループ設定を読み込む
/// `undefined` / `null` の場合はデフォルト。省略したフィールドもデフォルトになる
pub fn parse_config(value: JsValue) -> Result<LoopConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(LoopConfig::default());
    }
    let config: LoopConfig = serde_wasm_bindgen::from_value(value)?;
    config.validate().map_err(to_js_error)?;
    Ok(config)
}

/// Engine構造体
/// Simulationとブラウザのタイマーを統合し、JSから開始・停止できるAPIを提供
#[wasm_bindgen]
pub struct Engine {
    driver: WebDriver,
}

#[wasm_bindgen]
impl Engine {
    /// 空のWorldでEngineを作成
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Engine, JsValue> {
        let config = parse_config(config)?;
        let simulation = Simulation::new(config).map_err(to_js_error)?;
        console_log!(
            "Engine created (max substep {} s, ratio {})",
            config.max_substep_dt,
            config.max_dt_ratio
        );
        Ok(Self::from_simulation(simulation))
    }

    /// 駆動を開始（既に動作中なら時刻をリセットして再開）
    pub fn start(&mut self) -> Result<(), JsValue> {
        self.driver.start()
    }

    /// 駆動を停止
    pub fn stop(&mut self) {
        self.driver.stop();
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    /// 生存Entity数
    pub fn entity_count(&self) -> usize {
        self.driver
            .with_simulation(|simulation| simulation.world().entity_count())
            .unwrap_or(0)
    }

    /// 有効なSystem数
    pub fn system_count(&self) -> usize {
        self.driver
            .with_simulation(|simulation| simulation.scheduler().order().len())
            .unwrap_or(0)
    }
}

impl Engine {
    /// Rust側で組み立てたSimulationからEngineを作成
    pub fn from_simulation(simulation: Simulation) -> Self {
        Self {
            driver: WebDriver::new(simulation),
        }
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut WebDriver {
        &mut self.driver
    }
}
