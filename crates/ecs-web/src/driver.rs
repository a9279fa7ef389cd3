//! ブラウザのタイマーでSimulationを駆動する
//!
//! - update駆動: `setInterval` ごとに `Simulation::tick(performance.now())`
//! - draw駆動: `requestAnimationFrame` ごとに `Simulation::frame(timestamp)`（自身を再登録）

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ecs_runtime::Simulation;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Window;

use crate::utils::{console_log, js_error};

type FrameLoop = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// タイマーのクロージャと共有するSimulation
///
/// 借用中に停止を要求された場合は保留し、次に借用できたときに停止する。
pub(crate) struct SharedSimulation {
    simulation: RefCell<Simulation>,
    stop_pending: Cell<bool>,
}

impl SharedSimulation {
    pub(crate) fn new(simulation: Simulation) -> Self {
        Self {
            simulation: RefCell::new(simulation),
            stop_pending: Cell::new(false),
        }
    }

    /// Simulationを操作する。借用中ならNone
    /// 保留中の停止があれば `f` の前に適用する
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> Option<R> {
        let mut simulation = self.simulation.try_borrow_mut().ok()?;
        if self.stop_pending.take() {
            simulation.stop();
        }
        Some(f(&mut simulation))
    }

    /// 停止する。借用中で保留した場合false
    pub(crate) fn request_stop(&self) -> bool {
        match self.simulation.try_borrow_mut() {
            Ok(mut simulation) => {
                self.stop_pending.set(false);
                simulation.stop();
                true
            }
            Err(_) => {
                self.stop_pending.set(true);
                false
            }
        }
    }

    pub(crate) fn is_stop_pending(&self) -> bool {
        self.stop_pending.get()
    }
}

/// 動作中のタイマーハンドル
struct Timers {
    window: Window,
    interval: i32,
    _tick: Closure<dyn FnMut()>,
    /// 予約中のanimation frame
    frame_id: Rc<Cell<Option<i32>>>,
    frame_loop: FrameLoop,
}

impl Timers {
    fn clear(self) {
        self.window.clear_interval_with_handle(self.interval);
        if let Some(id) = self.frame_id.take() {
            // 解放済みクロージャが呼ばれないよう先に取り消す
            if let Err(err) = self.window.cancel_animation_frame(id) {
                console_log!("failed to cancel animation frame {}: {:?}", id, err);
            }
        }
        // 自己参照を断ち切ってクロージャを解放
        self.frame_loop.borrow_mut().take();
    }
}

/// Simulationとブラウザのタイマーを結びつける
pub struct WebDriver {
    shared: Rc<SharedSimulation>,
    timers: Option<Timers>,
}

impl WebDriver {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            shared: Rc::new(SharedSimulation::new(simulation)),
            timers: None,
        }
    }

    /// Simulationを操作する。駆動中のコールバックから呼ばれた場合はNone
    pub fn with_simulation<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> Option<R> {
        self.shared.with(f)
    }

    pub fn is_running(&self) -> bool {
        self.timers.is_some()
    }

    /// 駆動を開始する。動作中なら一度止めてから時刻をリセットして再開
    pub fn start(&mut self) -> Result<(), JsValue> {
        self.stop();

        let window = web_sys::window().ok_or_else(|| js_error("no global `window`"))?;
        let performance = window
            .performance()
            .ok_or_else(|| js_error("`window.performance` is unavailable"))?;

        let interval_ms = self
            .with_simulation(|simulation| {
                simulation.start(performance.now());
                simulation.config().tick_interval_ms
            })
            .ok_or_else(|| js_error("simulation is busy"))?;

        match self.install(window, performance, interval_ms) {
            Ok(timers) => {
                self.timers = Some(timers);
                console_log!("simulation started (tick every {} ms)", interval_ms);
                Ok(())
            }
            Err(err) => {
                self.shared.request_stop();
                Err(err)
            }
        }
    }

    /// 駆動を止める。開始前や停止済みでも安全
    pub fn stop(&mut self) {
        if let Some(timers) = self.timers.take() {
            timers.clear();
            console_log!("simulation stopped");
        }
        if !self.shared.request_stop() {
            console_log!("simulation is busy; stop deferred until it is released");
        }
    }

    fn install(
        &self,
        window: Window,
        performance: web_sys::Performance,
        interval_ms: u32,
    ) -> Result<Timers, JsValue> {
        // update駆動
        let shared = self.shared.clone();
        let tick = Closure::<dyn FnMut()>::new(move || {
            shared.with(|simulation| simulation.tick(performance.now()));
        });
        let interval = window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            i32::try_from(interval_ms).unwrap_or(i32::MAX),
        )?;

        // draw駆動
        let frame_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let frame_loop: FrameLoop = Rc::new(RefCell::new(None));

        let shared = self.shared.clone();
        let pending = frame_id.clone();
        let handle = frame_loop.clone();
        let frame_window = window.clone();
        *frame_loop.borrow_mut() = Some(Closure::new(move |now: f64| {
            pending.set(None);
            let running = shared
                .with(|simulation| simulation.frame(now).is_some())
                .unwrap_or(true);
            if !running {
                return;
            }
            if let Some(callback) = handle.borrow().as_ref() {
                match frame_window.request_animation_frame(callback.as_ref().unchecked_ref()) {
                    Ok(id) => pending.set(Some(id)),
                    Err(err) => console_log!("failed to request animation frame: {:?}", err),
                }
            }
        }));

        let timers = Timers {
            window,
            interval,
            _tick: tick,
            frame_id,
            frame_loop,
        };

        let first = match timers.frame_loop.borrow().as_ref() {
            Some(callback) => timers
                .window
                .request_animation_frame(callback.as_ref().unchecked_ref()),
            None => Err(js_error("frame callback missing")),
        };
        match first {
            Ok(id) => {
                timers.frame_id.set(Some(id));
                Ok(timers)
            }
            Err(err) => {
                timers.clear();
                Err(err)
            }
        }
    }
}

impl Drop for WebDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_runtime::LoopConfig;

    fn shared() -> SharedSimulation {
        let shared = SharedSimulation::new(Simulation::new(LoopConfig::default()).unwrap());
        shared.with(|simulation| simulation.start(0.0));
        shared
    }

    #[test]
    fn test_stop_when_idle() {
        let shared = shared();
        assert!(shared.request_stop());
        assert!(!shared.is_stop_pending());
        assert_eq!(shared.with(|simulation| simulation.is_running()), Some(false));
    }

    #[test]
    fn test_stop_while_borrowed_is_deferred() {
        let shared = shared();

        let deferred = shared.with(|simulation| {
            let stopped = shared.request_stop();
            (stopped, simulation.is_running())
        });
        assert_eq!(deferred, Some((false, true)));
        assert!(shared.is_stop_pending());

        // 次の借用で停止が適用され、tickは何もしない
        assert_eq!(shared.with(|simulation| simulation.tick(10.0).is_none()), Some(true));
        assert!(!shared.is_stop_pending());
        assert_eq!(shared.with(|simulation| simulation.is_running()), Some(false));
    }

    #[test]
    fn test_restart_clears_pending_stop() {
        let shared = shared();
        shared.with(|_| shared.request_stop());
        assert!(shared.is_stop_pending());

        // start は保留中の停止を適用してから再開する
        shared.with(|simulation| simulation.start(100.0));
        assert_eq!(shared.with(|simulation| simulation.is_running()), Some(true));
    }
}
