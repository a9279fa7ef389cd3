//! ユーティリティモジュール
//!
//! console_log マクロ、エラー変換など

use ecs_runtime::EcsError;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

/// コンソールにログ出力するマクロ
macro_rules! console_log {
    ($($t:tt)*) => (crate::utils::log(&format_args!($($t)*).to_string()))
}
pub(crate) use console_log;

/// ランタイムエラーをJSの Error に変換
pub fn to_js_error(err: EcsError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// メッセージからJSの Error を作成
pub fn js_error(message: &str) -> JsValue {
    js_sys::Error::new(message).into()
}
