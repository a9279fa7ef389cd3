//! # ECS Error Types
//!
//! 呼び出し側のプログラミングエラーを表すエラー型。
//! 想定内の失敗（重複追加、存在しないコンポーネントの削除など）は
//! エラーではなく `bool` / `Option` で返す。

use thiserror::Error;

use crate::schedule::SystemId;

/// ECSランタイムのエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EcsError {
    /// 同名のコンポーネント型が既に登録されている
    #[error("component type `{0}` is already defined")]
    DuplicateName(String),

    /// コンポーネント型名が不正
    #[error("invalid component type name `{name}`: {reason}")]
    InvalidName {
        /// 指定された名前
        name: String,
        /// 不正な理由
        reason: &'static str,
    },

    /// 静的デフォルト値がエンティティ間で可変状態を共有してしまう
    #[error("component type `{0}` has a shared mutable default; use a factory instead")]
    InvalidDefault(String),

    /// 期待される種類の値ではない（別Worldのハンドル、空の名前など）
    #[error("type mismatch: expected {expected}")]
    TypeMismatch {
        /// 期待していたもの
        expected: &'static str,
    },

    /// before/after 制約の下限が上限を超えている
    #[error("inconsistent system ordering: lower bound {lower} exceeds upper bound {upper}")]
    InconsistentOrdering {
        /// `after` から導出された下限
        lower: f64,
        /// `before` から導出された上限
        upper: f64,
    },

    /// 優先度が有限の数値ではない
    #[error("system priority must be finite, got {0}")]
    InvalidPriority(f64),

    /// 未登録のSystemを参照した
    #[error("unknown system {0}")]
    UnknownSystem(SystemId),

    /// ループ設定が不正
    #[error("invalid loop configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EcsError::DuplicateName("position".to_string());
        assert_eq!(err.to_string(), "component type `position` is already defined");

        let err = EcsError::InconsistentOrdering { lower: 4.9, upper: 1.1 };
        assert_eq!(
            err.to_string(),
            "inconsistent system ordering: lower bound 4.9 exceeds upper bound 1.1"
        );

        let err = EcsError::TypeMismatch { expected: "non-empty entity name" };
        assert_eq!(err.to_string(), "type mismatch: expected non-empty entity name");
    }
}
