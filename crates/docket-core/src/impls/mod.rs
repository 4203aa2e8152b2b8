//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryItemStore**: テスト・デモ用のストア（change feed 付き）
//!
//! 本番用のドキュメントストア実装は別クレートで `ports::ItemStore` を実装する。

pub mod memory_store;

pub use self::memory_store::InMemoryItemStore;
