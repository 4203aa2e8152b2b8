//! App - ワイヤリングとバックグラウンドループ
//!
//! # 構成
//! - **AppBuilder**: 汎用キューの構築、起動時のハンドラ検証
//! - **GenericQueue**: 型付きプロデューサ
//! - **Scheduler**: main / retry / reaper ループ（と feed タスク）の起動

pub mod builder;
pub mod producer;
pub mod scheduler;

mod reaper_loop;
mod retry_loop;
mod worker_loop;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::producer::GenericQueue;
pub use self::scheduler::{Scheduler, SchedulerHandle, WakeStrategy};
