//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **QueueBuilder**: キューとワーカーの構築とワイヤリング
//! - **QueueWorker**: durable キューのポーリングループ（receive→handle→delete）
//! - **Lease / LeaseKeeper**: メッセージ単位の lease 更新
//! - **WorkerConfig / Settings**: 設定値と環境変数の読み込み

pub mod builder;
pub mod config;
pub mod lease;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{Backend, BuildError, MeetingQueue, MeetingWorker, QueueBuilder};
pub use self::config::{BackendKind, ConfigError, EnvKey, MAX_BATCH_SIZE, Settings, WorkerConfig};
pub use self::lease::Lease;
pub use self::worker_loop::{PollOutcome, QueueWorker};
