//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 投入側（JobQueue）と処理側（Worker）を分け、クラウドキューや
//! 外部の処理はすべて trait の向こう側に置きます。
//!
//! # 設計原則
//! - JobQueue / Worker は in-process と durable の 2 実装を差し替え可能
//! - QueueTransport は at-least-once（重複はありうる、取りこぼしはない）
//! - JobHandler は meeting_id について冪等であること

pub mod handler;
pub mod job_queue;
pub mod poison;
pub mod transport;
pub mod worker;

// 主要な trait を再エクスポート
pub use self::handler::{FnHandler, JobHandler, handler_fn};
pub use self::job_queue::JobQueue;
pub use self::poison::{PoisonReason, PoisonSink};
pub use self::transport::QueueTransport;
pub use self::worker::Worker;
