//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InProcessQueue**: 単一プロセス用（JobQueue + Worker）
//! - **DurableQueue**: QueueTransport 経由の投入側（JobQueue）
//! - **InMemoryTransport**: 開発・テスト用の QueueTransport
//! - **LogPoisonSink / TransportPoisonSink**: poison message の退避先
//!
//! # 本番用実装
//! クラウドキュー（Azure Storage Queue など）の QueueTransport は別クレートに
//! 配置します。

pub mod durable;
pub mod inmem_transport;
pub mod inprocess;
pub mod poison;

// 主要な型を再エクスポート
pub use self::durable::DurableQueue;
pub use self::inmem_transport::{InMemoryTransport, TransportCall};
pub use self::inprocess::{InProcessQueue, WorkerState};
pub use self::poison::{LogPoisonSink, TransportPoisonSink};
