//! meetq-core
//!
//! Job queue for meeting imports: submission is decoupled from processing so
//! request handlers never wait on transcription or extraction.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（MeetingImportJob, codec, QueueMessage, errors）
//! - **ports**: 抽象化レイヤー（JobQueue, Worker, QueueTransport, JobHandler, PoisonSink）
//! - **impls**: 実装（InProcessQueue, DurableQueue, InMemoryTransport, poison sinks）
//! - **app**: アプリケーションロジック（QueueBuilder, QueueWorker, lease 更新, 設定）
//! - **observability**: ワーカーのカウンタと tracing の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
