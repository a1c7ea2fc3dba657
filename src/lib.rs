pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod pipeline;
pub mod pricing;

pub use config::Config;
pub use datasource::{MockTransactionSource, TransactionSource};
pub use db::{init_db, MemorySnapshotStore, Repository, SnapshotStore};
pub use domain::{Account, Currency, Decimal, Scope, TimeMs, Transaction, TransactionType};
pub use engine::{GainEvent, LedgerError, Portfolio, Term, VirtualWallet};
pub use error::AppError;
pub use orchestration::ReportService;
pub use pipeline::{CapGainsReport, ReportError, ReportingPipeline};
pub use pricing::{CoinbasePriceOracle, PriceOracle, StaticPriceOracle};
