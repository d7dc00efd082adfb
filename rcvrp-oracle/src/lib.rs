pub mod config;
pub mod distance;
pub mod ledger;
pub mod oracle;
pub mod permutation;
pub mod reference;
pub mod register;
pub mod selector;
pub mod tables;

pub use config::OracleConfig;
pub use oracle::{Marker, ThresholdOracle};
pub use register::{Arena, Register, RegisterKind};
pub use selector::{SelectorSet, SelectorSpace};
pub use tables::{CoefficientTables, Threshold};
