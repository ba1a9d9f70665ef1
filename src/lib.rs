//! DIP病种分组及费用测算
//!
//! 根据诊断和操作在DIP目录中查找入组记录, 再用基准分值测算支付标准和盈亏。

pub mod batch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod finance;
pub mod grouping;
pub mod lookup;
pub mod model;
pub mod normalize;
pub mod options;

pub use catalog::{Catalog, CatalogSet, CatalogStore, DiagnosisCatalog, DipCatalog, SurgeryCatalog};
pub use config::{PointCategory, Settings};
pub use error::{DipError, Result};
pub use finance::{calculate_dip_metrics, CostInputs, DipMetrics};
pub use grouping::{
    DiagnosisSelection, DipGrouper, MatchStrategy, ProcedureSelection, QueryOrder, ResolutionRequest,
    ResolutionResult,
};
pub use model::{CodeName, DiseaseType, DipGroupRecord, ProcedureCategory};
