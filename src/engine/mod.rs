// ==========================================
// 报价材料引擎 - 引擎层
// ==========================================
// 职责: 实现分类与派生业务规则
// 红线: 引擎纯同步、无 I/O; 唯一共享可变状态是覆盖库,
//       且只能经引擎写路径变更
// ==========================================

pub mod classifier;
pub mod deriver;
pub mod formula;
pub mod sheet_store;

// 重导出核心引擎
pub use classifier::{ClassifierEngine, StreamPartition};
pub use deriver::{DerivationEngine, QuotationDerivation};
pub use formula::{FormulaError, FormulaEvaluator, BASE_QTY_VAR};
pub use sheet_store::MaterialSheetStore;
