// ==========================================
// 报价单材料派生与分类引擎 - 核心库
// ==========================================
// 技术栈: Rust + serde + tracing
// 系统定位: 报价决策支持(引擎纯状态进出, 持久化/导出归调用层)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 规则配置
pub mod config;

// 引擎层 - 业务规则
pub mod engine;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    DerivedMaterialItem, LineItem, MaterialSheet, SheetState, Stream, NO_SPEC_SENTINEL,
};

// 配置
pub use config::{
    ClassificationRule, ConfigError, FormulaGroup, FormulaRule, RuleConfig, RuleConfigIssue,
};

// 引擎
pub use engine::{
    ClassifierEngine, DerivationEngine, FormulaError, FormulaEvaluator, MaterialSheetStore,
    QuotationDerivation, StreamPartition, BASE_QTY_VAR,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "报价单材料派生与分类引擎";

// ==========================================
// 预编译检查
// ==========================================
