// ==========================================
// 报价材料引擎 - 配置层
// ==========================================
// 职责: 规则配置的定义、加载与校验
// 红线: 引擎绝不修改配置; 配置归调用层所有
// ==========================================

pub mod rule_config;

pub use rule_config::{
    ClassificationRule, ConfigError, FormulaGroup, FormulaRule, RuleConfig, RuleConfigIssue,
};
