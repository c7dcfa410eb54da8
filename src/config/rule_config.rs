// ==========================================
// 报价材料引擎 - 规则配置
// ==========================================
// 依据: 报价引擎业务规则 v0.2 - 分类关键字与派生公式配置
// ==========================================
// 职责: 配置加载、保存、校验; 引擎对配置只读
// 存储: JSON 文件(由调用层决定路径与时机)
// ==========================================

use crate::engine::formula::FormulaEvaluator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

// ==========================================
// ConfigError - 配置层错误类型
// ==========================================
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读写失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置内容解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// ClassificationRule - 分类关键字规则
// ==========================================
// 匹配口径: 子串包含, 区分大小写, 不做任何规范化
// 优先级: 外包 > 厂内 > 主体(固定, 不可配置)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    #[serde(default)]
    pub production_keywords: Vec<String>, // 厂内生产关键字(有序)
    #[serde(default)]
    pub subcontractor_keywords: Vec<String>, // 外包协力关键字(有序)
}

// ==========================================
// FormulaRule - 单条派生公式
// ==========================================
// expression 是关于唯一自由变量 baseQty 的纯算术表达式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRule {
    pub derived_name: String, // 派生材料名称
    pub expression: String,   // 数量公式(如 ceil(baseQty / 2.4 + 1))
    pub unit: String,         // 派生材料单位
}

// ==========================================
// FormulaGroup - 派生公式组
// ==========================================
// 命中口径: trigger_keyword 被报价项品名包含即命中;
//           按声明顺序取首个命中组, 公式组之间不叠加
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaGroup {
    pub trigger_keyword: String, // 触发关键字
    pub category: String,        // 派生表类别标签
    pub items: Vec<FormulaRule>, // 公式列表(有序)
}

// ==========================================
// RuleConfigIssue - 配置校验问题
// ==========================================
// 校验只产出提示, 不阻断运行: 所有运行期失败路径
// 都已退化为安全默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfigIssue {
    pub scope: String,   // 问题位置(业务线/公式组)
    pub message: String, // 问题描述
}

// ==========================================
// RuleConfig - 规则配置全集
// ==========================================
// 所有权: 归调用层(报价编辑器)所有, 引擎只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// 按业务线组织的分类规则(如 fence / modular_house)
    #[serde(default)]
    pub classification: BTreeMap<String, ClassificationRule>,
    /// 派生公式组(有序, 首个命中生效)
    #[serde(default)]
    pub formula_groups: Vec<FormulaGroup>,
}

impl RuleConfig {
    /// 查询指定业务线的分类规则
    pub fn classification_rule(&self, business_line: &str) -> Option<&ClassificationRule> {
        self.classification.get(business_line)
    }

    /// 从 JSON 文件加载配置
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: RuleConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// 保存配置到 JSON 文件
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// 配置静态校验
    ///
    /// # 检查项
    /// - 空的分类关键字(空串会命中所有品名)
    /// - 空的触发关键字(同上)
    /// - 无法解析的派生公式(运行期会退化为 baseQty)
    /// - 空的派生材料名称
    ///
    /// # 返回
    /// - 问题列表(可能为空); 校验不修改配置, 不阻断任何操作
    pub fn validate(&self) -> Vec<RuleConfigIssue> {
        let mut issues = Vec::new();
        let evaluator = FormulaEvaluator::new();

        for (line, rule) in &self.classification {
            for kw in rule
                .production_keywords
                .iter()
                .chain(rule.subcontractor_keywords.iter())
            {
                if kw.is_empty() {
                    issues.push(RuleConfigIssue {
                        scope: format!("classification/{}", line),
                        message: "空关键字会命中所有品名".to_string(),
                    });
                }
            }
        }

        for group in &self.formula_groups {
            let scope = format!("formula_group/{}", group.trigger_keyword);
            if group.trigger_keyword.is_empty() {
                issues.push(RuleConfigIssue {
                    scope: scope.clone(),
                    message: "空触发关键字会命中所有品名".to_string(),
                });
            }
            for rule in &group.items {
                if rule.derived_name.is_empty() {
                    issues.push(RuleConfigIssue {
                        scope: scope.clone(),
                        message: "派生材料名称为空".to_string(),
                    });
                }
                if let Err(e) = evaluator.check(&rule.expression) {
                    issues.push(RuleConfigIssue {
                        scope: scope.clone(),
                        message: format!("公式 `{}` 无法解析: {}", rule.expression, e),
                    });
                }
            }
        }

        issues
    }
}

// ==========================================
// 内置默认配置
// ==========================================
// 两条标准业务线: 圍籬(fence) 与 組合屋(modular_house)
// 公式按现场经验口径配置, 取整由公式自身负责
impl Default for RuleConfig {
    fn default() -> Self {
        let mut classification = BTreeMap::new();

        classification.insert(
            "fence".to_string(),
            ClassificationRule {
                production_keywords: vec![
                    "圍籬".to_string(),
                    "大門".to_string(),
                    "告示牌".to_string(),
                ],
                subcontractor_keywords: vec![
                    "運費".to_string(),
                    "吊車".to_string(),
                    "安裝費".to_string(),
                    "拆除".to_string(),
                ],
            },
        );

        classification.insert(
            "modular_house".to_string(),
            ClassificationRule {
                production_keywords: vec![
                    "組合屋".to_string(),
                    "隔間".to_string(),
                    "屋頂".to_string(),
                ],
                subcontractor_keywords: vec![
                    "水電".to_string(),
                    "冷氣".to_string(),
                    "運費".to_string(),
                    "吊車".to_string(),
                ],
            },
        );

        let formula_groups = vec![
            // 圍籬: 以长度(米)为 baseQty, 柱距 2.4 米
            FormulaGroup {
                trigger_keyword: "圍籬".to_string(),
                category: "圍籬".to_string(),
                items: vec![
                    FormulaRule {
                        derived_name: "立柱".to_string(),
                        expression: "ceil(baseQty / 2.4 + 1)".to_string(),
                        unit: "支".to_string(),
                    },
                    FormulaRule {
                        derived_name: "二橫".to_string(),
                        expression: "ceil((baseQty / 2.4 + 1) * 2)".to_string(),
                        unit: "支".to_string(),
                    },
                    FormulaRule {
                        derived_name: "斜撐".to_string(),
                        expression: "ceil((baseQty / 2.4 + 1) / 2)".to_string(),
                        unit: "支".to_string(),
                    },
                    FormulaRule {
                        derived_name: "烤漆鋼板".to_string(),
                        expression: "ceil(baseQty / 0.9)".to_string(),
                        unit: "片".to_string(),
                    },
                    FormulaRule {
                        derived_name: "水泥".to_string(),
                        expression: "ceil((baseQty / 2.4 + 1) / 2)".to_string(),
                        unit: "包".to_string(),
                    },
                ],
            },
            // 組合屋: 以面积(坪)为 baseQty
            FormulaGroup {
                trigger_keyword: "組合屋".to_string(),
                category: "組合屋".to_string(),
                items: vec![
                    FormulaRule {
                        derived_name: "角柱".to_string(),
                        expression: "ceil(baseQty / 2 + 4)".to_string(),
                        unit: "支".to_string(),
                    },
                    FormulaRule {
                        derived_name: "C型鋼".to_string(),
                        expression: "ceil(baseQty * 3)".to_string(),
                        unit: "支".to_string(),
                    },
                    FormulaRule {
                        derived_name: "夾芯板".to_string(),
                        expression: "ceil(baseQty * 1.5)".to_string(),
                        unit: "片".to_string(),
                    },
                    FormulaRule {
                        derived_name: "自攻螺絲".to_string(),
                        expression: "round(baseQty * 50)".to_string(),
                        unit: "支".to_string(),
                    },
                ],
            },
        ];

        Self {
            classification,
            formula_groups,
        }
    }
}
