// ==========================================
// 报价材料引擎 - 材料派生编排引擎
// ==========================================
// 依据: 报价引擎业务规则 v0.2 - 派生与覆盖口径
// 红线: 覆盖永远优先; 数量过期的覆盖表是接受的权衡, 不自动失效
// 红线: 每个报价项至多命中一个公式组, 按声明顺序取首个, 不叠加
// ==========================================

use crate::config::{ClassificationRule, FormulaGroup};
use crate::domain::{DerivedMaterialItem, LineItem, MaterialSheet, SheetState};
use crate::engine::classifier::{ClassifierEngine, StreamPartition};
use crate::engine::formula::FormulaEvaluator;
use crate::engine::sheet_store::MaterialSheetStore;
use std::collections::HashMap;
use tracing::{debug, instrument};

// ==========================================
// QuotationDerivation - 全量派生结果
// ==========================================
// 输出契约: 三流划分 + 按身份键组织的材料表
#[derive(Debug, Clone)]
pub struct QuotationDerivation {
    pub partition: StreamPartition,
    pub sheets: HashMap<String, MaterialSheet>, // 身份键 → 材料表
}

// ==========================================
// DerivationEngine - 派生编排引擎
// ==========================================
pub struct DerivationEngine {
    classifier: ClassifierEngine,
    evaluator: FormulaEvaluator,
}

impl DerivationEngine {
    pub fn new() -> Self {
        Self {
            classifier: ClassifierEngine::new(),
            evaluator: FormulaEvaluator::new(),
        }
    }

    // ==========================================
    // 读路径(纯函数, 只读 store)
    // ==========================================

    /// 取得一个报价项的材料表
    ///
    /// # 规则(顺序执行)
    /// 1) 覆盖库存在该身份键 → 原样返回覆盖表(即便数量已过期)
    /// 2) 按声明顺序找首个触发关键字命中品名的公式组; 无 → None
    /// 3) 解析数量为 baseQty; 不可解析或 ≤ 0 → None
    /// 4) 逐条公式求值, 生成新行标识; 非有限数值归零
    pub fn derive_sheet(
        &self,
        item: &LineItem,
        store: &MaterialSheetStore,
        formula_groups: &[FormulaGroup],
    ) -> Option<MaterialSheet> {
        let item_key = item.item_key();

        if let Some(sheet) = store.get(&item_key) {
            debug!(item_key = %item_key, "命中覆盖表");
            return Some(sheet.clone());
        }

        let group = formula_groups
            .iter()
            .find(|g| item.name.contains(g.trigger_keyword.as_str()))?;

        let base_qty = Self::parse_base_qty(&item.quantity)?;

        let items = group
            .items
            .iter()
            .map(|rule| {
                let quantity = self.evaluator.evaluate(&rule.expression, base_qty);
                let quantity = if quantity.is_finite() { quantity } else { 0.0 };
                DerivedMaterialItem::new(rule.derived_name.clone(), quantity, rule.unit.clone())
            })
            .collect();

        Some(MaterialSheet::computed(group.category.clone(), items))
    }

    /// 查询报价项的材料表状态
    ///
    /// Overridden 优先于一切; 其余按"是否能新鲜计算"区分
    pub fn sheet_state(
        &self,
        item: &LineItem,
        store: &MaterialSheetStore,
        formula_groups: &[FormulaGroup],
    ) -> SheetState {
        if store.contains(&item.item_key()) {
            return SheetState::Overridden;
        }

        let matched = formula_groups
            .iter()
            .any(|g| item.name.contains(g.trigger_keyword.as_str()));
        if matched && Self::parse_base_qty(&item.quantity).is_some() {
            SheetState::AutoComputed
        } else {
            SheetState::NoSheet
        }
    }

    /// 全量派生: 分类 + 对主体/厂内两桶逐项取材料表
    ///
    /// 外包桶不参与派生; 无命中或数量非法的行只出现在划分中
    #[instrument(skip_all, fields(count = items.len()))]
    pub fn derive_quotation(
        &self,
        items: &[LineItem],
        rule: &ClassificationRule,
        formula_groups: &[FormulaGroup],
        store: &MaterialSheetStore,
    ) -> QuotationDerivation {
        let partition = self.classifier.classify(items, rule);

        let mut sheets = HashMap::new();
        for item in partition.main.iter().chain(partition.production.iter()) {
            if let Some(sheet) = self.derive_sheet(item, store, formula_groups) {
                sheets.insert(item.item_key(), sheet);
            }
        }

        debug!(
            main = partition.main.len(),
            production = partition.production.len(),
            subcontractor = partition.subcontractor.len(),
            sheets = sheets.len(),
            "全量派生完成"
        );

        QuotationDerivation { partition, sheets }
    }

    // ==========================================
    // 写路径(覆盖库变更入口)
    // ==========================================

    /// 整表落库(人工编辑物化)
    ///
    /// 调用层先经 derive_sheet 取起点表, 修改后经此写回;
    /// 自首次写入起该身份键进入 Overridden, 公式不再参与
    pub fn set_sheet(
        &self,
        store: &mut MaterialSheetStore,
        item_key: impl Into<String>,
        sheet: MaterialSheet,
        updated_by: Option<&str>,
    ) {
        store.set_sheet(item_key, sheet, updated_by);
    }

    /// 移除覆盖表(仅在所属报价项被删除时调用)
    pub fn clear_sheet(
        &self,
        store: &mut MaterialSheetStore,
        item_key: &str,
    ) -> Option<MaterialSheet> {
        store.clear_sheet(item_key)
    }

    // ==========================================
    // 内部工具
    // ==========================================

    /// 解析报价项数量
    ///
    /// 不可解析 / 非有限 / ≤ 0 一律视为不可派生
    fn parse_base_qty(quantity: &str) -> Option<f64> {
        quantity
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|q| q.is_finite() && *q > 0.0)
    }
}

impl Default for DerivationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FormulaRule, RuleConfig};

    fn fence_item(quantity: &str) -> LineItem {
        LineItem {
            name: "甲種圍籬".to_string(),
            category: "FENCE_MAIN".to_string(),
            spec: String::new(),
            quantity: quantity.to_string(),
            unit: "米".to_string(),
            note: String::new(),
        }
    }

    fn groups() -> Vec<FormulaGroup> {
        RuleConfig::default().formula_groups
    }

    #[test]
    fn test_fresh_sheet_from_fence_formulas() {
        // 24 米圍籬: 立柱 ceil(24/2.4+1)=11, 二橫 ceil(11*2... )=22
        let engine = DerivationEngine::new();
        let store = MaterialSheetStore::new();

        let sheet = engine
            .derive_sheet(&fence_item("24"), &store, &groups())
            .expect("应命中圍籬公式组");

        assert_eq!(sheet.category, "圍籬");
        assert_eq!(sheet.items[0].name, "立柱");
        assert_eq!(sheet.items[0].quantity, 11.0);
        assert_eq!(sheet.items[0].unit, "支");
        assert_eq!(sheet.items[1].name, "二橫");
        assert_eq!(sheet.items[1].quantity, 22.0);
        assert!(sheet.updated_by.is_none(), "新鲜计算的表无操作人");
    }

    #[test]
    fn test_no_matching_group_returns_none() {
        let engine = DerivationEngine::new();
        let store = MaterialSheetStore::new();

        let mut item = fence_item("24");
        item.name = "測量放樣".to_string();
        assert!(engine.derive_sheet(&item, &store, &groups()).is_none());
    }

    #[test]
    fn test_first_matching_group_wins() {
        // 两个组都可能命中时, 按声明顺序取首个
        let engine = DerivationEngine::new();
        let store = MaterialSheetStore::new();
        let groups = vec![
            FormulaGroup {
                trigger_keyword: "圍籬".to_string(),
                category: "A".to_string(),
                items: vec![FormulaRule {
                    derived_name: "立柱".to_string(),
                    expression: "baseQty".to_string(),
                    unit: "支".to_string(),
                }],
            },
            FormulaGroup {
                trigger_keyword: "甲種".to_string(),
                category: "B".to_string(),
                items: vec![],
            },
        ];

        let sheet = engine
            .derive_sheet(&fence_item("10"), &store, &groups)
            .unwrap();
        assert_eq!(sheet.category, "A");
    }

    #[test]
    fn test_invalid_quantity_returns_none() {
        let engine = DerivationEngine::new();
        let store = MaterialSheetStore::new();

        for q in ["", "abc", "0", "-3", "NaN", "inf"] {
            assert!(
                engine.derive_sheet(&fence_item(q), &store, &groups()).is_none(),
                "数量 {:?} 不应派生",
                q
            );
        }
    }

    #[test]
    fn test_quantity_with_whitespace_parses() {
        let engine = DerivationEngine::new();
        let store = MaterialSheetStore::new();
        assert!(engine.derive_sheet(&fence_item(" 24 "), &store, &groups()).is_some());
    }

    #[test]
    fn test_override_wins_over_formula() {
        let engine = DerivationEngine::new();
        let mut store = MaterialSheetStore::new();
        let item = fence_item("24");

        let manual =
            MaterialSheet::computed("圍籬", vec![DerivedMaterialItem::new("立柱", 15.0, "支")]);
        engine.set_sheet(&mut store, item.item_key(), manual, Some("chen"));

        let sheet = engine.derive_sheet(&item, &store, &groups()).unwrap();
        assert_eq!(sheet.items.len(), 1);
        assert_eq!(sheet.items[0].quantity, 15.0);
        assert_eq!(sheet.updated_by.as_deref(), Some("chen"));
    }

    #[test]
    fn test_stale_override_survives_quantity_change() {
        // 数量从 24 改为 30 后, 覆盖表依旧原样返回(接受的权衡)
        let engine = DerivationEngine::new();
        let mut store = MaterialSheetStore::new();

        let manual =
            MaterialSheet::computed("圍籬", vec![DerivedMaterialItem::new("立柱", 15.0, "支")]);
        engine.set_sheet(&mut store, fence_item("24").item_key(), manual, None);

        let changed = fence_item("30");
        let sheet = engine.derive_sheet(&changed, &store, &groups()).unwrap();
        assert_eq!(sheet.items[0].quantity, 15.0);
    }

    #[test]
    fn test_derive_is_idempotent_modulo_ids() {
        let engine = DerivationEngine::new();
        let store = MaterialSheetStore::new();
        let item = fence_item("24");

        let a = engine.derive_sheet(&item, &store, &groups()).unwrap();
        let b = engine.derive_sheet(&item, &store, &groups()).unwrap();
        assert!(a.same_rows(&b), "无覆盖时重复派生应结构等价");
    }

    #[test]
    fn test_broken_formula_falls_back_to_base_qty() {
        // 公式损坏 → 该行数量回退 baseQty, 整表照常生成
        let engine = DerivationEngine::new();
        let store = MaterialSheetStore::new();
        let groups = vec![FormulaGroup {
            trigger_keyword: "圍籬".to_string(),
            category: "圍籬".to_string(),
            items: vec![FormulaRule {
                derived_name: "立柱".to_string(),
                expression: "ceil(baseQty / 0 * xyz)".to_string(),
                unit: "支".to_string(),
            }],
        }];

        let sheet = engine
            .derive_sheet(&fence_item("24"), &store, &groups)
            .unwrap();
        assert_eq!(sheet.items[0].quantity, 24.0);
    }

    #[test]
    fn test_sheet_state_transitions() {
        let engine = DerivationEngine::new();
        let mut store = MaterialSheetStore::new();
        let item = fence_item("24");

        // 命中公式组且数量合法 → AutoComputed
        assert_eq!(
            engine.sheet_state(&item, &store, &groups()),
            SheetState::AutoComputed
        );

        // 数量非法 → NoSheet
        assert_eq!(
            engine.sheet_state(&fence_item("abc"), &store, &groups()),
            SheetState::NoSheet
        );

        // 无公式命中 → NoSheet
        let mut other = fence_item("24");
        other.name = "測量放樣".to_string();
        assert_eq!(engine.sheet_state(&other, &store, &groups()), SheetState::NoSheet);

        // 物化 → Overridden
        let sheet = engine.derive_sheet(&item, &store, &groups()).unwrap();
        engine.set_sheet(&mut store, item.item_key(), sheet, Some("chen"));
        assert_eq!(
            engine.sheet_state(&item, &store, &groups()),
            SheetState::Overridden
        );

        // clear_sheet → 回到 AutoComputed(唯一的出路)
        engine.clear_sheet(&mut store, &item.item_key());
        assert_eq!(
            engine.sheet_state(&item, &store, &groups()),
            SheetState::AutoComputed
        );
    }
}
