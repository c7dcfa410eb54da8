// ==========================================
// 报价全流程 E2E 测试
// ==========================================
// 流程: 报价单行项 + 规则配置 → 三流划分 → 材料派生
//       → 人工编辑物化 → 数量变更 → 删除行项清理
// ==========================================

use quote_material_engine::{
    DerivationEngine, LineItem, MaterialSheetStore, RuleConfig, SheetState,
};

fn line_item(name: &str, category: &str, spec: &str, quantity: &str, unit: &str) -> LineItem {
    LineItem {
        name: name.to_string(),
        category: category.to_string(),
        spec: spec.to_string(),
        quantity: quantity.to_string(),
        unit: unit.to_string(),
        note: String::new(),
    }
}

/// 一张典型的圍籬工程报价单
fn quotation() -> Vec<LineItem> {
    vec![
        line_item("甲種圍籬", "FENCE_MAIN", "", "24", "米"),
        line_item("乙種圍籬", "FENCE_MAIN", "H=1.8M", "36", "米"),
        line_item("不鏽鋼大門", "FENCE_MAIN", "", "1", "樘"),
        line_item("運費(台北-桃園)", "MISC", "", "2", "趟"),
        line_item("吊車作業", "MISC", "", "1", "式"),
        line_item("測量放樣", "MISC", "", "1", "式"),
    ]
}

#[test]
fn test_full_quotation_flow() {
    let engine = DerivationEngine::new();
    let config = RuleConfig::default();
    let rule = config.classification_rule("fence").unwrap();
    let mut store = MaterialSheetStore::new();

    let items = quotation();

    // ===== 阶段 1: 分类 + 全量派生 =====
    let result = engine.derive_quotation(&items, rule, &config.formula_groups, &store);

    assert_eq!(result.partition.total_len(), items.len());
    assert_eq!(result.partition.production.len(), 3); // 两種圍籬 + 大門
    assert_eq!(result.partition.subcontractor.len(), 2); // 運費 + 吊車
    assert_eq!(result.partition.main.len(), 1); // 測量放樣

    // 只有命中公式组的行有材料表: 两種圍籬(大門无公式组)
    assert_eq!(result.sheets.len(), 2);

    let key_a = "甲種圍籬_FENCE_MAIN_no-spec";
    let key_b = "乙種圍籬_FENCE_MAIN_H=1.8M";
    assert!(result.sheets.contains_key(key_a));
    assert!(result.sheets.contains_key(key_b));

    // 24 米: 立柱 11; 36 米: 立柱 ceil(36/2.4+1)=16
    assert_eq!(result.sheets[key_a].items[0].quantity, 11.0);
    assert_eq!(result.sheets[key_b].items[0].quantity, 16.0);

    // ===== 阶段 2: 人工编辑物化 =====
    let item_a = &items[0];
    let mut edited = engine
        .derive_sheet(item_a, &store, &config.formula_groups)
        .unwrap();
    edited.items[0].quantity = 15.0;
    edited.items[0].spec = "鍍鋅 2.1M".to_string();
    engine.set_sheet(&mut store, item_a.item_key(), edited, Some("chen"));

    assert_eq!(
        engine.sheet_state(item_a, &store, &config.formula_groups),
        SheetState::Overridden
    );

    // ===== 阶段 3: 数量变更后重算, 覆盖依旧生效 =====
    let mut changed_items = quotation();
    changed_items[0].quantity = "30".to_string();

    let result = engine.derive_quotation(&changed_items, rule, &config.formula_groups, &store);

    // 甲種: 人工表原样; 乙種: 仍按公式
    assert_eq!(result.sheets[key_a].items[0].quantity, 15.0);
    assert_eq!(result.sheets[key_a].items[0].spec, "鍍鋅 2.1M");
    assert_eq!(result.sheets[key_a].updated_by.as_deref(), Some("chen"));
    assert_eq!(result.sheets[key_b].items[0].quantity, 16.0);

    // ===== 阶段 4: 删除行项 → 覆盖清理 =====
    engine.clear_sheet(&mut store, key_a);
    assert!(store.is_empty());

    let result = engine.derive_quotation(&changed_items, rule, &config.formula_groups, &store);
    // 回到公式计算: 30 米 → 立柱 14
    assert_eq!(result.sheets[key_a].items[0].quantity, 14.0);
}

#[test]
fn test_subcontractor_items_are_never_derived() {
    // 外包桶不参与派生, 即使品名包含触发关键字
    let engine = DerivationEngine::new();
    let config = RuleConfig::default();
    let rule = config.classification_rule("fence").unwrap();
    let store = MaterialSheetStore::new();

    let items = vec![line_item("舊圍籬拆除", "MISC", "", "24", "米")];
    let result = engine.derive_quotation(&items, rule, &config.formula_groups, &store);

    assert_eq!(result.partition.subcontractor.len(), 1);
    assert!(result.sheets.is_empty());
}

#[test]
fn test_main_items_with_formula_match_are_derived() {
    // 主体桶中命中公式关键字的行也派生(分类与派生口径独立)
    let engine = DerivationEngine::new();
    let config = RuleConfig::default();
    // 空分类规则: 全部落入主体桶
    let rule = quote_material_engine::ClassificationRule::default();
    let store = MaterialSheetStore::new();

    let items = vec![line_item("甲種圍籬", "FENCE_MAIN", "", "24", "米")];
    let result = engine.derive_quotation(&items, &rule, &config.formula_groups, &store);

    assert_eq!(result.partition.main.len(), 1);
    assert_eq!(result.sheets.len(), 1);
}

#[test]
fn test_rederivation_is_idempotent() {
    let engine = DerivationEngine::new();
    let config = RuleConfig::default();
    let rule = config.classification_rule("fence").unwrap();
    let store = MaterialSheetStore::new();
    let items = quotation();

    let a = engine.derive_quotation(&items, rule, &config.formula_groups, &store);
    let b = engine.derive_quotation(&items, rule, &config.formula_groups, &store);

    assert_eq!(a.partition, b.partition);
    assert_eq!(a.sheets.len(), b.sheets.len());
    for (key, sheet) in &a.sheets {
        assert!(sheet.same_rows(&b.sheets[key]), "{} 应结构等价", key);
    }
}
