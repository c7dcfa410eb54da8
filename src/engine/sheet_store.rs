// ==========================================
// 报价材料引擎 - 材料表覆盖库
// ==========================================
// 依据: 报价引擎业务规则 v0.2 - 人工覆盖口径
// 红线: 覆盖库是唯一共享可变状态, 只能经引擎入口写入
// 红线: 已存在的表绝不被隐式删除或重算; 唯一的移除事件
//       是所属报价项被删除(外部触发 clear_sheet)
// ==========================================

use crate::domain::{DerivedMaterialItem, MaterialSheet};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ==========================================
// MaterialSheetStore - 覆盖库
// ==========================================
// 建模为显式传入/传出的值, 无任何全局状态,
// 可独立序列化供上层持久化
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSheetStore {
    sheets: HashMap<String, MaterialSheet>,
}

impl MaterialSheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询指定身份键的覆盖表
    pub fn get(&self, item_key: &str) -> Option<&MaterialSheet> {
        self.sheets.get(item_key)
    }

    /// 是否存在覆盖表
    pub fn contains(&self, item_key: &str) -> bool {
        self.sheets.contains_key(item_key)
    }

    /// 整表替换(人工编辑落库的唯一入口)
    ///
    /// # 口径
    /// - 首次编辑时调用层先经 derive_sheet 取得起点表,
    ///   修改后整表写回, 即完成"物化"
    /// - 每次写入盖审计戳(时间 + 操作人)
    pub fn set_sheet(
        &mut self,
        item_key: impl Into<String>,
        mut sheet: MaterialSheet,
        updated_by: Option<&str>,
    ) {
        let item_key = item_key.into();
        sheet.updated_at = Utc::now();
        sheet.updated_by = updated_by.map(|s| s.to_string());

        debug!(item_key = %item_key, rows = sheet.items.len(), "覆盖表写入");
        self.sheets.insert(item_key, sheet);
    }

    /// 移除覆盖表(仅在所属报价项被删除时由外部触发)
    pub fn clear_sheet(&mut self, item_key: &str) -> Option<MaterialSheet> {
        let removed = self.sheets.remove(item_key);
        if removed.is_some() {
            debug!(item_key = %item_key, "覆盖表移除");
        }
        removed
    }

    /// 单行插入/替换(按行标识匹配, 未匹配则追加)
    ///
    /// 仅作用于已物化的表; 表不存在时不做任何事并返回 false
    pub fn upsert_row(&mut self, item_key: &str, row: DerivedMaterialItem) -> bool {
        let Some(sheet) = self.sheets.get_mut(item_key) else {
            return false;
        };

        match sheet.items.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row,
            None => sheet.items.push(row),
        }
        sheet.updated_at = Utc::now();
        true
    }

    /// 单行删除(按行标识)
    ///
    /// 删光所有行后保留空表: 空表仍是人工事实, 不回退为自动计算
    pub fn remove_row(&mut self, item_key: &str, row_id: &str) -> bool {
        let Some(sheet) = self.sheets.get_mut(item_key) else {
            return false;
        };

        let before = sheet.items.len();
        sheet.items.retain(|r| r.id != row_id);
        let removed = sheet.items.len() != before;
        if removed {
            sheet.updated_at = Utc::now();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// 遍历全部身份键(供上层做孤儿清理比对)
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.sheets.keys()
    }
}
