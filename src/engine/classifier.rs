// ==========================================
// 报价材料引擎 - 三流分类引擎
// ==========================================
// 依据: 报价引擎业务规则 v0.2 - 分类口径
// 红线: 优先级固定为 外包 > 厂内 > 主体, 不可配置
// 红线: 分类必须是全覆盖且互斥的划分
// ==========================================

use crate::config::ClassificationRule;
use crate::domain::{LineItem, Stream};
use tracing::instrument;

// ==========================================
// StreamPartition - 三流划分结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamPartition {
    pub main: Vec<LineItem>,          // 主体工程
    pub production: Vec<LineItem>,    // 厂内生产
    pub subcontractor: Vec<LineItem>, // 外包协力
}

impl StreamPartition {
    /// 三个桶的总行数(全覆盖性校验口径)
    pub fn total_len(&self) -> usize {
        self.main.len() + self.production.len() + self.subcontractor.len()
    }
}

// ==========================================
// ClassifierEngine - 分类引擎
// ==========================================
pub struct ClassifierEngine;

impl ClassifierEngine {
    pub fn new() -> Self {
        Self
    }

    /// 单项分类
    ///
    /// # 规则(顺序执行, 命中即返回)
    /// 1) 品名包含任一外包关键字 → Subcontractor
    /// 2) 品名包含任一厂内关键字 → Production
    /// 3) 其他 → Main
    ///
    /// # 匹配口径
    /// - 子串包含, 区分大小写, 不做任何规范化
    /// - 关键字列表为空时一律落入 Main
    pub fn classify_one(&self, item: &LineItem, rule: &ClassificationRule) -> Stream {
        if rule
            .subcontractor_keywords
            .iter()
            .any(|kw| item.name.contains(kw.as_str()))
        {
            return Stream::Subcontractor;
        }

        if rule
            .production_keywords
            .iter()
            .any(|kw| item.name.contains(kw.as_str()))
        {
            return Stream::Production;
        }

        Stream::Main
    }

    /// 批量分类, 产出三流划分
    ///
    /// 纯函数: 每个输入行恰好出现在一个桶中
    #[instrument(skip(self, items, rule), fields(count = items.len()))]
    pub fn classify(&self, items: &[LineItem], rule: &ClassificationRule) -> StreamPartition {
        let mut partition = StreamPartition::default();

        for item in items {
            match self.classify_one(item, rule) {
                Stream::Main => partition.main.push(item.clone()),
                Stream::Production => partition.production.push(item.clone()),
                Stream::Subcontractor => partition.subcontractor.push(item.clone()),
            }
        }

        partition
    }
}

impl Default for ClassifierEngine {
    fn default() -> Self {
        Self::new()
    }
}
