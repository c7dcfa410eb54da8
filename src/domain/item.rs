// ==========================================
// 报价材料引擎 - 报价项与派生材料领域模型
// ==========================================
// 依据: 报价引擎业务规则 v0.2 - 数据口径
// 红线: 报价项对引擎只读; 身份由 (名称, 类别, 规格) 派生, 不落库
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 规格为空时的身份占位符
///
/// 外部持久化层以同一公式生成键, 该常量属于互操作契约的一部分,
/// 不可变更, 否则历史覆盖数据全部失配。
pub const NO_SPEC_SENTINEL: &str = "no-spec";

// ==========================================
// LineItem - 报价单行项
// ==========================================
// 用途: 报价编辑层写入, 引擎层只读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,     // 品名
    pub category: String, // 粗分类标签(上游赋值, 如 FENCE_MAIN)
    pub spec: String,     // 规格描述(自由文本, 可为空)
    pub quantity: String, // 数量(字符串口径, 引擎内解析)
    pub unit: String,     // 单位(米/支/坪/式 ...)
    pub note: String,     // 备注
}

impl LineItem {
    /// 派生报价项身份键
    ///
    /// # 口径
    /// - `名称_类别_规格`, 规格为空时以 `no-spec` 占位
    /// - (名称, 类别, 规格) 相同的两行在覆盖库中合并为同一身份,
    ///   这是有意的去重口径, 不是缺陷
    pub fn item_key(&self) -> String {
        let spec = if self.spec.is_empty() {
            NO_SPEC_SENTINEL
        } else {
            &self.spec
        };
        format!("{}_{}_{}", self.name, self.category, spec)
    }
}

// ==========================================
// DerivedMaterialItem - 派生材料行
// ==========================================
// 生命周期: 公式计算产生(临时, 每次读取重算)
//           或人工编辑产生(持久化进覆盖库, 从此为唯一事实)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMaterialItem {
    pub id: String,    // 行标识(UUID, 合成身份, 不参与结构等价判断)
    pub name: String,  // 材料名称(如 立柱/二橫)
    pub spec: String,  // 规格(可编辑, 初始为空)
    pub quantity: f64, // 数量(公式计算值或人工值)
    pub unit: String,  // 单位
}

impl DerivedMaterialItem {
    /// 创建一条新的派生材料行(生成新的行标识)
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            spec: String::new(),
            quantity,
            unit: unit.into(),
        }
    }
}

// ==========================================
// MaterialSheet - 材料派生表
// ==========================================
// 用途: 一个报价项对应的全部派生材料
// 红线: 覆盖库中的表一旦存在, 引擎绝不静默丢弃或重算;
//       仅显式人工编辑可变更, 仅删除所属报价项可移除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSheet {
    pub category: String,                // 类别标签(来自命中公式组)
    pub items: Vec<DerivedMaterialItem>, // 派生材料行
    pub updated_at: DateTime<Utc>,       // 最后写入时间
    pub updated_by: Option<String>,      // 操作人(None=公式计算)
}

impl MaterialSheet {
    /// 构造一张新计算出的材料表(无操作人)
    pub fn computed(category: impl Into<String>, items: Vec<DerivedMaterialItem>) -> Self {
        Self {
            category: category.into(),
            items,
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    /// 结构等价判断
    ///
    /// 行标识与审计字段为合成信息, 不参与比较;
    /// 仅比较 (名称, 数量, 单位) 三元组序列。
    pub fn same_rows(&self, other: &MaterialSheet) -> bool {
        self.items.len() == other.items.len()
            && self.items.iter().zip(other.items.iter()).all(|(a, b)| {
                a.name == b.name && a.quantity == b.quantity && a.unit == b.unit
            })
    }
}
