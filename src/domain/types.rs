// ==========================================
// 报价材料引擎 - 领域类型定义
// ==========================================
// 依据: 报价引擎业务规则 v0.2 - 三流分类体系
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 作业流 (Stream)
// ==========================================
// 红线: 每个报价项必须且只能落入一个作业流
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stream {
    Main,          // 主体工程(未命中任何关键字)
    Production,    // 厂内生产
    Subcontractor, // 外包协力
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Main => write!(f, "MAIN"),
            Stream::Production => write!(f, "PRODUCTION"),
            Stream::Subcontractor => write!(f, "SUBCONTRACTOR"),
        }
    }
}

// ==========================================
// 材料表状态 (Sheet State)
// ==========================================
// 状态机: NoSheet → AutoComputed → Overridden
// 红线: Overridden 只能通过 clear_sheet 回到 NoSheet,
//       人工编辑结果绝不被公式重算覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SheetState {
    NoSheet,      // 无派生表(无公式组命中或数量非法)
    AutoComputed, // 每次读取时由公式重新计算,不落库
    Overridden,   // 人工编辑后持久化,此后为唯一事实
}

impl fmt::Display for SheetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetState::NoSheet => write!(f, "NO_SHEET"),
            SheetState::AutoComputed => write!(f, "AUTO_COMPUTED"),
            SheetState::Overridden => write!(f, "OVERRIDDEN"),
        }
    }
}
