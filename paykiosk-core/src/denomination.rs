// 面额映射：脉冲数 -> 金额
use crate::config::AcceptorConfig;

/// 投币器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcceptorKind {
    /// 硬币器
    Coin,
    /// 纸币器
    Bill,
}

impl AcceptorKind {
    /// 状态行里的标签
    pub const fn tag(self) -> &'static str {
        match self {
            AcceptorKind::Coin => "COIN",
            AcceptorKind::Bill => "BILL",
        }
    }
}

/// 硬币器脉冲表
pub const COIN_TABLE: &[(u8, u32)] = &[(1, 1), (5, 5), (10, 10), (20, 20)];

/// 纸币器脉冲表
pub const BILL_TABLE: &[(u8, u32)] = &[(2, 20), (5, 50), (10, 100), (20, 200), (50, 500)];

/// 查表，未登记的脉冲数返回 `None`
pub fn lookup(table: &[(u8, u32)], pulses: u8) -> Option<u32> {
    table
        .iter()
        .find(|(count, _)| *count == pulses)
        .map(|(_, value)| *value)
}

impl AcceptorConfig {
    /// 把一次投入的脉冲数映射为面额
    pub fn denomination(&self, pulses: u8) -> Option<u32> {
        lookup(self.table, pulses)
    }
}
