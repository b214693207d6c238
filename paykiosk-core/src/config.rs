// 配置
use crate::denomination::{AcceptorKind, BILL_TABLE, COIN_TABLE};
use crate::error::{Error, Result};
use embassy_time::Duration;

/// 投币器配置
#[derive(Debug, Clone, Copy)]
pub struct AcceptorConfig {
    pub kind: AcceptorKind,
    /// 两个有效下降沿之间的最小间隔（消抖）
    pub debounce: Duration,
    /// 静默超过这个时间，认为一次投入的脉冲串结束
    pub settle: Duration,
    /// 脉冲计数上限
    pub max_pulses: u8,
    /// 脉冲数 -> 面额
    pub table: &'static [(u8, u32)],
}

impl AcceptorConfig {
    pub const COIN: Self = Self {
        kind: AcceptorKind::Coin,
        debounce: Duration::from_millis(50),
        settle: Duration::from_millis(200),
        max_pulses: 20,
        table: COIN_TABLE,
    };

    pub const BILL: Self = Self {
        kind: AcceptorKind::Bill,
        debounce: Duration::from_millis(80),
        settle: Duration::from_millis(320),
        max_pulses: 60,
        table: BILL_TABLE,
    };
}

/// 退币器配置
#[derive(Debug, Clone, Copy)]
pub struct HopperConfig {
    /// 日志里的名字
    pub label: &'static str,
    /// 这个退币器出的硬币面额
    pub coin_value: u32,
    /// 两枚硬币之间的最小间隔（传感器消抖）
    pub coin_interval: Duration,
    /// 单次出币总时限
    pub hard_timeout: Duration,
    /// 多久没有出币就判定卡币
    pub inactivity_timeout: Duration,
    /// 断电后等待马达停稳的时间
    pub stop_hold: Duration,
    /// 额外等待最后一枚硬币落下的时间
    pub eject_grace: Duration,
}

impl HopperConfig {
    /// 大面额退币器（B）
    pub const HIGH: Self = Self {
        label: "hopper-b",
        coin_value: 5,
        coin_interval: Duration::from_millis(50),
        hard_timeout: Duration::from_secs(30),
        inactivity_timeout: Duration::from_secs(3),
        stop_hold: Duration::from_millis(100),
        eject_grace: Duration::from_millis(0),
    };

    /// 小面额退币器（A）
    pub const LOW: Self = Self {
        label: "hopper-a",
        coin_value: 1,
        coin_interval: Duration::from_millis(50),
        hard_timeout: Duration::from_secs(30),
        inactivity_timeout: Duration::from_secs(3),
        stop_hold: Duration::from_millis(100),
        eject_grace: Duration::from_millis(300),
    };

    fn validate(&self) -> Result<()> {
        if self.coin_value == 0
            || self.hard_timeout.as_ticks() == 0
            || self.inactivity_timeout.as_ticks() == 0
        {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

/// 控制器配置
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// 先出币的大面额退币器
    pub primary: HopperConfig,
    /// 后出币的小面额退币器
    pub secondary: HopperConfig,
    /// 付款完成且需要找零时，不等 DISPENSE 命令直接找零
    pub auto_dispense: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            primary: HopperConfig::HIGH,
            secondary: HopperConfig::LOW,
            auto_dispense: false,
        }
    }
}

impl ControllerConfig {
    /// 校验配置
    ///
    /// 大面额必须是小面额的整数倍，否则贪心拆分会漏掉本可找出的金额。
    /// 不是小面额整数倍的零头仍然找不出，由找零结果报告为短缺。
    pub fn validate(&self) -> Result<()> {
        self.primary.validate()?;
        self.secondary.validate()?;

        let high = self.primary.coin_value;
        let low = self.secondary.coin_value;
        if high <= low || high % low != 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ControllerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_multiple_denominations() {
        let mut config = ControllerConfig::default();
        config.primary.coin_value = 5;
        config.secondary.coin_value = 2;
        assert_eq!(config.validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn rejects_swapped_hoppers() {
        let config = ControllerConfig {
            primary: HopperConfig::LOW,
            secondary: HopperConfig::HIGH,
            auto_dispense: false,
        };
        assert_eq!(config.validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let mut config = ControllerConfig::default();
        config.secondary.inactivity_timeout = Duration::from_ticks(0);
        assert_eq!(config.validate(), Err(Error::InvalidConfig));
    }
}
