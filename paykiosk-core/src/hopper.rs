// 退币器闭环控制
//
// 非阻塞状态机，每个 tick 轮询一次：
// Idle -> MotorRunning -> Settling -> (报告结果) -> Idle
use crate::config::HopperConfig;
use embassy_time::Instant;

/// 退币器硬件接口
pub trait HopperDrive {
    /// 继电器吸合，马达转
    fn energize(&mut self);
    /// 继电器断开，马达停
    fn de_energize(&mut self);
    /// 出币传感器是否为低电平（有硬币挡住）
    fn sensor_low(&mut self) -> bool;
}

/// 出币结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopReason {
    /// 达到目标数量
    TargetReached,
    /// 总时限到
    HardTimeout,
    /// 长时间没有出币（卡币或空仓）
    Stalled,
    /// 主机急停或复位
    Stopped,
}

/// 一次出币的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HopperReport {
    pub target: u32,
    pub dispensed: u32,
    pub reason: StopReason,
}

/// 状态机阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopperPhase {
    Idle,
    MotorRunning,
    /// 已断电，等马达停稳、最后一枚币落下
    Settling { until: Instant, reason: StopReason },
}

/// 单次出币的运行状态，每次出币重新创建
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopperState {
    pub dispensed_count: u32,
    pub target_count: u32,
    pub started: Instant,
    pub last_coin: Instant,
    pub relay_energized: bool,
    pub last_sensor_low: bool,
}

impl HopperState {
    const IDLE: Self = Self {
        dispensed_count: 0,
        target_count: 0,
        started: Instant::from_ticks(0),
        last_coin: Instant::from_ticks(0),
        relay_energized: false,
        last_sensor_low: false,
    };
}

/// 退币器控制器
pub struct Hopper<D> {
    config: HopperConfig,
    drive: D,
    phase: HopperPhase,
    state: HopperState,
}

impl<D: HopperDrive> Hopper<D> {
    /// 创建控制器，上电先断开继电器
    pub fn new(config: HopperConfig, mut drive: D) -> Self {
        drive.de_energize();
        Self {
            config,
            drive,
            phase: HopperPhase::Idle,
            state: HopperState::IDLE,
        }
    }

    pub fn config(&self) -> &HopperConfig {
        &self.config
    }

    pub fn phase(&self) -> HopperPhase {
        self.phase
    }

    pub fn state(&self) -> &HopperState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.phase == HopperPhase::Idle
    }

    pub fn drive(&self) -> &D {
        &self.drive
    }

    #[cfg(test)]
    pub(crate) fn drive_mut(&mut self) -> &mut D {
        &mut self.drive
    }

    /// 开始出币
    ///
    /// 目标为 0 时不动作，直接返回结果。
    pub fn start(&mut self, target: u32, now: Instant) -> Option<HopperReport> {
        if !self.is_idle() {
            self.force_off();
        }

        if target == 0 {
            return Some(HopperReport {
                target: 0,
                dispensed: 0,
                reason: StopReason::TargetReached,
            });
        }

        let sensor_low = self.drive.sensor_low();
        self.state = HopperState {
            dispensed_count: 0,
            target_count: target,
            started: now,
            last_coin: now,
            relay_energized: true,
            last_sensor_low: sensor_low,
        };
        self.drive.energize();
        self.phase = HopperPhase::MotorRunning;

        info!("{}: dispensing {} coins", self.config.label, target);
        None
    }

    /// 每个 tick 调用，结束时返回一次结果
    pub fn poll(&mut self, now: Instant) -> Option<HopperReport> {
        match self.phase {
            HopperPhase::Idle => None,
            HopperPhase::MotorRunning => {
                self.sample(now);

                let state = self.state;
                if state.dispensed_count >= state.target_count {
                    self.halt(now, StopReason::TargetReached);
                } else if now.saturating_duration_since(state.started) > self.config.hard_timeout {
                    warn!(
                        "{}: timeout after {}/{} coins",
                        self.config.label, state.dispensed_count, state.target_count
                    );
                    self.halt(now, StopReason::HardTimeout);
                } else if now.saturating_duration_since(state.last_coin)
                    > self.config.inactivity_timeout
                {
                    warn!(
                        "{}: no coin detected, stopping at {}/{}",
                        self.config.label, state.dispensed_count, state.target_count
                    );
                    self.halt(now, StopReason::Stalled);
                }
                None
            }
            HopperPhase::Settling { until, reason } => {
                self.sample(now);
                if now < until {
                    return None;
                }
                Some(self.finish(reason))
            }
        }
    }

    /// 急停：马达立即断电，走正常的停稳流程后报告
    pub fn stop(&mut self, now: Instant) {
        match self.phase {
            HopperPhase::MotorRunning => self.halt(now, StopReason::Stopped),
            _ => {
                self.drive.de_energize();
                self.state.relay_energized = false;
            }
        }
    }

    /// 立即断电并丢弃本次出币，返回已出的数量
    pub fn force_off(&mut self) -> Option<HopperReport> {
        self.drive.de_energize();
        self.state.relay_energized = false;
        if self.is_idle() {
            return None;
        }
        Some(self.finish(StopReason::Stopped))
    }

    fn sample(&mut self, now: Instant) {
        let low = self.drive.sensor_low();
        let falling = low && !self.state.last_sensor_low;
        self.state.last_sensor_low = low;
        if !falling {
            return;
        }

        let spaced = self.state.dispensed_count == 0
            || now.saturating_duration_since(self.state.last_coin) > self.config.coin_interval;
        if spaced {
            self.state.dispensed_count += 1;
            self.state.last_coin = now;
            debug!(
                "{}: coin {}/{}",
                self.config.label, self.state.dispensed_count, self.state.target_count
            );
        }
    }

    fn halt(&mut self, now: Instant, reason: StopReason) {
        self.drive.de_energize();
        self.state.relay_energized = false;
        self.phase = HopperPhase::Settling {
            until: now + self.config.stop_hold + self.config.eject_grace,
            reason,
        };
    }

    fn finish(&mut self, reason: StopReason) -> HopperReport {
        let report = HopperReport {
            target: self.state.target_count,
            dispensed: self.state.dispensed_count,
            reason,
        };
        info!(
            "{}: finished {}/{} ({})",
            self.config.label, report.dispensed, report.target, reason
        );
        self.phase = HopperPhase::Idle;
        self.state = HopperState::IDLE;
        report
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::HopperDrive;

    /// 测试用退币器
    #[derive(Debug, Default)]
    pub struct MockDrive {
        pub energized: bool,
        pub sensor_low: bool,
        pub energize_count: u32,
    }

    impl HopperDrive for MockDrive {
        fn energize(&mut self) {
            self.energized = true;
            self.energize_count += 1;
        }

        fn de_energize(&mut self) {
            self.energized = false;
        }

        fn sensor_low(&mut self) -> bool {
            self.sensor_low
        }
    }
}
