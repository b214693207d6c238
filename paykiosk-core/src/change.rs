// 找零：拆分金额并依次驱动两个退币器
use crate::hopper::{Hopper, HopperDrive, HopperReport, StopReason};
use crate::status::{HopperRole, Status, StatusSink};
use embassy_time::Instant;

/// 找零拆分结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChangeBreakdown {
    pub high_coins: u32,
    pub low_coins: u32,
}

impl ChangeBreakdown {
    /// 贪心拆分：先尽量用大面额，余数用小面额
    ///
    /// 余数不是小面额整数倍时，零头无法找出，`value` 会小于 `change`。
    pub fn compute(change: u32, high_value: u32, low_value: u32) -> Self {
        let high_coins = change / high_value;
        let low_coins = (change % high_value) / low_value;
        Self {
            high_coins,
            low_coins,
        }
    }

    pub fn value(&self, high_value: u32, low_value: u32) -> u32 {
        self.high_coins * high_value + self.low_coins * low_value
    }
}

/// 一次找零的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChangeOutcome {
    /// 主机要求的金额
    pub requested: u32,
    /// 拆分后计划出的金额，凑不齐零头时小于 `requested`
    pub planned: u32,
    /// 实际出的金额
    pub actual: u32,
}

impl ChangeOutcome {
    /// 实际出币金额等于主机要求的金额
    pub fn is_exact(&self) -> bool {
        self.actual == self.requested
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Primary,
    Secondary,
}

/// 找零流程：大面额退币器出完之后才启动小面额退币器，不会同时运行
pub struct ChangeDispenser<D> {
    primary: Hopper<D>,
    secondary: Hopper<D>,
    stage: Stage,
    requested: u32,
    breakdown: ChangeBreakdown,
    primary_report: Option<HopperReport>,
    secondary_report: Option<HopperReport>,
    stop_requested: bool,
}

impl<D: HopperDrive> ChangeDispenser<D> {
    pub fn new(primary: Hopper<D>, secondary: Hopper<D>) -> Self {
        Self {
            primary,
            secondary,
            stage: Stage::Idle,
            requested: 0,
            breakdown: ChangeBreakdown::default(),
            primary_report: None,
            secondary_report: None,
            stop_requested: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn primary(&self) -> &Hopper<D> {
        &self.primary
    }

    #[cfg(test)]
    pub(crate) fn primary_mut(&mut self) -> &mut Hopper<D> {
        &mut self.primary
    }

    pub fn secondary(&self) -> &Hopper<D> {
        &self.secondary
    }

    #[cfg(test)]
    pub(crate) fn secondary_mut(&mut self) -> &mut Hopper<D> {
        &mut self.secondary
    }

    /// 当前面额组合下的拆分
    pub fn breakdown(&self, amount: u32) -> ChangeBreakdown {
        ChangeBreakdown::compute(
            amount,
            self.primary.config().coin_value,
            self.secondary.config().coin_value,
        )
    }

    /// 开始找零；两个退币器都不需要出币时立即返回结果
    pub fn begin<S: StatusSink>(
        &mut self,
        amount: u32,
        now: Instant,
        out: &mut S,
    ) -> Option<ChangeOutcome> {
        let breakdown = self.breakdown(amount);
        let high_value = self.primary.config().coin_value;
        let low_value = self.secondary.config().coin_value;

        if breakdown.value(high_value, low_value) != amount {
            warn!(
                "Change {} cannot be made exactly from {}/{} coins",
                amount, high_value, low_value
            );
        }
        info!(
            "Change {}: {} x {} + {} x {}",
            amount, breakdown.high_coins, high_value, breakdown.low_coins, low_value
        );

        self.requested = amount;
        self.breakdown = breakdown;
        self.primary_report = None;
        self.secondary_report = None;
        self.stop_requested = false;
        self.stage = Stage::Primary;

        out.emit(Status::ChangeDispensingStart {
            amount,
            high_coins: breakdown.high_coins,
            high_value,
            low_coins: breakdown.low_coins,
            low_value,
        });

        match self.primary.start(breakdown.high_coins, now) {
            Some(report) => self.primary_done(report, now, out),
            None => None,
        }
    }

    /// 每个 tick 调用，整个找零结束时返回一次结果
    pub fn poll<S: StatusSink>(&mut self, now: Instant, out: &mut S) -> Option<ChangeOutcome> {
        match self.stage {
            Stage::Idle => None,
            Stage::Primary => {
                let report = self.primary.poll(now)?;
                self.primary_done(report, now, out)
            }
            Stage::Secondary => {
                let report = self.secondary.poll(now)?;
                Some(self.secondary_done(report, out))
            }
        }
    }

    /// 急停：两个退币器立即断电；正在找零时后续退币器不再启动
    pub fn stop(&mut self, now: Instant) {
        if self.is_active() {
            self.stop_requested = true;
        }
        self.primary.stop(now);
        self.secondary.stop(now);
    }

    /// 复位：立即断电并放弃本次找零，返回已出的部分
    pub fn abort(&mut self) -> Option<ChangeOutcome> {
        let primary = self.primary.force_off();
        let secondary = self.secondary.force_off();
        if !self.is_active() {
            return None;
        }
        if primary.is_some() {
            self.primary_report = primary;
        }
        if secondary.is_some() {
            self.secondary_report = secondary;
        }
        Some(self.finish())
    }

    fn primary_done<S: StatusSink>(
        &mut self,
        report: HopperReport,
        now: Instant,
        out: &mut S,
    ) -> Option<ChangeOutcome> {
        out.emit(Status::HopperProgress {
            role: HopperRole::Primary,
            report,
            coin_value: self.primary.config().coin_value,
        });
        self.primary_report = Some(report);

        if self.stop_requested || report.reason == StopReason::Stopped {
            warn!("Change dispensing stopped before secondary hopper");
            return Some(self.finish());
        }

        self.stage = Stage::Secondary;
        match self.secondary.start(self.breakdown.low_coins, now) {
            Some(report) => Some(self.secondary_done(report, out)),
            None => None,
        }
    }

    fn secondary_done<S: StatusSink>(
        &mut self,
        report: HopperReport,
        out: &mut S,
    ) -> ChangeOutcome {
        out.emit(Status::HopperProgress {
            role: HopperRole::Secondary,
            report,
            coin_value: self.secondary.config().coin_value,
        });
        self.secondary_report = Some(report);
        self.finish()
    }

    fn finish(&mut self) -> ChangeOutcome {
        let high_value = self.primary.config().coin_value;
        let low_value = self.secondary.config().coin_value;
        let dispensed = |report: Option<HopperReport>| report.map_or(0, |r| r.dispensed);

        let outcome = ChangeOutcome {
            requested: self.requested,
            planned: self.breakdown.value(high_value, low_value),
            actual: dispensed(self.primary_report) * high_value
                + dispensed(self.secondary_report) * low_value,
        };

        self.stage = Stage::Idle;
        self.requested = 0;
        self.breakdown = ChangeBreakdown::default();
        self.primary_report = None;
        self.secondary_report = None;
        self.stop_requested = false;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HopperConfig;
    use crate::hopper::mock::MockDrive;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn dispenser() -> ChangeDispenser<MockDrive> {
        ChangeDispenser::new(
            Hopper::new(HopperConfig::HIGH, MockDrive::default()),
            Hopper::new(HopperConfig::LOW, MockDrive::default()),
        )
    }

    /// 模拟硬件：通电的退币器每 100 ms 出一枚币，直到 `budget` 用完
    struct Rig {
        t: u64,
        primary_budget: u32,
        secondary_budget: u32,
    }

    impl Rig {
        fn run(
            &mut self,
            dispenser: &mut ChangeDispenser<MockDrive>,
            out: &mut Vec<Status>,
        ) -> ChangeOutcome {
            loop {
                self.t += 10;
                let drop_now = self.t % 100 == 0;
                for (hopper, budget) in [
                    (&mut dispenser.primary, &mut self.primary_budget),
                    (&mut dispenser.secondary, &mut self.secondary_budget),
                ] {
                    let drive = hopper.drive_mut();
                    if drive.energized && drop_now && *budget > 0 {
                        drive.sensor_low = true;
                        *budget -= 1;
                    } else {
                        drive.sensor_low = false;
                    }
                }
                if let Some(outcome) = dispenser.poll(at(self.t), out) {
                    return outcome;
                }
                assert!(self.t < 120_000, "dispense never finished");
            }
        }
    }

    #[test]
    fn greedy_breakdown() {
        assert_eq!(
            ChangeBreakdown::compute(17, 5, 1),
            ChangeBreakdown {
                high_coins: 3,
                low_coins: 2
            }
        );
        assert_eq!(
            ChangeBreakdown::compute(3, 5, 1),
            ChangeBreakdown {
                high_coins: 0,
                low_coins: 3
            }
        );
        assert_eq!(ChangeBreakdown::compute(0, 5, 1), ChangeBreakdown::default());
        assert_eq!(ChangeBreakdown::compute(20, 10, 5).value(10, 5), 20);
    }

    #[test]
    fn dispenses_primary_then_secondary() {
        let mut dispenser = dispenser();
        let mut out = Vec::new();
        assert_eq!(dispenser.begin(17, at(0), &mut out), None);
        assert!(dispenser.primary().drive().energized);
        assert!(!dispenser.secondary().drive().energized);

        let mut rig = Rig {
            t: 0,
            primary_budget: 3,
            secondary_budget: 2,
        };
        let outcome = rig.run(&mut dispenser, &mut out);
        assert_eq!(
            outcome,
            ChangeOutcome {
                requested: 17,
                planned: 17,
                actual: 17
            }
        );
        assert!(outcome.is_exact());
        assert!(!dispenser.is_active());

        let progress: Vec<_> = out
            .iter()
            .filter_map(|s| match s {
                Status::HopperProgress { role, report, .. } => Some((*role, report.dispensed)),
                _ => None,
            })
            .collect();
        assert_eq!(
            progress,
            [(HopperRole::Primary, 3), (HopperRole::Secondary, 2)]
        );
    }

    #[test]
    fn skips_empty_primary() {
        let mut dispenser = dispenser();
        let mut out = Vec::new();
        dispenser.begin(3, at(0), &mut out);
        assert_eq!(dispenser.primary().drive().energize_count, 0);
        assert!(dispenser.secondary().drive().energized);

        let mut rig = Rig {
            t: 0,
            primary_budget: 0,
            secondary_budget: 3,
        };
        let outcome = rig.run(&mut dispenser, &mut out);
        assert_eq!(outcome.actual, 3);
        assert!(outcome.is_exact());
    }

    #[test]
    fn shortfall_is_reported() {
        let mut dispenser = dispenser();
        let mut out = Vec::new();
        dispenser.begin(5, at(0), &mut out);

        // 大面额仓是空的，卡币超时后上报短缺
        let mut rig = Rig {
            t: 0,
            primary_budget: 0,
            secondary_budget: 0,
        };
        let outcome = rig.run(&mut dispenser, &mut out);
        assert_eq!(outcome.requested, 5);
        assert_eq!(outcome.actual, 0);
        assert!(!outcome.is_exact());
    }

    #[test]
    fn stop_skips_secondary() {
        let mut dispenser = dispenser();
        let mut out = Vec::new();
        dispenser.begin(12, at(0), &mut out);
        dispenser.stop(at(50));
        assert!(!dispenser.primary().drive().energized);

        let mut rig = Rig {
            t: 50,
            primary_budget: 0,
            secondary_budget: 2,
        };
        let outcome = rig.run(&mut dispenser, &mut out);
        assert_eq!(outcome.actual, 0);
        assert_eq!(outcome.requested, 12);
        assert_eq!(dispenser.secondary().drive().energize_count, 0);
    }

    #[test]
    fn abort_reports_partial_progress() {
        let mut dispenser = dispenser();
        let mut out = Vec::new();
        dispenser.begin(10, at(0), &mut out);

        let drive = dispenser.primary_mut().drive_mut();
        drive.sensor_low = true;
        dispenser.poll(at(100), &mut out);

        let outcome = dispenser.abort().unwrap();
        assert_eq!(outcome.actual, 5);
        assert_eq!(outcome.requested, 10);
        assert!(!dispenser.primary().drive().energized);
        assert!(!dispenser.is_active());
        assert_eq!(dispenser.abort(), None);
    }

    #[test]
    fn uncoverable_remainder_is_not_exact() {
        let mut dispenser = ChangeDispenser::new(
            Hopper::new(
                HopperConfig {
                    coin_value: 10,
                    ..HopperConfig::HIGH
                },
                MockDrive::default(),
            ),
            Hopper::new(
                HopperConfig {
                    coin_value: 5,
                    ..HopperConfig::LOW
                },
                MockDrive::default(),
            ),
        );
        let mut out = Vec::new();

        // 3 凑不出 5 的整数倍，两个仓都不需要启动
        let outcome = dispenser.begin(3, at(0), &mut out).unwrap();
        assert_eq!(
            outcome,
            ChangeOutcome {
                requested: 3,
                planned: 0,
                actual: 0
            }
        );
        assert!(!outcome.is_exact());
        assert!(!dispenser.is_active());
    }
}
