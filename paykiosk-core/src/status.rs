// 状态行：发给主机的机器可解析标记 + 可读文本
use crate::denomination::AcceptorKind;
use crate::error::Error;
use crate::hopper::{HopperReport, StopReason};
use crate::protocol::Line;
use core::fmt;

/// 退币器在找零流程里的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HopperRole {
    /// 大面额，先出
    Primary,
    /// 小面额，后出
    Secondary,
}

/// 状态行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    Inserted {
        kind: AcceptorKind,
        value: u32,
        pulses: u8,
    },
    Total(u32),
    UnknownPulses {
        kind: AcceptorKind,
        pulses: u8,
    },
    PaymentSet(u32),
    PaymentComplete {
        total: u32,
        required: u32,
        change: u32,
    },
    WaitingForDispenseCommand(u32),
    NoChangeNeeded,
    ChangeDispensingStart {
        amount: u32,
        high_coins: u32,
        high_value: u32,
        low_coins: u32,
        low_value: u32,
    },
    HopperProgress {
        role: HopperRole,
        report: HopperReport,
        coin_value: u32,
    },
    ChangeComplete(u32),
    ChangeError {
        expected: u32,
        actual: u32,
    },
    AutoReset,
    Reset,
    HopperStopped,
    CommandError {
        error: Error,
        line: Line,
    },
}

/// 状态输出端（固件里是串口发送队列，测试里是 Vec）
pub trait StatusSink {
    fn emit(&mut self, status: Status);
}

#[cfg(test)]
impl StatusSink for std::vec::Vec<Status> {
    fn emit(&mut self, status: Status) {
        self.push(status);
    }
}

impl StopReason {
    fn word(self) -> &'static str {
        match self {
            StopReason::TargetReached => "complete",
            StopReason::HardTimeout => "timeout",
            StopReason::Stalled => "stalled",
            StopReason::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => f.write_str("[READY] Payment controller online"),
            Status::Inserted {
                kind,
                value,
                pulses,
            } => write!(
                f,
                "[{}] Inserted: PHP {} ({} pulses)",
                kind.tag(),
                value,
                pulses
            ),
            Status::Total(total) => write!(f, "Total: PHP {}", total),
            Status::UnknownPulses { kind, pulses } => write!(
                f,
                "[UNKNOWN_{}] Unrecognized pulse count: {}",
                kind.tag(),
                pulses
            ),
            Status::PaymentSet(amount) => write!(f, "[PAYMENT_SET] Required: PHP {}", amount),
            Status::PaymentComplete {
                total,
                required,
                change,
            } => write!(
                f,
                "[PAYMENT_COMPLETE] Total: PHP {} Required: PHP {} Change: PHP {}",
                total, required, change
            ),
            Status::WaitingForDispenseCommand(change) => write!(
                f,
                "[WAITING_FOR_DISPENSE_COMMAND] Change due: PHP {}",
                change
            ),
            Status::NoChangeNeeded => f.write_str("[NO_CHANGE_NEEDED] Exact payment received"),
            Status::ChangeDispensingStart {
                amount,
                high_coins,
                high_value,
                low_coins,
                low_value,
            } => write!(
                f,
                "[CHANGE_DISPENSING_START] Amount: PHP {} High: {} x PHP {} Low: {} x PHP {}",
                amount, high_coins, high_value, low_coins, low_value
            ),
            Status::HopperProgress {
                role,
                report,
                coin_value,
            } => {
                let tag = match role {
                    HopperRole::Primary => "PRIMARY",
                    HopperRole::Secondary => "SECONDARY",
                };
                write!(
                    f,
                    "[{}] Dispensed: {}/{} x PHP {} ({})",
                    tag,
                    report.dispensed,
                    report.target,
                    coin_value,
                    report.reason.word()
                )
            }
            Status::ChangeComplete(amount) => {
                write!(f, "[CHANGE_COMPLETE] Dispensed: PHP {}", amount)
            }
            Status::ChangeError { expected, actual } => write!(
                f,
                "[CHANGE_ERROR] Expected: PHP {} Actual: PHP {}",
                expected, actual
            ),
            Status::AutoReset => f.write_str("[AUTO_RESET] Ready for next transaction"),
            Status::Reset => f.write_str("[RESET] Session cleared"),
            Status::HopperStopped => f.write_str("[HOPPER_STOPPED] Relays de-energized"),
            Status::CommandError { error, line } => write!(f, "[ERROR] {}: {}", error, line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_lines_match_host_parser() {
        let coin = Status::Inserted {
            kind: AcceptorKind::Coin,
            value: 5,
            pulses: 5,
        };
        assert_eq!(coin.to_string(), "[COIN] Inserted: PHP 5 (5 pulses)");

        let bill = Status::Inserted {
            kind: AcceptorKind::Bill,
            value: 20,
            pulses: 2,
        };
        assert_eq!(bill.to_string(), "[BILL] Inserted: PHP 20 (2 pulses)");
        assert_eq!(Status::Total(125).to_string(), "Total: PHP 125");
    }

    #[test]
    fn markers_lead_each_line() {
        let lines = [
            (Status::NoChangeNeeded, "[NO_CHANGE_NEEDED]"),
            (Status::WaitingForDispenseCommand(3), "[WAITING_FOR_DISPENSE_COMMAND]"),
            (Status::ChangeComplete(3), "[CHANGE_COMPLETE]"),
            (
                Status::ChangeError {
                    expected: 5,
                    actual: 3,
                },
                "[CHANGE_ERROR]",
            ),
            (Status::AutoReset, "[AUTO_RESET]"),
            (
                Status::PaymentComplete {
                    total: 50,
                    required: 47,
                    change: 3,
                },
                "[PAYMENT_COMPLETE]",
            ),
        ];
        for (status, marker) in lines {
            assert!(status.to_string().starts_with(marker), "{}", status);
        }
    }

    #[test]
    fn hopper_progress_reports_counts_and_reason() {
        let status = Status::HopperProgress {
            role: HopperRole::Secondary,
            report: HopperReport {
                target: 5,
                dispensed: 3,
                reason: StopReason::Stalled,
            },
            coin_value: 1,
        };
        assert_eq!(
            status.to_string(),
            "[SECONDARY] Dispensed: 3/5 x PHP 1 (stalled)"
        );
    }

    #[test]
    fn command_error_echoes_line() {
        let status = Status::CommandError {
            error: Error::UnknownCommand,
            line: Line::try_from("HELLO").unwrap(),
        };
        assert_eq!(status.to_string(), "[ERROR] Unknown command: HELLO");
    }
}
