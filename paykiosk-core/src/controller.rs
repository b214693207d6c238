// 收款控制器：主循环的全部逻辑
//
// 固件每个 tick 调用 `tick`，每收到一行命令调用 `handle_line`。
// 交易账本只在这里被修改，边沿回调只碰 `PulseCounter`。
use crate::change::{ChangeDispenser, ChangeOutcome};
use crate::config::{AcceptorConfig, ControllerConfig};
use crate::error::{Error, Result};
use crate::hopper::{Hopper, HopperDrive};
use crate::protocol::{Command, Line};
use crate::pulse::PulseCounter;
use crate::session::{Completion, PaymentSession, SessionState};
use crate::status::{Status, StatusSink};
use embassy_time::Instant;

/// 收款找零控制器
pub struct Controller<'a, D> {
    config: ControllerConfig,
    coin: &'a PulseCounter,
    bill: &'a PulseCounter,
    session: PaymentSession,
    dispenser: ChangeDispenser<D>,
    /// 找零过程中收到的 SET_PAYMENT，找零结束复位后再生效
    deferred_payment: Option<u32>,
}

impl<'a, D: HopperDrive> Controller<'a, D> {
    /// 创建控制器，配置无效时返回错误
    pub fn new(
        config: ControllerConfig,
        coin: &'a PulseCounter,
        bill: &'a PulseCounter,
        primary: D,
        secondary: D,
    ) -> Result<Self> {
        config.validate()?;
        let dispenser = ChangeDispenser::new(
            Hopper::new(config.primary, primary),
            Hopper::new(config.secondary, secondary),
        );
        Ok(Self {
            config,
            coin,
            bill,
            session: PaymentSession::new(),
            dispenser,
            deferred_payment: None,
        })
    }

    /// 上电提示
    pub fn announce<S: StatusSink>(&self, out: &mut S) {
        info!("Payment controller ready");
        out.emit(Status::Ready);
    }

    pub fn session(&self) -> &PaymentSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_dispensing(&self) -> bool {
        self.dispenser.is_active()
    }

    pub fn dispenser(&self) -> &ChangeDispenser<D> {
        &self.dispenser
    }

    #[cfg(test)]
    pub(crate) fn dispenser_mut(&mut self) -> &mut ChangeDispenser<D> {
        &mut self.dispenser
    }

    /// 主循环的一次轮询
    pub fn tick<S: StatusSink>(&mut self, now: Instant, out: &mut S) {
        for counter in [self.coin, self.bill] {
            if let Some(pulses) = counter.take_finalized(now) {
                self.accept(counter.config(), pulses, out);
            }
        }

        if let Some(completion) = self.session.check_completion() {
            self.on_completion(completion, now, out);
        }

        if let Some(outcome) = self.dispenser.poll(now, out) {
            self.finish_dispense(outcome, out);
        }
    }

    /// 处理一行主机命令，错误回报给主机
    pub fn handle_line<S: StatusSink>(&mut self, line: &str, now: Instant, out: &mut S) {
        let result =
            Command::parse(line).and_then(|command| self.handle_command(command, now, out));
        if let Err(error) = result {
            warn!("Rejected command: {}", error);
            out.emit(Status::CommandError {
                error,
                line: echo(line),
            });
        }
    }

    /// 执行一条命令
    pub fn handle_command<S: StatusSink>(
        &mut self,
        command: Command,
        now: Instant,
        out: &mut S,
    ) -> Result<()> {
        debug!("Command: {}", command);
        match command {
            Command::SetPayment(amount) => self.set_payment(amount, out),
            Command::Dispense(amount) => {
                if self.is_dispensing() {
                    return Err(Error::Busy);
                }
                if amount == 0 {
                    return Err(Error::InvalidAmount);
                }
                self.start_dispense(amount, now, out);
                Ok(())
            }
            Command::StopHopper => {
                info!("Emergency stop");
                self.dispenser.stop(now);
                out.emit(Status::HopperStopped);
                Ok(())
            }
            Command::Reset => {
                if let Some(outcome) = self.dispenser.abort() {
                    warn!("Reset during change dispensing");
                    report_outcome(outcome, out);
                }
                self.reset_session();
                out.emit(Status::Reset);
                Ok(())
            }
        }
    }

    fn set_payment<S: StatusSink>(&mut self, amount: u32, out: &mut S) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        if self.is_dispensing() {
            info!("Payment {} deferred until change is dispensed", amount);
            self.deferred_payment = Some(amount);
            return Ok(());
        }

        self.session.set_required(amount)?;
        info!("Required payment set to {}", amount);
        out.emit(Status::PaymentSet(amount));
        Ok(())
    }

    fn accept<S: StatusSink>(&mut self, acceptor: &AcceptorConfig, pulses: u8, out: &mut S) {
        match acceptor.denomination(pulses) {
            Some(value) => {
                let total = self.session.accrue(value);
                info!(
                    "{} accepted: {} ({} pulses), total {}",
                    acceptor.kind, value, pulses, total
                );
                out.emit(Status::Inserted {
                    kind: acceptor.kind,
                    value,
                    pulses,
                });
                out.emit(Status::Total(total));
            }
            None => {
                warn!("{}: unknown pulse count {}", acceptor.kind, pulses);
                out.emit(Status::UnknownPulses {
                    kind: acceptor.kind,
                    pulses,
                });
            }
        }
    }

    fn on_completion<S: StatusSink>(&mut self, completion: Completion, now: Instant, out: &mut S) {
        info!(
            "Payment complete: total {} required {} change {}",
            completion.total, completion.required, completion.change
        );
        out.emit(Status::PaymentComplete {
            total: completion.total,
            required: completion.required,
            change: completion.change,
        });

        if completion.change == 0 {
            out.emit(Status::NoChangeNeeded);
        } else if self.config.auto_dispense {
            self.start_dispense(completion.change, now, out);
        } else {
            out.emit(Status::WaitingForDispenseCommand(completion.change));
        }
    }

    fn start_dispense<S: StatusSink>(&mut self, amount: u32, now: Instant, out: &mut S) {
        self.session.begin_dispense();
        if let Some(outcome) = self.dispenser.begin(amount, now, out) {
            self.finish_dispense(outcome, out);
        }
    }

    /// 找零结束：回报结果，不论成败都复位交易
    fn finish_dispense<S: StatusSink>(&mut self, outcome: ChangeOutcome, out: &mut S) {
        report_outcome(outcome, out);

        let deferred = self.deferred_payment.take();
        self.reset_session();
        info!("Session auto-reset");
        out.emit(Status::AutoReset);

        if let Some(amount) = deferred {
            if self.session.set_required(amount).is_ok() {
                info!("Applying deferred payment {}", amount);
                out.emit(Status::PaymentSet(amount));
            }
        }
    }

    fn reset_session(&mut self) {
        self.session.reset();
        self.coin.clear();
        self.bill.clear();
        self.deferred_payment = None;
        self.dispenser.abort();
    }
}

fn report_outcome<S: StatusSink>(outcome: ChangeOutcome, out: &mut S) {
    if outcome.is_exact() {
        info!("Change complete: {}", outcome.actual);
        out.emit(Status::ChangeComplete(outcome.actual));
    } else {
        error!(
            "Change mismatch: expected {} actual {}",
            outcome.requested, outcome.actual
        );
        out.emit(Status::ChangeError {
            expected: outcome.requested,
            actual: outcome.actual,
        });
    }
}

/// 把原始命令行截到 `Line` 容量内，用于错误回显
fn echo(line: &str) -> Line {
    let mut echoed = Line::new();
    for c in line.trim().chars() {
        if echoed.push(c).is_err() {
            break;
        }
    }
    echoed
}
