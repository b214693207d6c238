// 交易账本与状态机
use crate::error::{Error, Result};

/// 交易状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// 未设置应付金额
    Idle,
    /// 等待付款
    AwaitingPayment,
    /// 付款完成（已锁存）
    PaymentComplete,
    /// 正在找零
    DispensingChange,
}

/// 付款完成时的快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completion {
    pub total: u32,
    pub required: u32,
    pub change: u32,
}

/// 当前交易
///
/// `processed` 每个交易最多从 false 变为 true 一次，只有 `reset` 能清除。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentSession {
    required_amount: u32,
    total_accepted: u32,
    change_due: u32,
    payment_set: bool,
    processed: bool,
    dispensing: bool,
}

impl PaymentSession {
    pub const fn new() -> Self {
        Self {
            required_amount: 0,
            total_accepted: 0,
            change_due: 0,
            payment_set: false,
            processed: false,
            dispensing: false,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.dispensing {
            SessionState::DispensingChange
        } else if self.processed {
            SessionState::PaymentComplete
        } else if self.payment_set && self.required_amount > 0 {
            SessionState::AwaitingPayment
        } else {
            SessionState::Idle
        }
    }

    /// 设置应付金额，进入等待付款
    pub fn set_required(&mut self, amount: u32) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        self.required_amount = amount;
        self.payment_set = true;
        self.processed = false;
        self.change_due = 0;
        Ok(())
    }

    /// 累加一笔已识别的投入，任何状态下都累加
    pub fn accrue(&mut self, value: u32) -> u32 {
        self.total_accepted = self.total_accepted.saturating_add(value);
        self.total_accepted
    }

    /// 每个 tick 调用一次；只有第一次满足条件时返回 `Some`
    pub fn check_completion(&mut self) -> Option<Completion> {
        if self.state() != SessionState::AwaitingPayment
            || self.total_accepted < self.required_amount
        {
            return None;
        }

        self.processed = true;
        self.change_due = self.total_accepted - self.required_amount;
        Some(Completion {
            total: self.total_accepted,
            required: self.required_amount,
            change: self.change_due,
        })
    }

    pub fn begin_dispense(&mut self) {
        self.dispensing = true;
    }

    /// 回到 Idle，清空所有计数
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn required_amount(&self) -> u32 {
        self.required_amount
    }

    pub fn total_accepted(&self) -> u32 {
        self.total_accepted
    }

    pub fn change_due(&self) -> u32 {
        self.change_due
    }

    pub fn payment_set(&self) -> bool {
        self.payment_set
    }

    pub fn processed(&self) -> bool {
        self.processed
    }
}
