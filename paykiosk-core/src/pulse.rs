// 脉冲计数器
//
// 边沿回调（中断上下文）只做计数和打时间戳；主循环在静默窗口之后取走计数并清零。
// 两边都在临界区里访问同一份状态。
use crate::config::AcceptorConfig;
use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Instant;

/// 投币器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptorState {
    pub pulse_count: u8,
    pub last_pulse: Option<Instant>,
}

impl AcceptorState {
    const IDLE: Self = Self {
        pulse_count: 0,
        last_pulse: None,
    };
}

/// 单个投币器的脉冲计数器
pub struct PulseCounter {
    config: AcceptorConfig,
    state: Mutex<CriticalSectionRawMutex, Cell<AcceptorState>>,
}

impl PulseCounter {
    pub const fn new(config: AcceptorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(Cell::new(AcceptorState::IDLE)),
        }
    }

    pub fn config(&self) -> &AcceptorConfig {
        &self.config
    }

    /// 边沿回调：记录一个下降沿
    ///
    /// 距上一个有效沿不超过消抖时间的沿被忽略。不做 I/O，不阻塞。
    pub fn record_edge(&self, now: Instant) {
        let debounce = self.config.debounce;
        let max = self.config.max_pulses;
        self.state.lock(|cell| {
            let mut state = cell.get();
            let accepted = match state.last_pulse {
                Some(last) => now.saturating_duration_since(last) > debounce,
                None => true,
            };
            if accepted {
                if state.pulse_count < max {
                    state.pulse_count += 1;
                }
                state.last_pulse = Some(now);
                cell.set(state);
            }
        });
    }

    /// 主循环：脉冲串结束后取走计数并清零
    ///
    /// 读取、判断、清零在同一个临界区内完成，不会和边沿回调交错。
    pub fn take_finalized(&self, now: Instant) -> Option<u8> {
        let settle = self.config.settle;
        self.state.lock(|cell| {
            let mut state = cell.get();
            let last = state.last_pulse?;
            if state.pulse_count == 0 || now.saturating_duration_since(last) <= settle {
                return None;
            }
            let pulses = state.pulse_count;
            state.pulse_count = 0;
            cell.set(state);
            Some(pulses)
        })
    }

    /// 丢弃未结算的脉冲
    pub fn clear(&self) {
        self.state.lock(|cell| {
            let mut state = cell.get();
            state.pulse_count = 0;
            cell.set(state);
        });
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> AcceptorState {
        self.state.lock(|cell| cell.get())
    }
}
