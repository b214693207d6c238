// 任务间通道
//
// serial_rx_task -> control_task：命令行
// control_task -> serial_tx_task：状态行
use defmt::warn;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use paykiosk_core::{Line, Status, StatusSink};

/// 命令队列深度
pub const COMMAND_QUEUE: usize = 4;
/// 状态队列深度
pub const STATUS_QUEUE: usize = 32;

pub type CommandChannel = Channel<CriticalSectionRawMutex, Line, COMMAND_QUEUE>;
pub type CommandSender = Sender<'static, CriticalSectionRawMutex, Line, COMMAND_QUEUE>;
pub type CommandReceiver = Receiver<'static, CriticalSectionRawMutex, Line, COMMAND_QUEUE>;

pub type StatusChannel = Channel<CriticalSectionRawMutex, Status, STATUS_QUEUE>;
pub type StatusSender = Sender<'static, CriticalSectionRawMutex, Status, STATUS_QUEUE>;
pub type StatusReceiver = Receiver<'static, CriticalSectionRawMutex, Status, STATUS_QUEUE>;

/// 控制器的状态输出：写入发送队列，满了就丢弃
pub struct StatusOut {
    tx: StatusSender,
}

impl StatusOut {
    pub const fn new(tx: StatusSender) -> Self {
        Self { tx }
    }
}

impl StatusSink for StatusOut {
    fn emit(&mut self, status: Status) {
        if self.tx.try_send(status).is_err() {
            warn!("Status queue full, dropping line");
        }
    }
}
