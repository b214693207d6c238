// 主机串口收发任务
use core::fmt::Write;

use defmt::{debug, info, warn};
use embassy_stm32::mode::Async;
use embassy_stm32::usart::{UartRx, UartTx};
use heapless::String;
use paykiosk_core::LineCodec;

use crate::event::{CommandSender, StatusReceiver};

/// 单行状态输出的最大长度
const TX_LINE_CAPACITY: usize = 128;

/// 串口接收任务：字节流切成命令行，送入命令队列
#[embassy_executor::task]
pub async fn serial_rx_task(mut rx: UartRx<'static, Async>, commands: CommandSender) -> ! {
    info!("Serial RX task started");

    let mut codec = LineCodec::new();
    let mut buf = [0u8; 32];

    loop {
        match rx.read_until_idle(&mut buf).await {
            Ok(n) => {
                for &byte in &buf[..n] {
                    if let Some(line) = codec.feed(byte) {
                        debug!("Serial RX: {}", line.as_str());
                        commands.send(line).await;
                    }
                }
            }
            Err(e) => {
                // 出错后丢掉半行，等下一个换行重新同步
                warn!("Serial RX error: {:?}, discarding partial line", e);
                codec.reset();
            }
        }
    }
}

/// 串口发送任务：每条状态一行，以 CRLF 结尾
#[embassy_executor::task]
pub async fn serial_tx_task(mut tx: UartTx<'static, Async>, statuses: StatusReceiver) -> ! {
    info!("Serial TX task started");

    let mut line: String<TX_LINE_CAPACITY> = String::new();

    loop {
        let status = statuses.receive().await;

        line.clear();
        if write!(line, "{}", status).is_err() {
            // 超长部分已丢弃，已写入的前缀照常发出
            warn!("Status line truncated");
        }

        if tx.write(line.as_bytes()).await.is_err() || tx.write(b"\r\n").await.is_err() {
            warn!("Serial TX error");
        }
    }
}
