// 控制循环
//
// 1ms 节拍驱动计数器收尾和找零仓状态机，命令到达时立即处理
use defmt::info;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Ticker};
use paykiosk_core::Controller;

use crate::drivers::RelayHopper;
use crate::event::{CommandReceiver, StatusOut};

/// 控制循环节拍
const CONTROL_TICK: Duration = Duration::from_millis(1);

pub type KioskController = Controller<'static, RelayHopper<'static>>;

#[embassy_executor::task]
pub async fn control_task(
    mut controller: KioskController,
    commands: CommandReceiver,
    mut status: StatusOut,
) -> ! {
    info!("Control task started");

    controller.announce(&mut status);

    let mut ticker = Ticker::every(CONTROL_TICK);

    loop {
        match select(ticker.next(), commands.receive()).await {
            Either::First(()) => controller.tick(Instant::now(), &mut status),
            Either::Second(line) => {
                controller.handle_line(&line, Instant::now(), &mut status);
            }
        }
    }
}
