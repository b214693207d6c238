// 投币器/纸币器脉冲任务
//
// 只负责把下降沿时间交给计数器，消抖和分组由计数器完成
use defmt::info;
use embassy_stm32::exti::ExtiInput;
use embassy_time::Instant;
use paykiosk_core::PulseCounter;

/// 脉冲输入任务（投币器和纸币器各一个实例）
#[embassy_executor::task(pool_size = 2)]
pub async fn acceptor_task(mut line: ExtiInput<'static>, counter: &'static PulseCounter) -> ! {
    info!("{} acceptor task started", counter.config().kind);

    loop {
        line.wait_for_falling_edge().await;
        counter.record_edge(Instant::now());
    }
}
