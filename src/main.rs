#![no_std]
#![no_main]

mod drivers;
mod event;
mod tasks;

use defmt::{info, unwrap};
use drivers::RelayHopper;
use embassy_executor::Spawner;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::usart::{self, Uart};
use embassy_stm32::{bind_interrupts, peripherals, Config};
use embassy_sync::channel::Channel;
use event::{CommandChannel, StatusChannel, StatusOut};
use paykiosk_core::{AcceptorConfig, Controller, ControllerConfig, PulseCounter};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

/// 主机串口波特率
const HOST_BAUDRATE: u32 = 9600;

bind_interrupts!(struct Irqs {
    USART2 => usart::InterruptHandler<peripherals::USART2>;
});

// 边沿回调和主循环共享的脉冲计数
static COIN_PULSES: PulseCounter = PulseCounter::new(AcceptorConfig::COIN);
static BILL_PULSES: PulseCounter = PulseCounter::new(AcceptorConfig::BILL);

static COMMAND_CHANNEL: StaticCell<CommandChannel> = StaticCell::new();
static STATUS_CHANNEL: StaticCell<StatusChannel> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let p = embassy_stm32::init(Config::default());

    info!("=== Payment Kiosk Controller ===");

    // 继电器低电平吸合，上电先拉高保持断开
    let hopper_a = RelayHopper::new(
        "hopper-a",
        Output::new(p.PC0, Level::High, Speed::Low),
        Input::new(p.PB0, Pull::Up),
    );
    let hopper_b = RelayHopper::new(
        "hopper-b",
        Output::new(p.PC1, Level::High, Speed::Low),
        Input::new(p.PB1, Pull::Up),
    );

    let coin_line = ExtiInput::new(p.PA0, p.EXTI0, Pull::Up);
    let bill_line = ExtiInput::new(p.PA1, p.EXTI1, Pull::Up);

    let mut uart_config = usart::Config::default();
    uart_config.baudrate = HOST_BAUDRATE;
    let uart = unwrap!(Uart::new(
        p.USART2,
        p.PA3,
        p.PA2,
        Irqs,
        p.DMA1_CH6,
        p.DMA1_CH5,
        uart_config,
    ));
    let (uart_tx, uart_rx) = uart.split();

    let commands: &'static CommandChannel = COMMAND_CHANNEL.init(Channel::new());
    let statuses: &'static StatusChannel = STATUS_CHANNEL.init(Channel::new());

    // 大面额 B 先出，小面额 A 后出
    let controller = unwrap!(Controller::new(
        ControllerConfig::default(),
        &COIN_PULSES,
        &BILL_PULSES,
        hopper_b,
        hopper_a,
    ));

    info!("Spawning tasks...");
    spawner.spawn(unwrap!(tasks::acceptor_task(coin_line, &COIN_PULSES)));
    spawner.spawn(unwrap!(tasks::acceptor_task(bill_line, &BILL_PULSES)));
    spawner.spawn(unwrap!(tasks::serial_rx_task(uart_rx, commands.sender())));
    spawner.spawn(unwrap!(tasks::serial_tx_task(uart_tx, statuses.receiver())));
    spawner.spawn(unwrap!(tasks::control_task(
        controller,
        commands.receiver(),
        StatusOut::new(statuses.sender()),
    )));

    info!("=== System ready ===");

    loop {
        embassy_time::Timer::after_secs(60).await;
        let coin = COIN_PULSES.snapshot();
        let bill = BILL_PULSES.snapshot();
        info!(
            "Main: running, pending pulses coin={} bill={}",
            coin.pulse_count, bill.pulse_count
        );
    }
}
