// 继电器驱动的找零仓
use defmt::debug;
use embassy_stm32::gpio::{Input, Output};
use paykiosk_core::HopperDrive;

/// 一个找零仓：继电器输出（低电平吸合）+ 出币传感器输入（上拉，出币时拉低）
pub struct RelayHopper<'d> {
    pub label: &'static str,
    relay: Output<'d>,
    sensor: Input<'d>,
}

impl<'d> RelayHopper<'d> {
    /// 调用方负责以高电平（断开）初始化继电器引脚
    pub fn new(label: &'static str, relay: Output<'d>, sensor: Input<'d>) -> Self {
        Self {
            label,
            relay,
            sensor,
        }
    }
}

impl HopperDrive for RelayHopper<'_> {
    fn energize(&mut self) {
        debug!("{}: relay on", self.label);
        self.relay.set_low();
    }

    fn de_energize(&mut self) {
        debug!("{}: relay off", self.label);
        self.relay.set_high();
    }

    fn sensor_low(&mut self) -> bool {
        self.sensor.is_low()
    }
}
