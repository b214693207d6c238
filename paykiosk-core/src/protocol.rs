// 串口命令协议：按行的 ASCII 命令
use crate::error::{Error, Result};
use heapless::{String, Vec};

/// 单行最大长度，超出部分直接截断
pub const LINE_CAPACITY: usize = 64;

/// 一行命令文本
pub type Line = String<LINE_CAPACITY>;

const SET_PAYMENT: &str = "SET_PAYMENT:";
const DISPENSE: &str = "DISPENSE:";
const STOP_HOPPER: &str = "STOP_HOPPER";
const RESET: &str = "RESET";

/// 主机命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// 设置应付金额
    SetPayment(u32),
    /// 立即找零指定金额
    Dispense(u32),
    /// 急停：两个退币器断电，不动交易状态
    StopHopper,
    /// 整个交易复位
    Reset,
}

impl Command {
    /// 解析一行命令（前缀区分大小写）
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if let Some(arg) = line.strip_prefix(SET_PAYMENT) {
            parse_amount(arg).map(Command::SetPayment)
        } else if let Some(arg) = line.strip_prefix(DISPENSE) {
            parse_amount(arg).map(Command::Dispense)
        } else if line == STOP_HOPPER {
            Ok(Command::StopHopper)
        } else if line == RESET {
            Ok(Command::Reset)
        } else {
            Err(Error::UnknownCommand)
        }
    }
}

fn parse_amount(arg: &str) -> Result<u32> {
    let amount: i64 = arg.trim().parse().map_err(|_| Error::MalformedAmount)?;
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    u32::try_from(amount).map_err(|_| Error::InvalidAmount)
}

/// 行组装器
///
/// 逐字节喂入，遇到 `\n` 输出一行。`\r` 忽略，空行忽略。
/// 超过 `LINE_CAPACITY` 的字节被丢弃，直到行尾。
pub struct LineCodec {
    buffer: Vec<u8, LINE_CAPACITY>,
    truncated: bool,
}

impl LineCodec {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            truncated: false,
        }
    }

    /// 重置
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.truncated = false;
    }

    /// 喂入一个字节，行结束时返回整行
    pub fn feed(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\n' => self.finish(),
            b'\r' => None,
            _ => {
                if self.buffer.push(byte).is_err() && !self.truncated {
                    warn!("Command line longer than {} bytes, truncating", LINE_CAPACITY);
                    self.truncated = true;
                }
                None
            }
        }
    }

    fn finish(&mut self) -> Option<Line> {
        let bytes = core::mem::take(&mut self.buffer);
        self.truncated = false;
        if bytes.is_empty() {
            return None;
        }
        match String::from_utf8(bytes) {
            Ok(line) => Some(line),
            Err(_) => {
                warn!("Dropping non UTF-8 command line");
                None
            }
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(codec: &mut LineCodec, data: &[u8]) -> std::vec::Vec<Line> {
        data.iter().filter_map(|&b| codec.feed(b)).collect()
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("SET_PAYMENT:100"), Ok(Command::SetPayment(100)));
        assert_eq!(Command::parse("DISPENSE:3"), Ok(Command::Dispense(3)));
        assert_eq!(Command::parse("STOP_HOPPER"), Ok(Command::StopHopper));
        assert_eq!(Command::parse("RESET"), Ok(Command::Reset));
        assert_eq!(Command::parse("  RESET \r"), Ok(Command::Reset));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert_eq!(Command::parse("SET_PAYMENT:0"), Err(Error::InvalidAmount));
        assert_eq!(Command::parse("SET_PAYMENT:-5"), Err(Error::InvalidAmount));
        assert_eq!(Command::parse("DISPENSE:0"), Err(Error::InvalidAmount));
        assert_eq!(Command::parse("DISPENSE:99999999999"), Err(Error::InvalidAmount));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(Command::parse("SET_PAYMENT:"), Err(Error::MalformedAmount));
        assert_eq!(Command::parse("SET_PAYMENT:ten"), Err(Error::MalformedAmount));
        assert_eq!(Command::parse("DISPENSE:3.5"), Err(Error::MalformedAmount));
    }

    #[test]
    fn prefixes_are_case_sensitive() {
        assert_eq!(Command::parse("reset"), Err(Error::UnknownCommand));
        assert_eq!(Command::parse("set_payment:10"), Err(Error::UnknownCommand));
        assert_eq!(Command::parse("STOP"), Err(Error::UnknownCommand));
        assert_eq!(Command::parse("RESET NOW"), Err(Error::UnknownCommand));
    }

    #[test]
    fn codec_splits_lines() {
        let mut codec = LineCodec::new();
        let lines = feed_all(&mut codec, b"SET_PAYMENT:47\r\n\nDISPENSE:3\nRES");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_str(), "SET_PAYMENT:47");
        assert_eq!(lines[1].as_str(), "DISPENSE:3");

        let rest = feed_all(&mut codec, b"ET\n");
        assert_eq!(rest[0].as_str(), "RESET");
    }

    #[test]
    fn codec_truncates_long_lines() {
        let mut codec = LineCodec::new();
        let mut data = std::vec![b'X'; LINE_CAPACITY + 40];
        data.push(b'\n');
        data.extend_from_slice(b"RESET\n");

        let lines = feed_all(&mut codec, &data);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), LINE_CAPACITY);
        assert_eq!(lines[1].as_str(), "RESET");
    }

    #[test]
    fn codec_drops_invalid_utf8() {
        let mut codec = LineCodec::new();
        let lines = feed_all(&mut codec, &[0xFF, 0xFE, b'\n', b'R', b'E', b'S', b'E', b'T', b'\n']);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_str(), "RESET");
    }
}
