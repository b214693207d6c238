// 错误定义
use core::fmt;

/// 结果类型
pub type Result<T> = core::result::Result<T, Error>;

/// 错误类型
///
/// 没有一种错误会让控制器停机：命令错误只回报给主机，状态不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// 金额必须为正数且在范围内
    InvalidAmount,
    /// 金额不是整数
    MalformedAmount,
    /// 未知命令
    UnknownCommand,
    /// 正在找零
    Busy,
    /// 配置无效
    InvalidConfig,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::InvalidAmount => "Amount must be a positive integer",
            Error::MalformedAmount => "Amount is not an integer",
            Error::UnknownCommand => "Unknown command",
            Error::Busy => "Change dispensing in progress",
            Error::InvalidConfig => "Invalid configuration",
        };
        f.write_str(text)
    }
}
