pub mod acceptor_task;
pub mod control_task;
pub mod serial_task;

pub use acceptor_task::acceptor_task;
pub use control_task::control_task;
pub use serial_task::{serial_rx_task, serial_tx_task};
