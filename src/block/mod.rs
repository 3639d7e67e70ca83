//! 块设备抽象
//!
//! block/device.rs 定义块设备接口。
//! block/frontend.rs 是接口在命令通道上的实现：读先查扇区缓存，未命中时经后端从远程取回；
//! 写直接穿透到远程，确认后才更新缓存。

mod device;
#[cfg(feature = "std")]
mod frontend;

pub use device::BlockDevice;
#[cfg(feature = "std")]
pub use frontend::{DiskStats, RemoteDisk};
