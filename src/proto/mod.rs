//! 传输层/协议模块
//!
//! 仿真用的 Reno 系 TCP（NewReno / LinuxReno 拥塞避免）。

pub mod tcp;
