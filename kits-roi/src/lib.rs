#![warn(missing_docs)]

//! 核心库. 提供 KiTS19 数据集肾脏 (及肿瘤) CT 扫描的结构化信息,
//! 以及把逐切片语义分割结果归约为逐 case 3D 包围盒 (粗 ROI) 的流式算法.
//!
//! 整体流程分两层:
//!
//! 1. [`roi::RoiReducer`] 消费一条全局索引递增、跨 case 的切片预测流,
//!   在 case 边界处产出一个收紧的 3D 包围盒;
//! 2. [`roi::RoiStore`] 累积所有已完成 case 的包围盒, 并在每个 case
//!   结束后把完整映射落盘 (增量 checkpoint, 崩溃后文件总是最后一次
//!   完整状态).
//!
//! # 注意
//!
//! 1. 该 crate 目前主要负责处理 KiTS19 模式组织的数据, 没有对其它源的数据
//!   进行直接适配 (但新数据若按 KiTS19 模式组织, 也可以工作).
//! 2. 归约器对 "全局索引稠密递增" 这一前置条件做显式检查, 违反时返回
//!   `Err` 而不是静默产出错误的包围盒.
//! 3. 在非期望情况下 (如越界索引), 程序会直接 panic, 而不会导致内存错误.
//!   As what Rust promises.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 3D CT nii 文件基础数据结构.
mod data;

pub use data::{slice_count, CtVolume, CtWindow, OpenVolumeError};

pub mod consts;

pub mod dataset;
pub mod roi;
pub mod segment;

pub mod prelude;
