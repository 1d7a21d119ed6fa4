//! 🫘 欢迎光临 🫘
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{CtVolume, CtWindow, OpenVolumeError};

pub use crate::roi::{
    bound_rect, BoundRect, CaseIndices, CaseRoi, FlushError, ReduceError, Roi, RoiReducer,
    RoiStore,
};

pub use crate::consts::gray::{KITS_BACKGROUND, KITS_KIDNEY, KITS_TUMOR};
pub use crate::consts::{
    ORGAN_KIDNEY, SPEC_CLASSES, KITS_TESTING_SET_LEN, KITS_TRAINING_SET_LEN,
};

pub use crate::dataset::{self, case_name, SliceStack, SliceStream};

pub use crate::segment::{argmax_classes, SliceSegmenter};
