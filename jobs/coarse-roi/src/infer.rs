//! ONNX Runtime 推理后端.
//!
//! checkpoint 即训练侧导出的 onnx 文件; 网络结构对本作业完全不透明.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array3, Array4, ArrayView4};
use ort::session::Session;
use ort::value::TensorRef;

use kits_roi::consts::SPEC_CLASSES;
use kits_roi::segment::{argmax_classes, SegmentError, SliceSegmenter};

pub struct OrtSegmenter {
    session: Session,
    input_name: String,
}

impl OrtSegmenter {
    /// 加载导出的分割网络 checkpoint (onnx 文件).
    pub fn load(model: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_intra_threads(4)?
            .commit_from_file(model)
            .with_context(|| format!("loading checkpoint {}", model.display()))?;
        let input_name = session
            .inputs
            .first()
            .context("model has no input tensors")?
            .name
            .clone();

        Ok(Self {
            session,
            input_name,
        })
    }
}

fn backend<E: std::error::Error + Send + Sync + 'static>(e: E) -> SegmentError {
    SegmentError::Backend(Box::new(e))
}

impl SliceSegmenter for OrtSegmenter {
    fn segment(&mut self, batch: &Array4<f32>) -> Result<Array3<u8>, SegmentError> {
        let tensor = TensorRef::from_array_view(batch).map_err(backend)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(backend)?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| SegmentError::Backend("model produced no outputs".into()))?;
        let (shape, data) = value.try_extract_tensor::<f32>().map_err(backend)?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let &[n, c, h, w] = dims.as_slice() else {
            return Err(SegmentError::BadOutputShape(dims));
        };
        let scores = ArrayView4::from_shape((n, c, h, w), data)
            .map_err(|_| SegmentError::BadOutputShape(dims.clone()))?;

        Ok(argmax_classes(scores, &SPEC_CLASSES))
    }
}
