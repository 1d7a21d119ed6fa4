//! KiTS19 粗定位批处理作业.
//!
//! 对数据根目录下的每个 case 跑分割推理, 把逐切片预测流式归约为
//! 逐 case 肾脏 3D 包围盒, 每完成一个 case 就整体重写一次 roi 文件.

mod infer;

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::LevelFilter;
use ndarray::{Array4, Axis};

use kits_roi::consts::ORGAN_KIDNEY;
use kits_roi::dataset::{self, case_name, SliceStack, SliceStream};
use kits_roi::roi::{save_mask_with_roi, RoiReducer, RoiStore};
use kits_roi::segment::SliceSegmenter;
use kits_roi::CtWindow;

/// 从 KiTS19 数据集提取每个 case 的肾脏粗 ROI.
#[derive(Debug, Parser)]
#[command(name = "coarse-roi")]
struct Args {
    /// 分割网络 checkpoint (onnx 文件) 路径.
    #[arg(short, long)]
    resume: PathBuf,

    /// KiTS19 数据根目录.
    #[arg(long, default_value = "data")]
    data: PathBuf,

    /// 输出 roi 文件路径.
    #[arg(short, long, default_value = "roi.json")]
    output: PathBuf,

    /// 推理批大小.
    #[arg(long, default_value_t = 2)]
    batch_size: usize,

    /// 网络输入的邻域切片通道数 (正奇数).
    #[arg(long, default_value_t = 5)]
    stack_num: usize,

    /// 可视化图片输出目录. 不指定则关闭可视化侧通道.
    #[arg(long)]
    vis_dir: Option<PathBuf>,

    /// 每多少个批次保存一次可视化.
    #[arg(long, default_value_t = 20)]
    vis_interval: usize,
}

fn main() -> Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()?;
    let args = Args::parse();

    ensure!(
        args.resume.is_file(),
        "checkpoint {} does not exist",
        args.resume.display()
    );
    ensure!(
        args.data.is_dir(),
        "data path {} is not a directory",
        args.data.display()
    );
    ensure!(args.batch_size > 0, "batch size must be positive");
    if let Some(dir) = &args.vis_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating vis dir {}", dir.display()))?;
    }

    let cases = dataset::kits19_case_ids(&args.data)
        .with_context(|| format!("scanning {}", args.data.display()))?;
    ensure!(
        !cases.is_empty(),
        "no case_* directories under {}",
        args.data.display()
    );

    let bounds = dataset::scan_case_indices(&args.data, &cases)?;
    log::info!(
        "{} cases, {} slices under {}",
        bounds.cases(),
        bounds.total_len(),
        args.data.display()
    );

    let mut net = infer::OrtSegmenter::load(&args.resume)?;
    log::info!("checkpoint {} loaded", args.resume.display());

    let stream = SliceStream::new(
        &args.data,
        cases,
        args.stack_num,
        CtWindow::from_abdomen_visual(),
    );
    let mut reducer = RoiReducer::new(bounds);
    let mut store = RoiStore::new();

    // 批内切片仍按全局索引逐张喂给归约器, 推理批大小不影响结果.
    let mut batch: Vec<SliceStack> = Vec::with_capacity(args.batch_size);
    let mut batch_idx = 0usize;
    for item in stream {
        batch.push(item?);
        if batch.len() == args.batch_size {
            run_batch(&args, batch_idx, &mut net, &mut reducer, &mut store, &batch)?;
            batch.clear();
            batch_idx += 1;
        }
    }
    if !batch.is_empty() {
        run_batch(&args, batch_idx, &mut net, &mut reducer, &mut store, &batch)?;
    }

    // 结清尾部的零长度 case; 流若在某个 case 中途断掉, 这里会报错.
    for done in reducer.finish()? {
        store.record(done.case, ORGAN_KIDNEY, done.roi);
        report_case(done.case, &done.roi);
    }
    store.flush(&args.output)?;

    log::info!("{} cases -> {}", store.len(), args.output.display());
    Ok(())
}

fn run_batch(
    args: &Args,
    batch_idx: usize,
    net: &mut infer::OrtSegmenter,
    reducer: &mut RoiReducer,
    store: &mut RoiStore,
    batch: &[SliceStack],
) -> Result<()> {
    let views: Vec<_> = batch.iter().map(|s| s.data.view()).collect();
    let input: Array4<f32> =
        ndarray::stack(Axis(0), &views).context("slices in a batch must share one shape")?;

    let masks = net.segment(&input)?;

    for (meta, mask) in batch.iter().zip(masks.axis_iter(Axis(0))) {
        for done in reducer.push(mask, meta.global_index)? {
            store.record(done.case, ORGAN_KIDNEY, done.roi);
            store
                .flush(&args.output)
                .with_context(|| format!("flushing {}", args.output.display()))?;
            report_case(done.case, &done.roi);
        }
    }

    if let Some(dir) = &args.vis_dir {
        if args.vis_interval > 0 && batch_idx % args.vis_interval == 0 {
            let path = dir.join(format!("batch_{batch_idx:06}.png"));
            let mask0 = masks.index_axis(Axis(0), 0);
            if let Err(e) = save_mask_with_roi(mask0, reducer.current(), &path) {
                log::warn!("visualization skipped: {e}");
            }
        }
    }

    Ok(())
}

fn report_case(case: usize, roi: &kits_roi::roi::Roi) {
    if roi.is_empty() {
        log::warn!("{}: no kidney voxels, sentinel box kept", case_name(case));
    } else {
        log::info!(
            "{}: kidney x [{}, {}) y [{}, {}) z [{}, {}]",
            case_name(case),
            roi.min_x,
            roi.max_x,
            roi.min_y,
            roi.max_y,
            roi.min_z,
            roi.max_z
        );
    }
}
