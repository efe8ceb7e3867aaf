use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use clap::Parser;
use dashmap::DashMap;
use env_logger::Builder;
use grayscott_common::{SimParams, SimulationConfig, Snapshot};
use grayscott_common::{RenderMode, RenderTarget};
use grayscott_engine::field::Field;
use grayscott_engine::render::{self, FrameBuffer};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, LevelFilter};
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use palette::{FromColor, Hsv, Srgb};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin, bincode stream with a count header)
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file path (.mp4)
    #[arg(short, long, default_value = "grayscott_video.mp4")]
    output: PathBuf,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Optional path to the config.toml the run used, for render parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render target override: u, v, or absdiff
    #[arg(long)]
    target: Option<String>,

    /// Render mode override: flat or relief
    #[arg(long)]
    mode: Option<String>,

    /// Grid cell spacing for the relief projection (used if config is not provided)
    #[arg(long, default_value_t = 0.05)]
    space_step: f32,

    /// Color mapping applied to the rendered luminance: gray or hue
    #[arg(long, default_value = "gray")]
    color_map: String,

    /// Optional TTF/OTF font for the HUD line; no text is drawn without it
    #[arg(long)]
    font: Option<PathBuf>,

    /// Optional directory for per-frame PNG dumps
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Chunk size for parallel frame rendering
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ColorMap {
    Gray,
    Hue,
}

// Struct to represent a video frame
struct Frame {
    index: usize,
    image: RgbaImage,
}

/// Render parameters used when no config file is supplied. Only the render
/// fields and `space_step` matter to the visualizer.
fn default_params(space_step: f32) -> SimParams {
    SimParams {
        diffusion_u: 0.0009,
        diffusion_v: 0.004,
        feed: 0.09,
        kill: 0.06,
        space_step,
        time_step: 0.1,
        time_scale: 200.0,
        render_target: RenderTarget::U,
        render_mode: RenderMode::Relief,
    }
}

/// Maps the renderer's grayscale output through an HSV ramp: dark cells go
/// blue, bright cells go red, brightness follows the original luminance.
fn apply_hue_map(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let luminance = pixel[0] as f32 / 255.0;
        let hsv = Hsv::new(240.0 * (1.0 - luminance), 0.85, 0.15 + 0.85 * luminance);
        let rgb = Srgb::from_color(hsv);
        pixel[0] = (rgb.red * 255.0) as u8;
        pixel[1] = (rgb.green * 255.0) as u8;
        pixel[2] = (rgb.blue * 255.0) as u8;
    }
}

/// Re-renders one snapshot through the core field renderer. Returns None when
/// the snapshot carries no raw channel data or does not match the expected
/// dimensions (a mid-run reset can change them).
fn draw_frame(
    snapshot: &Snapshot,
    frame_index: usize,
    expected: (u32, u32),
    params: &SimParams,
    color_map: ColorMap,
    font: Option<&FontVec>,
) -> Result<Option<Frame>> {
    let (Some(u), Some(v)) = (&snapshot.u, &snapshot.v) else {
        return Ok(None);
    };
    if (snapshot.width, snapshot.height) != expected {
        return Ok(None);
    }

    let width = snapshot.width as usize;
    let height = snapshot.height as usize;
    let field = Field::from_raw(width, height, u.clone(), v.clone())?;

    let mut buffer = FrameBuffer::new(width, height);
    render::render(&field, params, &mut buffer);
    let mut image = RgbaImage::from_raw(snapshot.width, snapshot.height, buffer.into_data())
        .context("Frame buffer did not match the image dimensions")?;

    if color_map == ColorMap::Hue {
        apply_hue_map(&mut image);
    }

    if let Some(font) = font {
        let text = format!("t = {:7.2} s | mean v = {:.4}", snapshot.time, snapshot.mean_v);
        let scale = PxScale::from(16.0);
        draw_text_mut(&mut image, Rgba([255, 255, 255, 255]), 10, 8, scale, font, &text);
    }

    Ok(Some(Frame {
        index: frame_index,
        image,
    }))
}

/// RGB to YUV 4:2:0 conversion (BT.601) for the H.264 encoder.
fn rgb_to_yuv420(image: &RgbaImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let y_size = width * height;
    let mut yuv = vec![0u8; y_size + y_size / 2];

    for (x, y, pixel) in image.enumerate_pixels() {
        let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
        yuv[y as usize * width + x as usize] = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
    }

    // U and V planes are downsampled by 2 in each dimension: average each
    // 2x2 block of pixels.
    let u_offset = y_size;
    let v_offset = y_size + y_size / 4;
    let uv_width = width / 2;
    for by in (0..height).step_by(2) {
        for bx in (0..width).step_by(2) {
            let mut sum_u = 0.0f32;
            let mut sum_v = 0.0f32;
            let mut count = 0u32;
            for dy in 0..2 {
                for dx in 0..2 {
                    if by + dy < height && bx + dx < width {
                        let pixel = image.get_pixel((bx + dx) as u32, (by + dy) as u32);
                        let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
                        sum_u += -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
                        sum_v += 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
                        count += 1;
                    }
                }
            }
            yuv[u_offset + (by / 2) * uv_width + bx / 2] = (sum_u / count as f32).round() as u8;
            yuv[v_offset + (by / 2) * uv_width + bx / 2] = (sum_v / count as f32).round() as u8;
        }
    }
    yuv
}

fn main() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    Builder::from_default_env().filter(None, LevelFilter::Info).init();

    info!("Starting Gray-Scott Visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output video: {}", args.output.display());
    info!("Video FPS: {}", args.fps);

    // --- Resolve Render Parameters ---
    let mut params = if let Some(config_path) = &args.config {
        match SimulationConfig::load(config_path) {
            Ok(config) => {
                info!("Loaded render parameters from {}", config_path.display());
                config.get_sim_params()
            }
            Err(e) => {
                warn!(
                    "Failed to load config file '{}': {}. Using defaults.",
                    config_path.display(),
                    e
                );
                default_params(args.space_step)
            }
        }
    } else {
        default_params(args.space_step)
    };
    if let Some(target) = &args.target {
        params.render_target = target.parse()?;
    }
    if let Some(mode) = &args.mode {
        params.render_mode = mode.parse()?;
    }
    info!(
        "Rendering target {:?} in {:?} mode (space step {}).",
        params.render_target, params.render_mode, params.space_step
    );

    let color_map = match args.color_map.to_ascii_lowercase().as_str() {
        "gray" => ColorMap::Gray,
        "hue" => ColorMap::Hue,
        other => {
            warn!("Color map '{}' not recognized, using gray.", other);
            ColorMap::Gray
        }
    };

    let font = match &args.font {
        Some(path) => {
            let data = fs::read(path)
                .with_context(|| format!("Failed to read font file: {}", path.display()))?;
            let font = FontVec::try_from_vec(data)
                .map_err(|e| anyhow::anyhow!("Failed to parse font '{}': {}", path.display(), e))?;
            Some(font)
        }
        None => None,
    };

    if let Some(dir) = &args.frames_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create frames directory: {}", dir.display()))?;
    }

    // --- Open and Parse Snapshot File ---
    info!("Opening snapshot file: {}", args.input.display());
    let input_file = File::open(&args.input)
        .with_context(|| format!("Failed to open input file: {}", args.input.display()))?;
    let mut reader = BufReader::new(input_file);

    let snapshot_count: u32 = bincode::deserialize_from(&mut reader)
        .context("Failed to read snapshot count from header")?;
    info!("Found {} snapshots in the file", snapshot_count);

    if snapshot_count == 0 {
        warn!("Input file contains no snapshots. Exiting.");
        return Ok(());
    }

    let mut snapshots: Vec<Snapshot> = Vec::with_capacity(snapshot_count as usize);
    let mut snapshots_with_fields = 0usize;
    for i in 0..snapshot_count {
        match bincode::deserialize_from::<_, Snapshot>(&mut reader) {
            Ok(snapshot) => {
                if snapshot.u.is_some() && snapshot.v.is_some() {
                    snapshots_with_fields += 1;
                }
                snapshots.push(snapshot);
            }
            Err(e) => {
                error!("Error deserializing snapshot {}: {}", i, e);
                break;
            }
        }
    }

    if snapshots_with_fields == 0 {
        warn!("No snapshots contain raw field data! The video would be empty.");
        warn!("Re-run the engine with save_fields_in_snapshot = true.");
        return Ok(());
    }
    if snapshots_with_fields < snapshots.len() {
        warn!(
            "Only {} of {} snapshots carry field data; the rest will be skipped.",
            snapshots_with_fields,
            snapshots.len()
        );
    }

    // The encoder is fixed to the dimensions of the first usable snapshot;
    // frames from a different (post-reset) resolution are skipped.
    let first = snapshots
        .iter()
        .find(|s| s.u.is_some())
        .expect("checked above that at least one snapshot has fields");
    let (width, height) = (first.width, first.height);
    if width % 2 != 0 || height % 2 != 0 {
        anyhow::bail!(
            "Video dimensions must be even for YUV 4:2:0 encoding, got {}x{}.",
            width,
            height
        );
    }
    info!("Video dimensions: {}x{}", width, height);

    // Set up progress bar
    let progress_bar = ProgressBar::new(snapshots.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    progress_bar.set_message("Rendering snapshots");

    let start_time = Instant::now();

    // --- Render Frames in Parallel Chunks ---
    let frames_map = Arc::new(DashMap::new());
    let chunk_size = args.chunk_size.max(1);

    snapshots
        .par_chunks(chunk_size)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            for (i, snapshot) in chunk.iter().enumerate() {
                let frame_index = chunk_idx * chunk_size + i;
                match draw_frame(
                    snapshot,
                    frame_index,
                    (width, height),
                    &params,
                    color_map,
                    font.as_ref(),
                ) {
                    Ok(Some(frame)) => {
                        if let Some(dir) = &args.frames_dir {
                            let path = dir.join(format!("frame_{:05}.png", frame.index));
                            if let Err(e) = frame.image.save(&path) {
                                error!("Error writing PNG frame '{}': {}", path.display(), e);
                            }
                        }
                        frames_map.insert(frame.index, frame.image);
                    }
                    Ok(None) => {}
                    Err(e) => error!("Error rendering frame {}: {}", frame_index, e),
                }
            }
            progress_bar.inc(chunk.len() as u64);
        });
    progress_bar.finish_with_message(format!("Rendered {} frames", frames_map.len()));

    // --- Encode Frames in Sequence ---
    info!("Setting up video encoder...");
    let mut encoder = Encoder::with_api_config(
        openh264::OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(args.fps as f32))
            .bitrate(BitRate::from_bps(5_000_000)),
    )
    .context("Failed to initialize H.264 encoder")?;
    let mut h264_data = Vec::new();
    let mut frame_count = 0usize;

    let encode_progress = ProgressBar::new(frames_map.len() as u64);
    encode_progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} encoded ({percent}%) [{eta}]")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    encode_progress.set_message("Encoding frames");

    // Sort keys to ensure frames enter the stream in order.
    let mut sorted_keys: Vec<_> = frames_map.iter().map(|entry| *entry.key()).collect();
    sorted_keys.sort_unstable();

    // Convert batches to YUV in parallel, then encode sequentially to keep
    // the bitstream ordered.
    const ENCODE_BATCH_SIZE: usize = 30;
    for batch in sorted_keys.chunks(ENCODE_BATCH_SIZE) {
        let yuv_frames: Vec<_> = batch
            .par_iter()
            .filter_map(|&key| frames_map.remove(&key).map(|(_, image)| (key, rgb_to_yuv420(&image))))
            .collect();

        for (key, yuv_data) in yuv_frames {
            let yuv_source = YUVBuffer::from_vec(yuv_data, width as usize, height as usize);
            match encoder.encode(&yuv_source) {
                Ok(bitstream) => {
                    bitstream.write_vec(&mut h264_data);
                    frame_count += 1;
                }
                Err(e) => error!("Error encoding frame {}: {}", key, e),
            }
            encode_progress.inc(1);
        }
    }
    encode_progress.finish_with_message(format!("Encoded {} frames successfully", frame_count));

    // --- Mux into MP4 ---
    info!("Creating MP4 file...");
    let mut video_buffer = Cursor::new(Vec::new());
    let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
    let video_description = format!(
        "Gray-Scott reaction-diffusion, {:?}/{:?}",
        params.render_target, params.render_mode
    );
    mp4muxer.init_video(width as i32, height as i32, false, &video_description);
    mp4muxer.write_video(&h264_data);
    mp4muxer.close();

    video_buffer.seek(SeekFrom::Start(0))?;
    let mut video_bytes = Vec::new();
    video_buffer.read_to_end(&mut video_bytes)?;
    fs::write(&args.output, &video_bytes)
        .with_context(|| format!("Failed to write video file to {}", args.output.display()))?;

    let duration = start_time.elapsed();
    info!(
        "Video generation completed in {:.2?} ({:.1} frames per second)",
        duration,
        frame_count as f64 / duration.as_secs_f64()
    );
    info!("Output saved to: {}", args.output.display());

    Ok(())
}

// Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_fields(width: u32, height: u32) -> Snapshot {
        let n = (width * height) as usize;
        Snapshot {
            time: 1.5,
            width,
            height,
            mean_u: 0.5,
            min_u: 0.5,
            max_u: 0.5,
            mean_v: 0.0,
            min_v: 0.0,
            max_v: 0.0,
            u: Some(vec![0.5; n]),
            v: Some(vec![0.0; n]),
        }
    }

    #[test]
    fn draw_frame_skips_metrics_only_snapshots() {
        let mut snapshot = snapshot_with_fields(8, 8);
        snapshot.u = None;
        snapshot.v = None;
        let params = default_params(0.05);
        let frame = draw_frame(&snapshot, 0, (8, 8), &params, ColorMap::Gray, None).unwrap();
        assert!(frame.is_none());
    }

    #[test]
    fn draw_frame_produces_opaque_pixels() {
        let snapshot = snapshot_with_fields(8, 8);
        let params = default_params(0.05);
        let frame = draw_frame(&snapshot, 3, (8, 8), &params, ColorMap::Hue, None)
            .unwrap()
            .expect("snapshot has fields");
        assert_eq!(frame.index, 3);
        assert_eq!(frame.image.dimensions(), (8, 8));
        assert!(frame.image.pixels().all(|px| px[3] == 255));
    }

    #[test]
    fn yuv_planes_have_the_expected_sizes() {
        let image = RgbaImage::from_pixel(16, 8, Rgba([128, 64, 32, 255]));
        let yuv = rgb_to_yuv420(&image);
        assert_eq!(yuv.len(), 16 * 8 + 16 * 8 / 2);
    }
}
