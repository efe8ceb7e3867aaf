use anyhow::Result;
use grayscott_common::{OutputConfig, SimulationConfig, Snapshot};
use grayscott_engine::Simulation;
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::Write;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Gray-Scott engine (CPU parallel)...");

    // --- Load Configuration ---
    let config = SimulationConfig::load("config.toml")?;
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    let params = config.get_sim_params();
    let timing = config.timing.clone();
    let output = config.output.clone();

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(config)?;
    let (width, height) = sim.resolution();
    info!("Initialized {}x{} grid ({} cells).", width, height, width * height);
    debug!("Simulation parameters: {:#?}", params);

    let frame_interval = Duration::from_secs_f64(1.0 / timing.target_fps);
    let total = Duration::from_secs_f64(timing.duration_seconds);
    info!(
        "Running for {:.1} real seconds at up to {:.0} fps, recording every {:.2} s.",
        timing.duration_seconds, timing.target_fps, timing.record_interval_seconds
    );

    // --- Initial Snapshot (t = 0) ---
    if output.save_snapshots {
        sim.record_snapshot();
    }

    // --- Frame Loop ---
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let mut next_record_seconds = timing.record_interval_seconds;
    let mut frame_count: u64 = 0;

    while start_time.elapsed() < total {
        let frame_start = Instant::now();
        let now_seconds = start_time.elapsed().as_secs_f64();

        sim.frame(now_seconds, &params)?;
        frame_count += 1;

        if output.save_snapshots && now_seconds >= next_record_seconds {
            sim.record_snapshot();
            next_record_seconds += timing.record_interval_seconds;
        }

        let frame_duration = frame_start.elapsed();
        let current_time = Instant::now();
        if current_time.duration_since(previous_print_time).as_secs_f64() >= 5.0 {
            info!(
                "Frame {} | Simulated: {:8.2} s | Steps: {} | Frame time: {:6.2} ms",
                frame_count,
                sim.simulated_seconds(),
                sim.steps_total(),
                frame_duration.as_secs_f64() * 1000.0
            );
            previous_print_time = current_time;
        } else {
            trace!(
                "Frame {} completed in {:.2} ms.",
                frame_count,
                frame_duration.as_secs_f64() * 1000.0
            );
        }

        // Pace the loop to the display rate; the clock absorbs any jitter.
        if frame_duration < frame_interval {
            std::thread::sleep(frame_interval - frame_duration);
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Run finished: {} frames, {} steps, {:.2} simulated seconds in {:.2} real seconds.",
        frame_count,
        sim.steps_total(),
        sim.simulated_seconds(),
        total_duration.as_secs_f64()
    );

    // --- Save Recorded Data ---
    if output.save_snapshots {
        info!("Saving {} recorded snapshots...", sim.recorded_snapshots().len());
        save_snapshots(sim.recorded_snapshots(), &output);
    } else {
        info!("Skipping snapshot save as per config (save_snapshots is false).");
    }

    if output.save_metrics {
        save_metrics_csv(sim.recorded_snapshots(), &output.base_filename)?;
    } else {
        info!("Skipping metrics save as per config (save_metrics is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}

/// Writes the snapshot list in the configured format. Persistence failures
/// are logged rather than propagated so a long run is never lost to a full
/// disk at the last moment.
fn save_snapshots(snapshots: &[Snapshot], output: &OutputConfig) {
    let format = output.format.as_deref().unwrap_or("json");
    match format {
        "json" => save_snapshots_json(snapshots, &output.base_filename),
        "bincode" => {
            // Streamed: a u32 count header followed by each snapshot, so the
            // visualizer can read frames without loading the whole file.
            let filename = format!("{}_snapshots.bin", output.base_filename);
            match File::create(&filename) {
                Ok(mut file) => {
                    let mut write_stream = || -> bincode::Result<()> {
                        bincode::serialize_into(&mut file, &(snapshots.len() as u32))?;
                        for snapshot in snapshots {
                            bincode::serialize_into(&mut file, snapshot)?;
                        }
                        Ok(())
                    };
                    match write_stream() {
                        Ok(()) => info!("All snapshots saved to {} (binary format)", filename),
                        Err(e) => error!("Error serializing snapshots to bincode: {}", e),
                    }
                }
                Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
            }
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", output.base_filename);
            match File::create(&filename) {
                Ok(mut file) => match rmp_serde::encode::write(&mut file, snapshots) {
                    Ok(_) => info!("All snapshots saved to {} (MessagePack format)", filename),
                    Err(e) => error!("Error serializing snapshots to MessagePack: {}", e),
                },
                Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
            }
        }
        _ => {
            error!("Unknown output format: {}. Using JSON instead.", format);
            save_snapshots_json(snapshots, &output.base_filename);
        }
    }
}

fn save_snapshots_json(snapshots: &[Snapshot], base_filename: &str) {
    let filename = format!("{}_snapshots.json", base_filename);
    match File::create(&filename) {
        Ok(mut file) => match serde_json::to_string(snapshots) {
            Ok(json_string) => {
                if let Err(e) = file.write_all(json_string.as_bytes()) {
                    error!("Error writing snapshot JSON to file '{}': {}", filename, e);
                } else {
                    info!(
                        "All snapshots saved to {} ({} MB)",
                        filename,
                        json_string.len() / 1_048_576
                    );
                }
            }
            Err(e) => error!("Error serializing snapshots to JSON: {}", e),
        },
        Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
    }
}

/// One CSV row of summary metrics per recorded snapshot.
fn save_metrics_csv(snapshots: &[Snapshot], base_filename: &str) -> Result<()> {
    let filename = format!("{}_metrics.csv", base_filename);
    match csv::Writer::from_path(&filename) {
        Ok(mut writer) => {
            writer.write_record(["time_s", "mean_u", "min_u", "max_u", "mean_v", "min_v", "max_v"])?;
            for snapshot in snapshots {
                writer.write_record(&[
                    format!("{:.4}", snapshot.time),
                    format!("{:.6}", snapshot.mean_u),
                    format!("{:.6}", snapshot.min_u),
                    format!("{:.6}", snapshot.max_u),
                    format!("{:.6}", snapshot.mean_v),
                    format!("{:.6}", snapshot.min_v),
                    format!("{:.6}", snapshot.max_v),
                ])?;
            }
            writer.flush()?;
            info!("Metrics saved to {}", filename);
        }
        Err(e) => error!("Error creating metrics file '{}': {}", filename, e),
    }
    Ok(())
}
