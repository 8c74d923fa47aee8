use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fret_trainer::analysis::note::midi_to_frequency;
use fret_trainer::config::AppConfig;
use fret_trainer::engine::{
    list_input_devices, CpalBackend, PracticeService, StubBackend, StubHandle, StubTimeSource,
};
use fret_trainer::practice::{ResultEvent, ScoreNote};
use fret_trainer::testing::{score_note, synth, wav, SimulatedScore, STANDARD_TUNING};
use serde::Serialize;

/// Host frame rate the service is ticked at
const TICK_HZ: u32 = 60;
const SIM_SAMPLE_RATE: u32 = 44_100;
/// 120 BPM: one quarter note every 500 ms
const SIM_BEAT_MS: u64 = 500;

#[derive(Parser, Debug)]
#[command(
    name = "fret_cli",
    about = "Pitch detection and practice harness for the fret trainer"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pitch pipeline over a WAV file and print one update per frame
    Analyze {
        #[arg(long)]
        wav: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Play a scripted riff into a simulated score and print the results
    Simulate {
        /// Attack-gated matching with automatic cursor advance
        #[arg(long)]
        follow: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Listen to the default microphone and print confirmed notes
    Listen {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List audio input devices
    Devices,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { wav, config } => run_analyze(&wav, load_config(config.as_deref())),
        Commands::Simulate { follow, config } => {
            run_simulate(follow, load_config(config.as_deref()))
        }
        Commands::Listen { seconds, config } => {
            run_listen(seconds, load_config(config.as_deref()))
        }
        Commands::Devices => run_devices(),
    }
}

/// Explicit file, else the bundled asset, else defaults
fn load_config(path: Option<&Path>) -> AppConfig {
    path.map_or_else(AppConfig::load, AppConfig::load_from_file)
}

/// Service on a scripted microphone and a manual clock
fn offline_service(
    config: AppConfig,
    sample_rate: u32,
    score: SimulatedScore,
) -> Result<(PracticeService, StubHandle, Arc<StubTimeSource>)> {
    let backend = StubBackend::new(sample_rate);
    let handle = backend.handle();
    let clock = Arc::new(StubTimeSource::new());
    let mut service = PracticeService::with_time_source(config, Box::new(backend), clock.clone())
        .context("invalid configuration")?;
    service.attach_score(Box::new(score));
    service.start().context("starting practice service")?;
    Ok((service, handle, clock))
}

fn hop_size(sample_rate: u32) -> usize {
    (sample_rate / TICK_HZ).max(1) as usize
}

fn run_analyze(path: &Path, config: AppConfig) -> Result<ExitCode> {
    let (samples, sample_rate) =
        wav::read_wav(path).with_context(|| format!("reading {}", path.display()))?;
    let (mut service, handle, clock) =
        offline_service(config, sample_rate, SimulatedScore::standard_tuning())?;
    let mut updates = service.subscribe_pitch();

    let hop = hop_size(sample_rate);
    let hop_duration = Duration::from_secs_f64(hop as f64 / sample_rate as f64);
    let mut frames = 0usize;

    for chunk in samples.chunks(hop) {
        handle.push(chunk);
        clock.advance(hop_duration);
        service.tick();

        while let Ok(update) = updates.try_recv() {
            println!("{}", serde_json::to_string(&update)?);
            frames += 1;
        }
    }

    eprintln!(
        "{} frames from {} samples at {} Hz",
        frames,
        samples.len(),
        sample_rate
    );
    service.dispose();
    Ok(ExitCode::from(0))
}

/// Notes of one beat plus what the simulated player actually plays
struct ScriptedBeat {
    notes: Vec<(u8, u8)>,
    played: Vec<(u8, u8)>,
}

/// A short riff: single notes, a power chord, and one fumbled note
fn riff() -> Vec<ScriptedBeat> {
    let beat = |notes: &[(u8, u8)], played: &[(u8, u8)]| ScriptedBeat {
        notes: notes.to_vec(),
        played: played.to_vec(),
    };
    vec![
        beat(&[(6, 0)], &[(6, 0)]),
        beat(&[(5, 2)], &[(5, 2)]),
        beat(&[(5, 0), (4, 2)], &[(5, 0), (4, 2)]),
        beat(&[(4, 2)], &[(4, 3)]),
        beat(&[(3, 0)], &[(3, 0)]),
        beat(&[(5, 3)], &[]),
    ]
}

fn fretted_frequency(string_index: u8, fret: u8) -> f32 {
    let open = STANDARD_TUNING[usize::from(string_index) - 1];
    midi_to_frequency(open + i32::from(fret))
}

#[derive(Serialize)]
struct SimulatedResult<'a> {
    beat: usize,
    #[serde(flatten)]
    event: &'a ResultEvent,
}

fn run_simulate(follow: bool, config: AppConfig) -> Result<ExitCode> {
    let ticks_per_beat = config.matching.ticks_per_quarter;
    let score = SimulatedScore::standard_tuning();
    let (mut service, handle, clock) =
        offline_service(config, SIM_SAMPLE_RATE, score.clone())?;
    service.set_follow_mode(follow);

    let hop = hop_size(SIM_SAMPLE_RATE);
    let hop_duration = Duration::from_secs_f64(hop as f64 / SIM_SAMPLE_RATE as f64);
    let beat_len = (SIM_SAMPLE_RATE as u64 * SIM_BEAT_MS / 1000) as usize;
    let hops_per_beat = beat_len.div_ceil(hop) as i64;
    let ticks_per_hop = ticks_per_beat / hops_per_beat.max(1);

    let print = |beat: usize, events: &[ResultEvent]| -> Result<()> {
        for event in events {
            println!(
                "{}",
                serde_json::to_string(&SimulatedResult { beat, event })?
            );
        }
        Ok(())
    };

    let mut id = 0u64;
    for (beat_index, beat) in riff().into_iter().enumerate() {
        let beat_start = beat_index as i64 * ticks_per_beat;
        score.set_position(beat_start);

        let notes: Vec<ScoreNote> = beat
            .notes
            .iter()
            .map(|&(string_index, fret)| {
                id += 1;
                score_note(id, string_index, fret, beat_start)
            })
            .collect();
        print(beat_index, &service.on_beat_changed(notes))?;

        let strum = synth::mix(
            &beat
                .played
                .iter()
                .map(|&(string_index, fret)| {
                    let frequency = fretted_frequency(string_index, fret);
                    synth::plucked(frequency, SIM_SAMPLE_RATE, beat_len, 0.3, 3.0)
                })
                .collect::<Vec<_>>(),
        );
        let audio = if strum.is_empty() {
            vec![0.0; beat_len]
        } else {
            strum
        };

        for chunk in audio.chunks(hop) {
            handle.push(chunk);
            clock.advance(hop_duration);
            if !follow {
                score.advance(ticks_per_hop);
            }
            if let Some(outcome) = service.tick() {
                print(beat_index, &outcome.events)?;
            }
        }
    }

    // Flush the last beat so its unplayed notes are judged
    let last_beat = riff().len();
    print(last_beat, &service.on_beat_changed(Vec::new()))?;

    service.stop().context("stopping practice service")?;
    println!("{}", serde_json::to_string_pretty(&service.summary())?);
    eprintln!("cursor moves requested: {}", score.set_count());
    service.dispose();
    Ok(ExitCode::from(0))
}

fn run_listen(seconds: u64, config: AppConfig) -> Result<ExitCode> {
    let mut service = PracticeService::new(config, Box::new(CpalBackend::new()))
        .context("invalid configuration")?;
    service.attach_score(Box::new(SimulatedScore::standard_tuning()));
    service.start().context("opening microphone")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tick runtime")?;

    runtime.block_on(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1) / TICK_HZ);
        let deadline = tokio::time::sleep(Duration::from_secs(seconds));
        tokio::pin!(deadline);
        let mut last_shown = String::new();

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
                _ = interval.tick() => {
                    let Some(outcome) = service.tick() else { break };
                    let shown = outcome
                        .analysis
                        .display
                        .iter()
                        .map(|n| format!("{} ({:+.0}c)", n.note, n.cents))
                        .collect::<Vec<_>>()
                        .join("  ");
                    if shown != last_shown {
                        println!("{:>7.1} dB  {}", service.input_level_db(), shown);
                        last_shown = shown;
                    }
                }
            }
        }
    });

    service.dispose();
    Ok(ExitCode::from(0))
}

fn run_devices() -> Result<ExitCode> {
    let devices = list_input_devices().context("enumerating input devices")?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for name in devices {
        println!("{name}");
    }
    Ok(ExitCode::from(0))
}
