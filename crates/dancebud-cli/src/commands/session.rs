use std::rc::Rc;
use std::time::Duration;

use clap::Subcommand;
use dancebud_core::motion::{ChannelMotionDevice, FallbackGenerator, UnavailableMotionDevice};
use dancebud_core::{
    Clock, Config, Database, Event, MotionTracker, PoseTracker, SessionEngine, SystemClock, TempoEstimator,
};
use tracing::info;

use super::simulated::{Bouncer, SimulatedCamera, SwayingDancer, SyntheticAudio};

/// Host-side poll cadence, matching the pose detection interval.
const POLL_MS: u64 = 33;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a session against simulated sensors and save it
    Demo {
        /// Routine name (defaults to the selected routine)
        #[arg(long)]
        routine: Option<String>,
        /// Session length in seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        /// Seed for the simulated sensors
        #[arg(long)]
        seed: Option<u64>,
        /// Simulate a host without an accelerometer
        #[arg(long)]
        no_motion: bool,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Demo {
            routine,
            seconds,
            seed,
            no_motion,
        } => demo(routine, seconds, seed, no_motion),
    }
}

fn offset(seed: Option<u64>, by: u64) -> Option<u64> {
    seed.map(|s| s.wrapping_add(by))
}

fn print_event(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn demo(
    routine: Option<String>,
    seconds: u64,
    seed: Option<u64>,
    no_motion: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let db = Rc::new(Database::open()?);
    let clock = Rc::new(SystemClock);

    let routine = match routine {
        Some(name) => {
            db.set_selected_routine(&name)?;
            name
        }
        None => db.selected_routine(),
    };

    let generator = seed.map(FallbackGenerator::seeded).unwrap_or_else(FallbackGenerator::from_entropy);
    let (motion, mut bouncer) = if no_motion {
        let tracker = MotionTracker::new(Box::new(UnavailableMotionDevice), config.motion.clone(), generator);
        (tracker, None)
    } else {
        let (device, feed) = ChannelMotionDevice::new();
        let tracker = MotionTracker::new(Box::new(device), config.motion.clone(), generator);
        (tracker, Some(Bouncer::new(feed, offset(seed, 1))))
    };

    let pose = PoseTracker::with_config(
        Box::new(SimulatedCamera::default()),
        Box::new(SwayingDancer::new(offset(seed, 2))),
        &config.pose,
    );
    let tempo = TempoEstimator::new(Box::new(SyntheticAudio::new(offset(seed, 3))), config.audio.clone());

    let mut engine = SessionEngine::new(clock.clone(), db.clone())
        .with_config(&config.session)
        .with_sensor(Box::new(pose))
        .with_sensor(Box::new(tempo))
        .with_sensor(Box::new(motion));

    info!(routine = %routine, seconds, "starting demo session");
    let started = engine.start(&routine).ok_or("session could not be started")?;
    print_event(&started)?;
    if let Some(report) = engine.permission_report() {
        db.save_permission_status(report)?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
    runtime.block_on(async {
        let mut interval = tokio::time::interval(Duration::from_millis(POLL_MS));
        loop {
            interval.tick().await;
            if let Some(bouncer) = bouncer.as_mut() {
                bouncer.tick(clock.now_ms());
            }
            if let Some(event) = engine.poll() {
                print_event(&event)?;
            }
            if engine.elapsed_seconds() >= seconds {
                break;
            }
        }
        Ok::<(), serde_json::Error>(())
    })?;

    let summary = engine.end().ok_or("session was not active")?;
    info!(score = summary.posture_score, steps = summary.steps, "demo session saved");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
