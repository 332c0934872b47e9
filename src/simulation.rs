use std::{
    sync::{
        mpsc::{channel, Receiver, SendError, Sender, TryRecvError},
        Arc,
    },
    thread::JoinHandle,
};

use rand_pcg::Pcg32;

use crate::{
    config::SimulationSettings,
    error::{Result, SonoError},
    expect, gather,
    response::{self, ImpulseResponse},
    scene::{self, Object, Room},
    sono_debug, sono_error, sono_trace, tracer, volume,
};

/// Everything a completed run hands back to the host, by value.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    pub impulse_response: ImpulseResponse,
    pub room_volume_m3: f32,
    pub min_order: u32,
    pub max_order: u32,
    pub rays_traced: usize,
}

/// Host-visible updates of a run. `NothingToDo`, `Failed`, `Cancelled` and
/// `Finished` are terminal.
#[derive(Debug)]
pub enum SimulationStatus {
    /// Monotone per-stage completion fraction
    Progress { stage: &'static str, fraction: f32 },
    /// Human-readable stage transition
    Status(String),
    NothingToDo(SonoError),
    Failed(SonoError),
    Cancelled,
    Finished(SimulationResult),
}

impl SimulationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. } | Self::Status(_))
    }
}

struct Message {
    run_id: usize,
    status: SimulationStatus,
}

struct Payload {
    run_id: usize,
    room: Arc<Room>,
    objects: Vec<Object>,
    settings: SimulationSettings,
}

struct Worker {
    tx: Sender<Option<Payload>>,
    rx: Receiver<Message>,
    handle: JoinHandle<()>,
}

/// Runs the trace -> volume -> gather -> synthesize pipeline on a background
/// thread. The host launches runs and polls for status; launching again
/// while a run is active cancels it in favor of the new one.
pub struct Simulation {
    worker: Option<Worker>,
    run_in_progress: bool,
    run_id: usize,
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            worker: None,
            run_in_progress: false,
            run_id: 0,
        }
    }

    /// Checks if a run is active.
    pub fn is_active(&self) -> bool {
        self.run_in_progress
    }

    /// Launch a new run, overriding the previous one if one is still active.
    pub fn launch(&mut self, room: Arc<Room>, objects: Vec<Object>, settings: SimulationSettings) {
        self.run_id += 1;

        if self.worker.is_none() {
            let (tx, worker_rx) = channel();
            let (worker_tx, rx) = channel();
            let handle = launch_worker(worker_tx, worker_rx);
            self.worker = Some(Worker { tx, rx, handle });
        }
        let worker = self.worker.as_ref().unwrap();

        sono_debug!("launch: sending payload for run {}", self.run_id);
        match worker.tx.send(Some(Payload {
            run_id: self.run_id,
            room,
            objects,
            settings,
        })) {
            Ok(()) => {
                self.run_in_progress = true;
            }
            Err(SendError(_)) => {
                panic!("launch: simulation worker has been terminated");
            }
        }
    }

    /// Drains pending status updates of the current run. Stale updates from
    /// an overridden run are dropped.
    pub fn check_status(&mut self) -> Vec<SimulationStatus> {
        let mut updates = Vec::new();
        let Some(worker) = &self.worker else {
            return updates;
        };

        loop {
            match worker.rx.try_recv() {
                Ok(Message { run_id, status }) => {
                    if run_id != self.run_id {
                        sono_trace!("check_status: dropping update of stale run {}", run_id);
                        continue;
                    }
                    if status.is_terminal() {
                        self.run_in_progress = false;
                    }
                    updates.push(status);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    panic!("check_status: simulation worker has been terminated");
                }
            }
        }

        updates
    }

    /// Stops the worker thread, cancelling any active run.
    pub fn kill(&mut self) {
        if let Some(Worker { tx, handle, .. }) = self.worker.take() {
            // The worker having already disconnected is fine, that's our goal
            drop(tx.send(None));
            drop(handle.join());
            self.run_in_progress = false;
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.kill();
    }
}

fn launch_worker(
    to_parent: Sender<Message>,
    from_parent: Receiver<Option<Payload>>,
) -> JoinHandle<()> {
    let handle = std::thread::Builder::new()
        .name("SonoSimulation".into())
        .spawn(move || {
            sono_debug!("simulation worker: begin");

            'thread: loop {
                // Blocking recv while idle
                let mut next = match from_parent.recv() {
                    Ok(payload) => payload,
                    Err(_) => break 'thread,
                };

                'work: loop {
                    let Some(payload) = next.take() else {
                        break 'thread;
                    };
                    let run_id = payload.run_id;
                    sono_debug!("simulation worker: starting run {}", run_id);

                    // A newer payload or a kill interrupts the current run;
                    // it is picked up here between iterations of every stage
                    let mut interrupt: Option<Option<Payload>> = None;
                    let mut should_exit = || match from_parent.try_recv() {
                        Ok(message) => {
                            interrupt = Some(message);
                            true
                        }
                        Err(TryRecvError::Empty) => false,
                        Err(TryRecvError::Disconnected) => {
                            interrupt = Some(None);
                            true
                        }
                    };

                    let mut emit = |status: SimulationStatus| {
                        if let Err(why) = to_parent.send(Message { run_id, status }) {
                            sono_error!("simulation worker: error sending update: {}", why);
                        }
                    };

                    let outcome = run_pipeline(&payload, &mut should_exit, &mut emit);
                    let status = match outcome {
                        Ok(result) => SimulationStatus::Finished(result),
                        Err(SonoError::Cancelled) => SimulationStatus::Cancelled,
                        Err(err) if err.is_nothing_to_do() => SimulationStatus::NothingToDo(err),
                        Err(err) => SimulationStatus::Failed(err),
                    };
                    emit(status);

                    match interrupt {
                        Some(message) => {
                            // Continue straight into the newer payload
                            next = message;
                        }
                        None => break 'work,
                    }
                }
            }

            sono_debug!("simulation worker: end");
        });
    expect!(handle, "Failed to spawn SonoSimulation worker")
}

/// Reports stage progress to the parent only on meaningful increments so
/// tight loops don't flood the channel.
struct ProgressThrottle {
    last: f32,
}

impl ProgressThrottle {
    fn new() -> Self {
        Self { last: -1.0 }
    }

    fn ready(&mut self, fraction: f32) -> bool {
        if fraction >= 1.0 || fraction - self.last >= 0.01 {
            self.last = fraction;
            true
        } else {
            false
        }
    }
}

fn run_pipeline(
    payload: &Payload,
    should_exit: &mut dyn FnMut() -> bool,
    emit: &mut dyn FnMut(SimulationStatus),
) -> Result<SimulationResult> {
    let Payload {
        room,
        objects,
        settings,
        ..
    } = payload;

    if room.is_empty() {
        return Err(SonoError::EmptyRoom);
    }
    let microphone = scene::active_microphone(objects).ok_or(SonoError::NoActiveMicrophone)?;
    emit(SimulationStatus::Status(format!(
        "Using {} for IR generation",
        microphone.name
    )));

    let speakers = scene::active_speakers(objects);
    if speakers.is_empty() {
        return Err(SonoError::NoActiveSpeakers);
    }
    let microphones = scene::active_microphones(objects);

    let mut rng = Pcg32::new(settings.seed, 0);

    emit(SimulationStatus::Status("Casting rays...".into()));
    let mut throttle = ProgressThrottle::new();
    let trace = tracer::trace_scene(
        room,
        &speakers,
        settings.rays_per_source,
        &mut rng,
        should_exit,
        &mut |fraction| {
            if throttle.ready(fraction) {
                emit(SimulationStatus::Progress {
                    stage: "trace",
                    fraction,
                });
            }
        },
    )?;

    let coarse_volume = volume::bounding_box_volume(&trace.secondary_sources);
    emit(SimulationStatus::Status(format!(
        "Estimated room size: {} cubic meters",
        coarse_volume
    )));
    let room_volume_m3 = match settings.volume_quality.cube_size_cm() {
        None => coarse_volume,
        Some(cube_size_cm) => {
            let refined = volume::flood_volume(room, cube_size_cm, should_exit)?;
            emit(SimulationStatus::Status(format!(
                "More accurate estimated room size: {} cubic meters",
                refined
            )));
            refined
        }
    };

    emit(SimulationStatus::Status(
        "Gathering energy contributions...".into(),
    ));
    let mut throttle = ProgressThrottle::new();
    let gathered = gather::gather(
        room,
        &trace.secondary_sources,
        &microphones,
        settings.clamp_lambert_cosine,
        should_exit,
        &mut |fraction| {
            if throttle.ready(fraction) {
                emit(SimulationStatus::Progress {
                    stage: "gather",
                    fraction,
                });
            }
        },
    )?;

    let histogram = gathered
        .histograms
        .get(&microphone.name)
        .filter(|histogram| !histogram.is_empty())
        .ok_or_else(|| SonoError::EmptyHistogram {
            receiver: microphone.name.clone(),
        })?;

    emit(SimulationStatus::Status(
        "Generating impulse response...".into(),
    ));
    let mut throttle = ProgressThrottle::new();
    let impulse_response = response::synthesize(
        &microphone.name,
        histogram,
        room_volume_m3,
        settings,
        &mut rng,
        should_exit,
        &mut |fraction| {
            if throttle.ready(fraction) {
                emit(SimulationStatus::Progress {
                    stage: "synthesize",
                    fraction,
                });
            }
        },
    )?;

    Ok(SimulationResult {
        impulse_response,
        room_volume_m3,
        min_order: trace.min_order,
        max_order: trace.max_order,
        rays_traced: trace.rays_traced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bands::Band6Coefficients,
        config::{ChannelLayout, ExcitationMode, VolumeQuality},
        math::Vec3,
        scene::{MaterialProperties, ObjectKind},
    };
    use std::time::{Duration, Instant};

    fn test_room() -> Arc<Room> {
        Arc::new(Room::rectangular(
            Vec3::new(-5.0, -4.0, 0.0),
            Vec3::new(8.0, 4.0, 6.0),
            MaterialProperties {
                absorption: Band6Coefficients::splat(0.3),
                roughness: 0.5,
            },
        ))
    }

    fn test_objects() -> Vec<Object> {
        vec![
            Object {
                name: "Mic1".into(),
                kind: ObjectKind::Microphone,
                active: true,
                position: Vec3::new(2.5, 3.5, 2.0),
            },
            Object {
                name: "Spk1".into(),
                kind: ObjectKind::Speaker,
                active: true,
                position: Vec3::new(7.0, -1.0, 3.0),
            },
        ]
    }

    fn test_settings() -> SimulationSettings {
        SimulationSettings {
            rays_per_source: 50,
            volume_quality: VolumeQuality::Off,
            sample_rate: 8_000.0,
            channels: ChannelLayout::Mono,
            excitation: ExcitationMode::DiracSequence,
            clamp_lambert_cosine: false,
            seed: 7,
        }
    }

    fn wait_for_terminal(simulation: &mut Simulation) -> SimulationStatus {
        let deadline = Instant::now() + Duration::from_secs(60);
        loop {
            for status in simulation.check_status() {
                if status.is_terminal() {
                    return status;
                }
            }
            assert!(Instant::now() < deadline, "run did not finish in time");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn full_run_finishes() {
        let mut simulation = Simulation::new();
        simulation.launch(test_room(), test_objects(), test_settings());
        assert!(simulation.is_active());

        match wait_for_terminal(&mut simulation) {
            SimulationStatus::Finished(result) => {
                assert!(result.impulse_response.num_samples() > 0);
                assert!(result.room_volume_m3 > 0.0);
                assert!(result.max_order >= result.min_order);
                assert_eq!(result.rays_traced, 50);
            }
            other => panic!("expected Finished, got {:?}", other),
        }
        assert!(!simulation.is_active());
    }

    #[test]
    fn missing_microphone_is_nothing_to_do() {
        let objects: Vec<Object> = test_objects()
            .into_iter()
            .filter(|object| object.kind != ObjectKind::Microphone)
            .collect();

        let mut simulation = Simulation::new();
        simulation.launch(test_room(), objects, test_settings());

        match wait_for_terminal(&mut simulation) {
            SimulationStatus::NothingToDo(SonoError::NoActiveMicrophone) => (),
            other => panic!("expected NothingToDo, got {:?}", other),
        }
    }

    #[test]
    fn relaunch_supersedes_active_run() {
        let mut simulation = Simulation::new();
        let slow = SimulationSettings {
            rays_per_source: 5_000,
            ..test_settings()
        };
        simulation.launch(test_room(), test_objects(), slow);
        simulation.launch(test_room(), test_objects(), test_settings());

        // Only the second run may report a terminal status
        match wait_for_terminal(&mut simulation) {
            SimulationStatus::Finished(result) => {
                assert_eq!(result.rays_traced, 50);
            }
            other => panic!("expected Finished, got {:?}", other),
        }
    }

    #[test]
    fn kill_stops_the_worker() {
        let mut simulation = Simulation::new();
        simulation.launch(test_room(), test_objects(), test_settings());
        simulation.kill();
        assert!(!simulation.is_active());
    }
}
