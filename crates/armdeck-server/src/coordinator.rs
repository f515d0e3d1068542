//! [`Coordinator`] – single-flight owner of the streaming and behavior tasks.
//!
//! The coordinator holds the frame source and enforces the two concurrency
//! invariants of the demo server:
//!
//! * at most one streaming loop runs at any time (`start_streaming` is an
//!   idempotent no-op while one is active);
//! * at most one scripted behavior runs at any time (`start_behavior`
//!   cancels any predecessor before launching).
//!
//! Both task kinds carry a generation token: each start bumps a counter and
//! the loop re-checks its own generation before every broadcast, so a stale
//! loop can never emit an event after its successor (or a stop request) has
//! taken over, even if its cancellation has not landed yet.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use armdeck_hal::{FrameSource, encode_thumbnail};
use armdeck_types::{JointMap, Phase, ServerMessage};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::connection::ConnectionManager;

// ─────────────────────────────────────────────────────────────────────────────
// Behavior script
// ─────────────────────────────────────────────────────────────────────────────

/// Step counts and inter-step delays of the scripted search-and-grasp
/// behavior. The phase structure is fixed; no sensor-driven termination
/// condition is evaluated.
#[derive(Debug, Clone)]
pub struct BehaviorScript {
    pub search_steps: u32,
    pub search_step_delay: Duration,
    pub grasp_steps: u32,
    pub grasp_step_delay: Duration,
}

impl Default for BehaviorScript {
    fn default() -> Self {
        Self {
            search_steps: 10,
            search_step_delay: Duration::from_millis(200),
            grasp_steps: 5,
            grasp_step_delay: Duration::from_millis(300),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the frame source and the two background task kinds.
pub struct Coordinator {
    manager: Arc<ConnectionManager>,
    source: Mutex<Box<dyn FrameSource>>,
    /// Streaming period (`1 / fps`).
    period: Duration,
    script: BehaviorScript,
    /// Single source of truth for whether the stream loop should continue.
    streaming: AtomicBool,
    stream_generation: AtomicU64,
    stream_task: Mutex<Option<JoinHandle<()>>>,
    behavior_generation: AtomicU64,
    behavior_task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(
        manager: Arc<ConnectionManager>,
        source: Box<dyn FrameSource>,
        fps: u32,
        script: BehaviorScript,
    ) -> Arc<Self> {
        let fps = fps.max(1);
        Arc::new(Self {
            manager,
            source: Mutex::new(source),
            period: Duration::from_secs_f64(1.0 / f64::from(fps)),
            script,
            streaming: AtomicBool::new(false),
            stream_generation: AtomicU64::new(0),
            stream_task: Mutex::new(None),
            behavior_generation: AtomicU64::new(0),
            behavior_task: Mutex::new(None),
        })
    }

    /// `true` while a streaming loop is active.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Streaming
    // -------------------------------------------------------------------------

    /// Launch the streaming loop unless one is already active.
    ///
    /// Returns `true` when a new loop was started, `false` when the call was
    /// an idempotent no-op.
    pub async fn start_streaming(self: &Arc<Self>) -> bool {
        if self.streaming.swap(true, Ordering::SeqCst) {
            return false;
        }
        let generation = self.stream_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.stream_loop(generation).await });
        *self.stream_task.lock().await = Some(handle);
        true
    }

    /// Ask the streaming loop to stop. Cancellation is requested, never
    /// awaited; the loop observes it at its next suspension point and the
    /// generation bump guarantees no further frames are broadcast.
    pub async fn stop_streaming(&self) {
        self.streaming.store(false, Ordering::SeqCst);
        self.stream_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.stream_task.lock().await.take() {
            handle.abort();
        }
    }

    fn stream_is_current(&self, generation: u64) -> bool {
        self.streaming.load(Ordering::SeqCst)
            && self.stream_generation.load(Ordering::SeqCst) == generation
    }

    async fn stream_loop(self: Arc<Self>, generation: u64) {
        info!("camera stream loop started");
        // Connect lazily so server startup does not block on an offline arm.
        {
            let mut source = self.source.lock().await;
            if !source.is_connected()
                && let Err(e) = source.connect()
            {
                error!(error = %e, "failed to connect frame source for streaming");
                self.streaming.store(false, Ordering::SeqCst);
                return;
            }
        }

        while self.stream_is_current(generation) {
            let observation = self.source.lock().await.get_observation();
            match observation {
                Ok((frame, joints)) => match encode_thumbnail(&frame) {
                    Ok(image_b64) => {
                        if !self.stream_is_current(generation) {
                            break;
                        }
                        self.manager
                            .broadcast(ServerMessage::Frame {
                                shape: frame.shape(),
                                image_b64,
                                joints,
                            })
                            .await;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to encode frame thumbnail");
                    }
                },
                Err(e) => {
                    // Silent termination: clients simply stop receiving frames.
                    error!(error = %e, "observation fetch failed; stopping stream");
                    self.streaming.store(false, Ordering::SeqCst);
                    break;
                }
            }
            tokio::time::sleep(self.period).await;
        }
        info!("camera stream loop stopped");
    }

    // -------------------------------------------------------------------------
    // Scripted behavior
    // -------------------------------------------------------------------------

    /// Start the scripted search-and-grasp behavior for `object_name`,
    /// cancelling any behavior that is still running. Exactly one behavior
    /// executes at a time.
    pub async fn start_behavior(self: &Arc<Self>, object_name: String) {
        let generation = self.behavior_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut guard = self.behavior_task.lock().await;
        if let Some(handle) = guard.take()
            && !handle.is_finished()
        {
            handle.abort();
        }
        let this = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            this.behavior_loop(generation, object_name).await;
        }));
    }

    fn behavior_is_current(&self, generation: u64) -> bool {
        self.behavior_generation.load(Ordering::SeqCst) == generation
    }

    async fn behavior_loop(self: Arc<Self>, generation: u64, object_name: String) {
        // The behavior reads observations, so it needs the source connected
        // even when streaming never started.
        {
            let mut source = self.source.lock().await;
            if !source.is_connected()
                && let Err(e) = source.connect()
            {
                error!(error = %e, "failed to connect frame source for behavior");
                self.manager
                    .broadcast(ServerMessage::Status {
                        phase: Phase::Error,
                        text: None,
                        detail: Some("observation_failed".to_string()),
                    })
                    .await;
                return;
            }
        }

        self.manager
            .broadcast(ServerMessage::phase(Phase::Searching))
            .await;
        self.manager
            .broadcast(ServerMessage::reasoning(format!(
                "Starting search for '{object_name}' using mock policy."
            )))
            .await;

        // Search phase: run a fixed number of steps, then "find" the object.
        for step in 0..self.script.search_steps {
            if !self.behavior_is_current(generation) {
                return;
            }
            let observation = self.source.lock().await.get_observation();
            let joints = match observation {
                Ok((_, joints)) => joints,
                Err(e) => {
                    error!(error = %e, "observation fetch failed during search");
                    self.manager
                        .broadcast(ServerMessage::Status {
                            phase: Phase::Error,
                            text: None,
                            detail: Some("observation_failed".to_string()),
                        })
                        .await;
                    return;
                }
            };

            // Fake joint-space scanning pattern.
            let mut targets = JointMap::new();
            for (idx, (name, value)) in joints.iter().enumerate() {
                let delta = 0.1 * (f64::from(step) / 3.0 + idx as f64).sin();
                targets.insert(name.clone(), value + delta);
            }
            if let Err(e) = self.source.lock().await.send_joint_targets(&targets) {
                error!(error = %e, "failed to send scan targets");
            }

            if !self.behavior_is_current(generation) {
                return;
            }
            self.manager
                .broadcast(ServerMessage::reasoning(format!(
                    "[search step {step}] Panning camera to look for the object..."
                )))
                .await;
            tokio::time::sleep(self.script.search_step_delay).await;
        }

        if !self.behavior_is_current(generation) {
            return;
        }
        self.manager
            .broadcast(ServerMessage::reasoning(format!(
                "Object '{object_name}' appears to be visible. Switching to grasp phase."
            )))
            .await;
        self.manager
            .broadcast(ServerMessage::phase(Phase::Grasping))
            .await;

        // Grasp phase: simple scripted sequence.
        for step in 0..self.script.grasp_steps {
            if !self.behavior_is_current(generation) {
                return;
            }
            self.manager
                .broadcast(ServerMessage::reasoning(format!(
                    "[grasp step {step}] Moving end-effector to grasp the object..."
                )))
                .await;
            tokio::time::sleep(self.script.grasp_step_delay).await;
        }

        if !self.behavior_is_current(generation) {
            return;
        }
        self.manager
            .broadcast(ServerMessage::reasoning(format!(
                "Grasp completed in mock mode for '{object_name}'."
            )))
            .await;
        self.manager.broadcast(ServerMessage::phase(Phase::Done)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armdeck_hal::MockArm;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn fast_script() -> BehaviorScript {
        BehaviorScript {
            search_steps: 3,
            search_step_delay: Duration::from_millis(10),
            grasp_steps: 2,
            grasp_step_delay: Duration::from_millis(10),
        }
    }

    async fn setup(
        fps: u32,
        script: BehaviorScript,
    ) -> (
        Arc<ConnectionManager>,
        Arc<Coordinator>,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let manager = Arc::new(ConnectionManager::new());
        let (tx, rx) = mpsc::unbounded_channel();
        manager.register(Uuid::new_v4(), tx).await;
        let coordinator = Coordinator::new(
            Arc::clone(&manager),
            Box::new(MockArm::new()),
            fps,
            script,
        );
        (manager, coordinator, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    // ── Streaming ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_streaming_is_idempotent() {
        let (_m, coordinator, _rx) = setup(100, fast_script()).await;
        assert!(coordinator.start_streaming().await);
        assert!(!coordinator.start_streaming().await);
        assert!(coordinator.is_streaming());
        coordinator.stop_streaming().await;
        assert!(!coordinator.is_streaming());
    }

    #[tokio::test]
    async fn streaming_broadcasts_frames() {
        let (_m, coordinator, mut rx) = setup(100, fast_script()).await;
        coordinator.start_streaming().await;

        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("frame within deadline")
            .expect("channel open");
        match frame {
            ServerMessage::Frame {
                shape,
                image_b64,
                joints,
            } => {
                assert_eq!(shape, [480, 640, 3]);
                assert!(!image_b64.is_empty());
                assert!(joints.contains_key("joint_0"));
            }
            other => panic!("expected frame, got {other:?}"),
        }
        coordinator.stop_streaming().await;
    }

    #[tokio::test]
    async fn stop_streaming_silences_frames() {
        let (_m, coordinator, mut rx) = setup(100, fast_script()).await;
        coordinator.start_streaming().await;

        // Let a few frames through.
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("frame within deadline");
        coordinator.stop_streaming().await;

        // Discard anything already in flight, then verify silence.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drain(&mut rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(drain(&mut rx).is_empty(), "no frames after stop");
    }

    #[tokio::test]
    async fn restart_yields_exactly_one_fresh_loop() {
        let (_m, coordinator, mut rx) = setup(100, fast_script()).await;
        coordinator.start_streaming().await;
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("first loop produced a frame");

        coordinator.stop_streaming().await;
        assert!(coordinator.start_streaming().await, "restart starts one loop");
        assert!(
            !coordinator.start_streaming().await,
            "second start while active is a no-op"
        );

        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("fresh loop produces frames")
            .expect("channel open");
        assert!(matches!(frame, ServerMessage::Frame { .. }));
        coordinator.stop_streaming().await;
    }

    #[tokio::test]
    async fn connect_failure_resets_streaming_flag() {
        use armdeck_types::ArmError;

        struct BrokenSource;
        impl FrameSource for BrokenSource {
            fn id(&self) -> &str {
                "broken"
            }
            fn connect(&mut self) -> Result<(), ArmError> {
                Err(ArmError::Hardware {
                    component: "camera".to_string(),
                    details: "unreachable".to_string(),
                })
            }
            fn disconnect(&mut self) -> Result<(), ArmError> {
                Ok(())
            }
            fn is_connected(&self) -> bool {
                false
            }
            fn get_observation(
                &mut self,
            ) -> Result<(armdeck_hal::ArmImage, JointMap), ArmError> {
                Err(ArmError::NotConnected)
            }
            fn send_joint_targets(&mut self, _targets: &JointMap) -> Result<(), ArmError> {
                Err(ArmError::NotConnected)
            }
        }

        let manager = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.register(Uuid::new_v4(), tx).await;
        let coordinator =
            Coordinator::new(Arc::clone(&manager), Box::new(BrokenSource), 100, fast_script());

        coordinator.start_streaming().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Failure collapses back to idle without broadcasting anything.
        assert!(!coordinator.is_streaming());
        assert!(drain(&mut rx).is_empty());

        // And the coordinator accepts a fresh start afterwards.
        assert!(coordinator.start_streaming().await);
    }

    // ── Behavior ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn behavior_runs_phases_in_order() {
        let (_m, coordinator, mut rx) = setup(15, fast_script()).await;
        coordinator.start_behavior("ball".to_string()).await;

        let mut phases = Vec::new();
        let mut reasoning_between: Vec<usize> = vec![0];
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let msg = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("behavior finishes within deadline")
                .expect("channel open");
            match msg {
                ServerMessage::Status { phase, .. } => {
                    phases.push(phase);
                    reasoning_between.push(0);
                    if phase == Phase::Done {
                        break;
                    }
                }
                ServerMessage::Reasoning { .. } => {
                    *reasoning_between.last_mut().unwrap() += 1;
                }
                other => panic!("unexpected message: {other:?}"),
            }
        }

        assert_eq!(phases, vec![Phase::Searching, Phase::Grasping, Phase::Done]);
        // Intro + 3 search steps + "switching" line before grasping.
        assert_eq!(reasoning_between[1], 5);
        // 2 grasp steps + completion line before done.
        assert_eq!(reasoning_between[2], 3);
    }

    #[tokio::test]
    async fn second_behavior_cancels_the_first() {
        let script = BehaviorScript {
            search_steps: 50,
            search_step_delay: Duration::from_millis(50),
            grasp_steps: 2,
            grasp_step_delay: Duration::from_millis(10),
        };
        let (_m, coordinator, mut rx) = setup(15, script).await;

        coordinator.start_behavior("apple".to_string()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        coordinator.start_behavior("banana".to_string()).await;

        // Collect until the second behavior announces itself, then a bit more.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let messages = drain(&mut rx);

        let second_searching = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| {
                matches!(
                    m,
                    ServerMessage::Status {
                        phase: Phase::Searching,
                        ..
                    }
                )
            })
            .map(|(i, _)| i)
            .nth(1)
            .expect("second behavior emitted its searching status");

        // Nothing from the first invocation appears after the takeover.
        for msg in &messages[second_searching..] {
            if let ServerMessage::Reasoning { thought } = msg {
                assert!(
                    !thought.contains("'apple'"),
                    "stale reasoning after replacement: {thought}"
                );
            }
        }
    }

    #[tokio::test]
    async fn observation_failure_mid_search_aborts_before_grasping() {
        use armdeck_types::ArmError;

        // Fails after a couple of successful observations.
        struct FlakySource {
            arm: MockArm,
            remaining: u32,
        }
        impl FrameSource for FlakySource {
            fn id(&self) -> &str {
                "flaky"
            }
            fn connect(&mut self) -> Result<(), ArmError> {
                self.arm.connect()
            }
            fn disconnect(&mut self) -> Result<(), ArmError> {
                self.arm.disconnect()
            }
            fn is_connected(&self) -> bool {
                self.arm.is_connected()
            }
            fn get_observation(
                &mut self,
            ) -> Result<(armdeck_hal::ArmImage, JointMap), ArmError> {
                if self.remaining == 0 {
                    return Err(ArmError::Hardware {
                        component: "camera".to_string(),
                        details: "frame grab timeout".to_string(),
                    });
                }
                self.remaining -= 1;
                self.arm.get_observation()
            }
            fn send_joint_targets(&mut self, targets: &JointMap) -> Result<(), ArmError> {
                self.arm.send_joint_targets(targets)
            }
        }

        let manager = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.register(Uuid::new_v4(), tx).await;
        let coordinator = Coordinator::new(
            Arc::clone(&manager),
            Box::new(FlakySource {
                arm: MockArm::new(),
                remaining: 2,
            }),
            15,
            fast_script(),
        );

        coordinator.start_behavior("ball".to_string()).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let messages = drain(&mut rx);
        let phases: Vec<Phase> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Status { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![Phase::Searching, Phase::Error]);

        let error_detail = messages.iter().any(|m| {
            matches!(
                m,
                ServerMessage::Status {
                    detail: Some(d),
                    ..
                } if d == "observation_failed"
            )
        });
        assert!(error_detail, "error status carries observation_failed detail");
    }
}
