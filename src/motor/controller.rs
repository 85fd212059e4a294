use super::debounce::{DebounceOutcome, Debouncer};
use super::dialog::{Dialog, DialogAction, DialogKind, DialogSlot};
use super::proximity::{PendingIntent, ProximityGate};
use super::recovery::{Direction, JamTracker};
use super::scheduler::{decide, BusyFlag, Decision, MotorRequest, RequestPriority, RequestQueue};
use super::throttle::FrequencyThrottle;
use super::CameraState;
use crate::config::{MotorConfig, PopupCamConfig, ThrottleConfig};
use crate::error::{ActuatorError, EventBusError};
use crate::events::{EventBus, EventFilter, EventReceiver, PopupCamEvent, CONTROLLER_INPUTS};
use crate::hal::{ActuatorStatus, MotorCommand, Peripherals};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tracing::{debug, error, info, warn};

/// Timers owned by the controller loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    Debounce { target: CameraState, generation: u64 },
    BusyPoll,
    BusyRelease { generation: u64 },
    IndicatorOff,
}

enum LoopInput {
    Timer(TimerEvent),
    DialogClosed(DialogKind, DialogAction),
    Event(Result<PopupCamEvent, EventBusError>),
}

/// Single owner of all actuation state.
///
/// Every camera signal, sensor reading, motor notification and timer is
/// handled one at a time on the controller task, so no handler ever races
/// another over the busy flag, counters or pending intents.
pub struct MotorController {
    pub(crate) motor_config: MotorConfig,
    pub(crate) throttle_config: ThrottleConfig,
    pub(crate) peripherals: Peripherals,
    pub(crate) event_bus: Arc<EventBus>,
    timers: DelayQueue<TimerEvent>,
    pub(crate) debouncer: Debouncer,
    pub(crate) busy: BusyFlag,
    pub(crate) requests: RequestQueue,
    poll_armed: bool,
    pub(crate) jams: JamTracker,
    pub(crate) proximity: ProximityGate,
    pub(crate) throttle: FrequencyThrottle,
    pub(crate) dialogs: DialogSlot,
    dialog_results: mpsc::UnboundedSender<(DialogKind, DialogAction)>,
    dialog_results_rx: Option<mpsc::UnboundedReceiver<(DialogKind, DialogAction)>>,
    pub(crate) last_target: Option<CameraState>,
    pub(crate) free_fall_armed: bool,
    next_cookie: u32,
}

impl MotorController {
    pub fn new(config: &PopupCamConfig, peripherals: Peripherals, event_bus: Arc<EventBus>) -> Self {
        let (dialog_results, dialog_results_rx) = mpsc::unbounded_channel();
        Self {
            motor_config: config.motor.clone(),
            throttle_config: config.throttle.clone(),
            peripherals,
            event_bus,
            timers: DelayQueue::new(),
            debouncer: Debouncer::new(config.camera.front_camera_id.clone(), config.motor.debounce()),
            busy: BusyFlag::default(),
            requests: RequestQueue::default(),
            poll_armed: false,
            jams: JamTracker::new(
                config.motor.max_popup_retries,
                config.motor.max_takeback_retries,
            ),
            proximity: ProximityGate::new(),
            throttle: FrequencyThrottle::new(
                config.throttle.frequent_trigger_count,
                config.throttle.frequent_window(),
            ),
            dialogs: DialogSlot::new(),
            dialog_results,
            dialog_results_rx: Some(dialog_results_rx),
            last_target: None,
            free_fall_armed: false,
            next_cookie: 0,
        }
    }

    /// Subscribe to the bus and run the controller loop until `cancel` fires
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        let receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(CONTROLLER_INPUTS.to_vec()),
            "motor_controller".to_string(),
        );
        tokio::spawn(self.run(receiver, cancel))
    }

    async fn run(mut self, mut receiver: EventReceiver, cancel: CancellationToken) {
        let Some(mut dialog_results) = self.dialog_results_rx.take() else {
            error!("Motor controller started twice");
            return;
        };
        info!("Motor controller started");
        self.peripherals.sensors.set_proximity_enabled(true);
        self.reconcile_startup().await;

        loop {
            let input = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(expired) = std::future::poll_fn(|cx| self.timers.poll_expired(cx)) => {
                    LoopInput::Timer(expired.into_inner())
                }
                Some((kind, action)) = dialog_results.recv() => LoopInput::DialogClosed(kind, action),
                received = receiver.recv() => LoopInput::Event(received),
            };

            match input {
                LoopInput::Timer(timer) => self.handle_timer(timer).await,
                LoopInput::DialogClosed(kind, action) => self.dialog_closed(kind, action).await,
                LoopInput::Event(Ok(event)) => self.handle_event(event).await,
                LoopInput::Event(Err(EventBusError::ChannelClosed)) => {
                    warn!("Event bus closed, stopping motor controller");
                    break;
                }
                LoopInput::Event(Err(e)) => {
                    warn!("Motor controller missed events: {}", e);
                    self.resync_status().await;
                }
            }
        }

        self.peripherals.sensors.set_proximity_enabled(false);
        self.set_free_fall_listener(false);
        info!("Motor controller stopped");
    }

    /// Retract a camera the previous session left out or jammed
    async fn reconcile_startup(&mut self) {
        let Some(actuator) = self.peripherals.actuator.clone() else {
            error!("Motor service not available, popup camera disabled");
            return;
        };
        match actuator.status().await {
            Ok(
                status @ (ActuatorStatus::PoppedOut
                | ActuatorStatus::PoppedJammed
                | ActuatorStatus::RetractedJammed),
            ) => {
                info!("Motor left in {:?}, retracting", status);
                self.request_state(MotorRequest::new(CameraState::Closed, Instant::now()))
                    .await;
            }
            Ok(status) => debug!("Motor status at startup: {:?}", status),
            Err(e) => log_driver_error("read motor status at startup", &e),
        }
    }

    /// Re-read the motor after missed notifications so a lost jam or
    /// calibration result is still acted on
    async fn resync_status(&mut self) {
        let Some(actuator) = self.peripherals.actuator.clone() else {
            return;
        };
        match actuator.status().await {
            Ok(
                status @ (ActuatorStatus::PoppedJammed
                | ActuatorStatus::RetractedJammed),
            ) => self.handle_status(status, 0).await,
            Ok(status @ (ActuatorStatus::CalibrationOk | ActuatorStatus::CalibrationError))
                if self.jams.is_calibrating() =>
            {
                self.handle_status(status, 0).await
            }
            Ok(status) => debug!("Motor status after missed events: {:?}", status),
            Err(e) => log_driver_error("read motor status after missed events", &e),
        }
    }

    pub(crate) async fn handle_event(&mut self, event: PopupCamEvent) {
        match event {
            PopupCamEvent::CameraAvailability {
                camera_id,
                available,
                timestamp,
            } => match self.debouncer.on_availability(&camera_id, available, timestamp) {
                Some(DebounceOutcome::Scheduled {
                    target,
                    generation,
                    delay,
                    superseded,
                }) => {
                    if superseded {
                        debug!(
                            "Camera signal bounced, {:?} replaces {:?}",
                            target,
                            target.opposite()
                        );
                    }
                    debug!("Scheduling {:?} in {:?}", target, delay);
                    self.timers
                        .insert(TimerEvent::Debounce { target, generation }, delay);
                }
                Some(DebounceOutcome::Coalesced) | None => {}
            },
            PopupCamEvent::ProximityInit { near, .. } => self.proximity.init(near),
            PopupCamEvent::ProximityChanged { near, .. } => {
                if let Some(PendingIntent::OpenWhenClear) = self.proximity.update(near) {
                    info!("Camera uncovered, replaying deferred popup");
                    self.request_state(MotorRequest::new(CameraState::Open, Instant::now()))
                        .await;
                }
            }
            PopupCamEvent::FreeFallDetected { timestamp } => {
                if !self.free_fall_armed {
                    debug!("Ignoring free fall while retracted");
                    return;
                }
                warn!("Free fall detected, retracting camera");
                self.request_state(MotorRequest::emergency(CameraState::Closed, timestamp))
                    .await;
                self.return_to_safe_state("free fall").await;
            }
            PopupCamEvent::MotorNotify { code, cookie } => match ActuatorStatus::from_code(code) {
                Ok(status) => self.handle_status(status, cookie).await,
                Err(e) => warn!("Ignoring motor notification (cookie {}): {}", cookie, e),
            },
            _ => {}
        }
    }

    async fn dialog_closed(&mut self, kind: DialogKind, action: DialogAction) {
        debug!("{:?} dialog closed with {:?}", kind, action);
        self.dialogs.release(kind);
        if kind == DialogKind::MotorError && action == DialogAction::Calibrate {
            self.calibrate_motor().await;
        }
    }

    async fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::Debounce { target, generation } => {
                if self.debouncer.fire(target, generation) {
                    self.request_state(MotorRequest::new(target, Instant::now()))
                        .await;
                }
            }
            TimerEvent::BusyPoll => {
                self.poll_armed = false;
                self.drain_requests().await;
            }
            TimerEvent::BusyRelease { generation } => {
                if self.busy.release_if_current(generation) {
                    debug!("Motor settled");
                }
            }
            TimerEvent::IndicatorOff => self.peripherals.indicator.set(false),
        }
    }

    /// Entry point for every producer of motor targets
    pub(crate) async fn request_state(&mut self, request: MotorRequest) {
        if self.peripherals.actuator.is_none() {
            return;
        }
        let must_wait = self.busy.is_busy()
            || (request.priority == RequestPriority::Normal && !self.requests.is_empty());
        if must_wait {
            debug!("Motor busy, queueing {:?}", request.target);
            self.requests.push(request);
            self.arm_poll();
            return;
        }
        self.execute(request).await;
    }

    fn arm_poll(&mut self) {
        if !self.poll_armed {
            self.timers
                .insert(TimerEvent::BusyPoll, self.motor_config.busy_poll());
            self.poll_armed = true;
        }
    }

    async fn drain_requests(&mut self) {
        if let Some(timeout) = self.motor_config.busy_wait_timeout() {
            for request in self.requests.drain_expired(Instant::now(), timeout) {
                warn!(
                    "Dropping {:?} request after waiting {:?} for the motor",
                    request.target, timeout
                );
            }
        }

        while !self.busy.is_busy() {
            match self.requests.pop() {
                Some(request) => self.execute(request).await,
                None => break,
            }
        }

        if !self.requests.is_empty() {
            self.arm_poll();
        }
    }

    async fn execute(&mut self, request: MotorRequest) {
        let Some(actuator) = self.peripherals.actuator.clone() else {
            return;
        };
        self.last_target = Some(request.target);
        let generation = self.busy.acquire();

        let status = match actuator.status().await {
            Ok(status) => status,
            Err(e) => {
                log_driver_error("read motor status", &e);
                self.busy.release();
                return;
            }
        };
        debug!("Update motor: target={:?} status={:?}", request.target, status);

        match decide(
            request.target,
            status,
            self.jams.is_calibrating(),
            self.proximity.is_near(),
        ) {
            Decision::ReportCalibrating => {
                self.busy.release();
                self.return_to_safe_state("calibration running").await;
                self.try_show(Dialog::calibration(None)).await;
            }
            Decision::Popup => {
                self.jams.reset(Direction::Takeback);
                self.issue(MotorCommand::Popup, generation).await;
            }
            Decision::DeferPopup => {
                self.jams.reset(Direction::Takeback);
                self.busy.release();
                self.proximity.defer_open();
                info!("Camera covered, deferring popup");
                self.publish(PopupCamEvent::OpenDeferred {
                    timestamp: Instant::now(),
                })
                .await;
            }
            Decision::Takeback => {
                self.jams.reset(Direction::Popup);
                self.issue(MotorCommand::Takeback, generation).await;
            }
            Decision::Reject { error } => {
                self.busy.release();
                if error {
                    self.handle_error().await;
                } else {
                    debug!("Motor already at {:?}, nothing to do", request.target);
                }
            }
        }
    }

    /// Send popup/takeback and arm everything that follows a real motion
    async fn issue(&mut self, command: MotorCommand, generation: u64) {
        let Some(actuator) = self.peripherals.actuator.clone() else {
            return;
        };
        let cookie = self.next_cookie();
        self.pulse_indicator();

        let result = match command {
            MotorCommand::Popup => actuator.popup(cookie).await,
            _ => actuator.takeback(cookie).await,
        };

        match result {
            Ok(()) => {
                info!("Motor {:?} issued (cookie {})", command, cookie);
                self.set_free_fall_listener(command == MotorCommand::Popup);
                self.publish(PopupCamEvent::MotorCommandIssued { command, cookie })
                    .await;
                if self.throttle.record(Instant::now()) {
                    warn!("Popup camera operated too frequently");
                    self.try_show(Dialog::frequent_operation(
                        self.throttle_config.dialog_cooldown(),
                    ))
                    .await;
                }
            }
            Err(e) => log_driver_error(&format!("issue {:?}", command), &e),
        }

        self.timers.insert(
            TimerEvent::BusyRelease { generation },
            self.motor_config.busy_settle(),
        );
    }

    async fn handle_status(&mut self, status: ActuatorStatus, cookie: u32) {
        debug!("Motor notify: cookie={} status={:?}", cookie, status);
        match status {
            ActuatorStatus::CalibrationOk | ActuatorStatus::CalibrationError => {
                self.jams.finish_calibration();
                self.try_show(Dialog::calibration(Some(status))).await;
            }
            ActuatorStatus::Pressed => {
                info!("Camera pressed, forcing takeback");
                self.request_state(MotorRequest::new(CameraState::Closed, Instant::now()))
                    .await;
                self.return_to_safe_state("camera pressed").await;
            }
            ActuatorStatus::PoppedJammed | ActuatorStatus::RetractedJammed => {
                self.handle_error().await;
            }
            _ => {}
        }
    }

    /// Jam / calibration-needed path. Only one error dialog is ever on screen.
    async fn handle_error(&mut self) {
        if !self.dialogs.try_acquire(DialogKind::MotorError) {
            return;
        }
        self.return_to_safe_state("motor error").await;

        let status = match &self.peripherals.actuator {
            Some(actuator) => match actuator.status().await {
                Ok(status) => Some(status),
                Err(e) => {
                    log_driver_error("read motor status on error path", &e);
                    None
                }
            },
            None => None,
        };

        let assessment = self.jams.assess(status);
        if assessment.retry_takeback {
            self.retry_takeback().await;
        }

        self.present(Dialog::motor_error(
            assessment.needs_calibration,
            self.last_target,
        ))
        .await;
    }

    async fn retry_takeback(&mut self) {
        let Some(actuator) = self.peripherals.actuator.clone() else {
            return;
        };
        let generation = self.busy.acquire();
        let cookie = self.next_cookie();
        match actuator.takeback(cookie).await {
            Ok(()) => {
                self.publish(PopupCamEvent::MotorCommandIssued {
                    command: MotorCommand::Takeback,
                    cookie,
                })
                .await;
            }
            Err(e) => log_driver_error("retry takeback", &e),
        }
        self.timers.insert(
            TimerEvent::BusyRelease { generation },
            self.motor_config.busy_settle(),
        );
    }

    /// Start calibration. The outcome arrives later as a motor notification.
    pub(crate) async fn calibrate_motor(&mut self) {
        let Some(actuator) = self.peripherals.actuator.clone() else {
            return;
        };
        if !self.jams.begin_calibration() {
            return;
        }
        match actuator.calibrate().await {
            Ok(()) => {
                self.publish(PopupCamEvent::MotorCommandIssued {
                    command: MotorCommand::Calibrate,
                    cookie: 0,
                })
                .await;
            }
            Err(e) => {
                log_driver_error("start calibration", &e);
                self.jams.finish_calibration();
            }
        }
    }

    async fn try_show(&mut self, dialog: Dialog) -> bool {
        if !self.dialogs.try_acquire(dialog.kind) {
            return false;
        }
        self.present(dialog).await;
        true
    }

    /// Hand a dialog whose slot is already held to the notifier
    async fn present(&self, dialog: Dialog) {
        let kind = dialog.kind;
        self.publish(PopupCamEvent::DialogShown {
            kind,
            message: dialog.message.text().to_string(),
        })
        .await;

        let notifier = Arc::clone(&self.peripherals.notifier);
        let event_bus = Arc::clone(&self.event_bus);
        let results = self.dialog_results.clone();
        tokio::spawn(async move {
            let action = notifier.show(dialog).await;
            if results.send((kind, action)).is_err() {
                debug!("Controller gone, {:?} dialog result dropped", kind);
            }
            let _ = event_bus
                .publish(PopupCamEvent::DialogClosed { kind, action })
                .await;
        });
    }

    async fn return_to_safe_state(&self, reason: &str) {
        self.peripherals.safe_state.return_to_safe_state();
        self.publish(PopupCamEvent::SafeStateRequested {
            reason: reason.to_string(),
        })
        .await;
    }

    fn pulse_indicator(&mut self) {
        self.peripherals.indicator.set(true);
        self.timers
            .insert(TimerEvent::IndicatorOff, self.motor_config.indicator_pulse());
    }

    fn set_free_fall_listener(&mut self, enabled: bool) {
        if self.free_fall_armed != enabled {
            self.peripherals.sensors.set_free_fall_enabled(enabled);
            self.free_fall_armed = enabled;
        }
    }

    fn next_cookie(&mut self) -> u32 {
        self.next_cookie = self.next_cookie.wrapping_add(1);
        self.next_cookie
    }

    async fn publish(&self, event: PopupCamEvent) {
        if let Err(e) = self.event_bus.publish(event).await {
            debug!("No listeners for controller event: {}", e);
        }
    }
}

/// Transient driver failures are expected while the vendor service restarts
fn log_driver_error(context: &str, e: &ActuatorError) {
    if e.is_transient() {
        warn!("Failed to {}: {}", context, e);
    } else {
        error!("Failed to {}: {}", context, e);
    }
}
