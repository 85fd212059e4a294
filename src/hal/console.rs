//! Host services for running on a plain terminal: dialogs go to the log,
//! answers come from the keyboard handler.

use super::{Indicator, Notifier, SafeStateAction, SensorControl};
use crate::motor::{AckCountdown, Dialog, DialogAction};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Yes/no answer typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAnswer {
    Positive,
    Negative,
}

impl DialogAnswer {
    /// Button this answer presses on `dialog`
    pub fn resolve(self, dialog: &Dialog) -> DialogAction {
        match self {
            DialogAnswer::Positive => dialog
                .actions
                .first()
                .copied()
                .unwrap_or(DialogAction::Acknowledge),
            DialogAnswer::Negative if dialog.offers(DialogAction::Cancel) => DialogAction::Cancel,
            DialogAnswer::Negative => DialogAction::Acknowledge,
        }
    }
}

/// Prints dialogs and waits for the keyboard, or answers them on its own when no keyboard is attached
pub struct ConsoleNotifier {
    answers: Option<Mutex<mpsc::UnboundedReceiver<DialogAnswer>>>,
}

impl ConsoleNotifier {
    pub fn new(answers: Option<mpsc::UnboundedReceiver<DialogAnswer>>) -> Self {
        Self {
            answers: answers.map(Mutex::new),
        }
    }

    async fn run_countdown(&self, countdown: AckCountdown) {
        let start = Instant::now();
        loop {
            let label = countdown.label_at(start.elapsed());
            info!("[dialog] [{}]", label.text);
            if label.enabled {
                break;
            }
            tokio::time::sleep(AckCountdown::TICK).await;
        }
    }

    /// Without a keyboard the safe choice is taken: cancel when offered
    fn default_action(dialog: &Dialog) -> DialogAction {
        DialogAnswer::Negative.resolve(dialog)
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn show(&self, dialog: Dialog) -> DialogAction {
        if let Some(title) = dialog.title {
            info!("[dialog] {}", title);
        }
        info!("[dialog] {}", dialog.message.text());

        if let Some(cooldown) = dialog.ack_cooldown {
            self.run_countdown(AckCountdown::new(cooldown)).await;
        }

        let labels: Vec<&str> = dialog.actions.iter().map(|a| a.label()).collect();
        let action = match &self.answers {
            Some(answers) => {
                info!("[dialog] {} (y/n)", labels.join(" / "));
                match answers.lock().await.recv().await {
                    Some(answer) => answer.resolve(&dialog),
                    None => {
                        warn!("Keyboard closed while a dialog was open");
                        Self::default_action(&dialog)
                    }
                }
            }
            None => Self::default_action(&dialog),
        };
        info!("[dialog] -> {}", action.label());
        action
    }
}

/// Logs safe-state requests; a desktop host has no launcher to return to
#[derive(Debug, Default)]
pub struct LogSafeState;

impl SafeStateAction for LogSafeState {
    fn return_to_safe_state(&self) {
        info!("Returning to home screen");
    }
}

/// Indicator for hosts without LED nodes
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&self, on: bool) {
        debug!("Indicator {}", if on { "on" } else { "off" });
    }
}

#[derive(Debug, Default)]
pub struct LogSensorControl;

impl SensorControl for LogSensorControl {
    fn set_proximity_enabled(&self, enabled: bool) {
        debug!("Proximity sensor listener enabled: {}", enabled);
    }

    fn set_free_fall_enabled(&self, enabled: bool) {
        debug!("Free-fall sensor listener enabled: {}", enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_answers_map_to_offered_actions() {
        let calibrate = Dialog::motor_error(true, None);
        assert_eq!(DialogAnswer::Positive.resolve(&calibrate), DialogAction::Calibrate);
        assert_eq!(DialogAnswer::Negative.resolve(&calibrate), DialogAction::Cancel);

        let plain = Dialog::motor_error(false, None);
        assert_eq!(DialogAnswer::Positive.resolve(&plain), DialogAction::Acknowledge);
        assert_eq!(DialogAnswer::Negative.resolve(&plain), DialogAction::Acknowledge);
    }

    #[tokio::test]
    async fn test_unattended_notifier_cancels() {
        let notifier = ConsoleNotifier::new(None);
        let action = notifier.show(Dialog::motor_error(true, None)).await;
        assert_eq!(action, DialogAction::Cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_holds_acknowledgement() {
        let notifier = ConsoleNotifier::new(None);
        let start = Instant::now();

        let action = notifier
            .show(Dialog::frequent_operation(Duration::from_secs(6)))
            .await;

        assert_eq!(action, DialogAction::Acknowledge);
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_keyboard_answer() {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = ConsoleNotifier::new(Some(rx));
        tx.send(DialogAnswer::Positive).unwrap();

        let action = notifier.show(Dialog::motor_error(true, None)).await;
        assert_eq!(action, DialogAction::Calibrate);
    }
}
