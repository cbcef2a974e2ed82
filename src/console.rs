//! Terminal presentation
//!
//! Turns typed commands into `UserIntent`s and renders notifications and the
//! volume meter. Holds no session state of its own.

use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::app::Presenter;
use crate::audio::VolumeSample;
use crate::catalog::SceneCatalog;
use crate::channel::{ConnectionStatus, Speaker};
use crate::session::{Phase, SessionNotification, StartRequest, UserIntent};

const METER_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(UserIntent),
    Scenes,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  scenes                         list scenes and roles
  select <scene>                 pick a scene
  start [scene] <user> <ai>      confirm scene and roles with the server
  toggle                         start or stop the conversation
  back                           return to scene selection
  clear                          clear conversation history
  quit                           exit";

/// Parse one input line
pub fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };

    let command = match (verb, args) {
        ("scenes", []) => Command::Scenes,
        ("help", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("select", [scene]) => Command::Intent(UserIntent::SelectScene(scene.to_string())),
        ("start", [scene, user, ai]) => {
            Command::Intent(UserIntent::RequestStart(StartRequest::new(scene, user, ai)))
        }
        ("start", [user, ai]) => Command::Intent(UserIntent::RequestStart(StartRequest {
            scene: None,
            user_role: Some(user.to_string()),
            ai_role: Some(ai.to_string()),
        })),
        ("start", _) => Command::Intent(UserIntent::RequestStart(StartRequest::default())),
        ("toggle", []) => Command::Intent(UserIntent::ToggleSession),
        ("back", []) => Command::Intent(UserIntent::Reset),
        ("clear", []) => Command::Intent(UserIntent::ClearHistory),
        _ => return Err(format!("unrecognized command '{}', try 'help'", line.trim())),
    };
    Ok(command)
}

/// Japanese label for a role name, falling back to the name itself
pub fn role_label(role: &str) -> &str {
    match role {
        "customer" => "お客様",
        "waiter" => "ウェイター",
        "guest" => "ゲスト",
        "receptionist" => "受付係",
        "passenger" => "乗客",
        "staff" => "スタッフ",
        "clerk" => "店員",
        other => other,
    }
}

pub fn render_scenes(catalog: &SceneCatalog) -> String {
    if catalog.is_empty() {
        return "no scenes loaded".to_string();
    }

    catalog
        .scenes()
        .iter()
        .map(|scene| {
            format!(
                "{} {} ({}): you [{}] / AI [{}]",
                scene.icon,
                scene.name,
                scene.id,
                scene.roles.user.join(", "),
                scene.roles.ai.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Meter bar; the marker changes above 50% and 80%
pub fn render_meter(level: f32) -> String {
    let filled = ((level / 100.0) * METER_WIDTH as f32).round() as usize;
    let filled = filled.min(METER_WIDTH);
    let marker = if level > 80.0 {
        '!'
    } else if level > 50.0 {
        '+'
    } else {
        '#'
    };

    format!(
        "[{}{}] {:>3.0}%",
        marker.to_string().repeat(filled),
        " ".repeat(METER_WIDTH - filled),
        level
    )
}

/// Read commands from stdin until `quit` or end of input
pub async fn read_commands(catalog: SceneCatalog, intents: mpsc::Sender<UserIntent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Intent(intent)) => {
                if intents.send(intent).await.is_err() {
                    break;
                }
            }
            Ok(Command::Scenes) => println!("{}", render_scenes(&catalog)),
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::Quit) => break,
            Err(e) => println!("{}", e),
        }
    }
    debug!("Command input closed");
}

/// Prints to stdout
#[derive(Default)]
pub struct ConsolePresenter {
    meter_visible: bool,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&mut self, text: impl AsRef<str>) {
        if self.meter_visible {
            println!();
            self.meter_visible = false;
        }
        println!("{}", text.as_ref());
    }
}

impl Presenter for ConsolePresenter {
    fn notification(&mut self, notification: &SessionNotification) {
        match notification {
            SessionNotification::PhaseChanged { to, .. } => match to {
                Phase::Active => self.line("セッションを開始しました (session started)"),
                Phase::Stopped => self.line("セッションを停止しました (session stopped)"),
                Phase::Idle => self.line("back to scene selection"),
                Phase::AwaitingConfirmation => self.line("waiting for the server to confirm..."),
                Phase::Confirmed => self.line("ready: type 'toggle' to start talking"),
            },
            SessionNotification::RoleOptions { scene } => {
                let user: Vec<String> = scene
                    .roles
                    .user
                    .iter()
                    .map(|r| format!("{} ({})", r, role_label(r)))
                    .collect();
                let ai: Vec<String> = scene
                    .roles
                    .ai
                    .iter()
                    .map(|r| format!("{} ({})", r, role_label(r)))
                    .collect();
                self.line(format!(
                    "{} {}\n  your role: {}\n  AI role:   {}",
                    scene.icon,
                    scene.name,
                    user.join(", "),
                    ai.join(", ")
                ));
            }
            SessionNotification::SceneConfirmed { scene, roles } => self.line(format!(
                "{} {} | you: {} | AI: {}",
                scene.icon,
                scene.name,
                role_label(&roles.user_role),
                role_label(&roles.ai_role)
            )),
            SessionNotification::ValidationFailed { message } => {
                self.line(format!("error: {}", message))
            }
            SessionNotification::AudioUnavailable {
                message,
                permission_denied,
            } => {
                if *permission_denied {
                    self.line("マイクへのアクセスが拒否されました (microphone access denied)");
                } else {
                    self.line(format!("microphone unavailable: {}", message));
                }
            }
            SessionNotification::ConnectionChanged { state } => {
                let icon = match state.status {
                    ConnectionStatus::Connected => "🟢",
                    ConnectionStatus::Reconnecting => "🟡",
                    ConnectionStatus::Disconnected => "🔴",
                };
                self.line(format!("{} {}", icon, state));
            }
            SessionNotification::ConnectionError { message } => {
                self.line(format!("接続エラーが発生しました: {}", message))
            }
            SessionNotification::TranscriptAppended { message } => {
                let who = match message.speaker {
                    Speaker::User => "You",
                    Speaker::Ai => "AI",
                };
                let mut text = format!(
                    "[{}] {}: {}",
                    message.timestamp.format("%H:%M:%S"),
                    who,
                    message.text
                );
                if let Some(translation) = &message.translation {
                    text.push_str(&format!("\n           {}", translation));
                }
                self.line(text);
            }
            SessionNotification::TranslationUpdated { message } => {
                if let Some(translation) = &message.translation {
                    self.line(format!("           {} ({})", translation, message.text));
                }
            }
            SessionNotification::HistoryCleared => self.line("会話履歴がクリアされました (history cleared)"),
        }
    }

    fn volume(&mut self, sample: VolumeSample) {
        print!("\r{}", render_meter(sample.level));
        let _ = std::io::stdout().flush();
        self.meter_visible = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_start() {
        assert_eq!(
            parse_command("start restaurant customer waiter").unwrap(),
            Command::Intent(UserIntent::RequestStart(StartRequest::new(
                "restaurant",
                "customer",
                "waiter"
            )))
        );
    }

    #[test]
    fn start_without_scene_uses_selection() {
        match parse_command("start guest receptionist").unwrap() {
            Command::Intent(UserIntent::RequestStart(request)) => {
                assert_eq!(request.scene, None);
                assert_eq!(request.user_role.as_deref(), Some("guest"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(parse_command("dance").is_err());
        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn meter_is_bounded() {
        assert_eq!(render_meter(0.0), format!("[{}]   0%", " ".repeat(METER_WIDTH)));
        assert!(render_meter(100.0).starts_with(&format!("[{}]", "!".repeat(METER_WIDTH))));
    }

    #[test]
    fn role_labels() {
        assert_eq!(role_label("waiter"), "ウェイター");
        assert_eq!(role_label("pilot"), "pilot");
    }
}
