//! `speech` extension.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::runtime::Handle;

use super::{
    arg, ArgSpec, BlockArgs, BlockKind, BlockSpec, BlockValue, CommandStatus, Completion,
    Extension, ExtensionInfo, MenuItem,
};
use crate::speech::{RecognitionSynthesisArbiter, UtteranceOutcome, DEFAULT_VOICE, RANDOM_VOICE};

pub struct SpeechExtension {
    arbiter: Arc<RecognitionSynthesisArbiter>,
    runtime: Handle,
}

impl SpeechExtension {
    pub fn new(arbiter: Arc<RecognitionSynthesisArbiter>, runtime: Handle) -> Self {
        Self { arbiter, runtime }
    }

    pub fn arbiter(&self) -> &Arc<RecognitionSynthesisArbiter> {
        &self.arbiter
    }

    fn voice_menu(&self) -> Vec<MenuItem> {
        let mut menu = vec![MenuItem::plain(DEFAULT_VOICE)];
        menu.extend(
            self.arbiter
                .available_voices()
                .into_iter()
                .map(|v| MenuItem::plain(v.name)),
        );
        menu.push(MenuItem::plain(RANDOM_VOICE));
        menu
    }
}

impl Extension for SpeechExtension {
    fn info(&self) -> ExtensionInfo {
        let blocks = vec![
            BlockSpec::new("whenihear", BlockKind::Hat, "When I hear [STRING]")
                .arg(ArgSpec::text("STRING", "Hi, Scratch!")),
            BlockSpec::new("speak", BlockKind::Command, "speak [STRING]")
                .arg(ArgSpec::text("STRING", "Hello, how are you?")),
            BlockSpec::new("setvoice", BlockKind::Command, "set voice to [VOICE]")
                .arg(ArgSpec::menu("VOICE", "voice", DEFAULT_VOICE)),
            BlockSpec::new("getlatestspeech", BlockKind::Reporter, "get latest speech"),
        ];

        let mut menus = BTreeMap::new();
        menus.insert("voice", self.voice_menu());

        ExtensionInfo {
            id: "speech",
            name: "Speech",
            blocks,
            menus,
        }
    }

    fn evaluate(&self, opcode: &str, args: &BlockArgs) -> BlockValue {
        match opcode {
            "whenihear" => BlockValue::Bool(self.arbiter.when_i_hear(arg(args, "STRING"))),
            "getlatestspeech" => BlockValue::Text(self.arbiter.latest_speech()),
            other => {
                log::debug!("speech: unknown block {other:?}");
                BlockValue::Empty
            }
        }
    }

    fn execute(&self, opcode: &str, args: &BlockArgs) -> CommandStatus {
        match opcode {
            "speak" => {
                let handle = self.arbiter.speak(arg(args, "STRING"));
                let id = handle.id();
                CommandStatus::Running(Completion::spawn(&self.runtime, async move {
                    match handle.finished().await {
                        UtteranceOutcome::Completed => log::debug!("speech: utterance {id} done"),
                        outcome => log::debug!("speech: utterance {id} ended: {outcome:?}"),
                    }
                }))
            }
            "setvoice" => {
                self.arbiter.set_voice(arg(args, "VOICE"));
                CommandStatus::Done
            }
            other => {
                log::debug!("speech: unknown command {other:?}");
                CommandStatus::Done
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
