//! Application entry point: a headless demo host for the sense blocks.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Open the program state file (persisted model reference).
//! 5. Build the LUIS client, the model lifecycle and the `language` extension.
//! 6. Build the console speech engines, start the arbiter and its event pump.
//! 7. Build the gesture board and its event pump.
//! 8. Spawn the stdin reader thread.
//! 9. Run the poll loop until `quit` or end of input, then save program state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use sense_blocks::{
    blocks::{
        language::CLASSIFIER_CHANNEL, BlockArgs, BlockKind, Completion, CommandStatus, Extension,
        GestureExtension, LanguageExtension, SpeechExtension,
    },
    classifier::{LuisClient, Recognition},
    config::{AppConfig, AppPaths},
    gesture::{Gesture, GestureBoard, GestureEvent},
    host::{
        hat_key, parse_command, spawn_stdin_reader, ConsoleRecognizer, ConsoleSelector,
        ConsoleSynthesizer, EdgeDetector, HostCommand, USAGE,
    },
    latch::ResultLatch,
    lifecycle::{ConfiguredSelector, ModelLifecycle, ModelSelector, ModelState, StageState, StageStore},
    speech::{RecognitionSynthesisArbiter, VoicePolicy},
};

// ---------------------------------------------------------------------------
// Watched hats
// ---------------------------------------------------------------------------

/// One hat instance the host polls: a block with concrete arguments.
struct WatchedHat {
    extension: usize,
    opcode: String,
    args: BlockArgs,
    key: String,
}

/// Expand every registered hat into instances: one per menu value for menu
/// arguments, one per configured phrase for text arguments.
fn watched_hats(extensions: &[&dyn Extension], phrases: &[String]) -> Vec<WatchedHat> {
    let mut hats = Vec::new();
    for (index, extension) in extensions.iter().enumerate() {
        let info = extension.info();
        for registration in extension.hats() {
            let Some(block) = info.block(&registration.opcode) else {
                continue;
            };
            let Some(arg) = block.args.first() else {
                hats.push(WatchedHat {
                    extension: index,
                    key: hat_key(info.id, &block.opcode, &BlockArgs::new()),
                    opcode: block.opcode.clone(),
                    args: BlockArgs::new(),
                });
                continue;
            };

            let values: Vec<String> = match arg.menu.and_then(|m| info.menus.get(m)) {
                Some(menu) => menu.iter().map(|item| item.value.clone()).collect(),
                None => phrases.to_vec(),
            };
            for value in values {
                let args = BlockArgs::from([(arg.name.to_string(), value)]);
                hats.push(WatchedHat {
                    extension: index,
                    key: hat_key(info.id, &block.opcode, &args),
                    opcode: block.opcode.clone(),
                    args,
                });
            }
        }
    }
    hats
}

// ---------------------------------------------------------------------------
// DemoHost
// ---------------------------------------------------------------------------

const LANGUAGE: usize = 0;
const SPEECH: usize = 1;

/// One command block invocation.  Yielded calls are executed again on
/// every tick until they don't yield.
struct CommandCall {
    extension: usize,
    opcode: &'static str,
    args: BlockArgs,
    label: String,
}

struct DemoHost {
    config: AppConfig,
    lifecycle: ModelLifecycle,
    language: LanguageExtension,
    speech: SpeechExtension,
    gesture: GestureExtension,
    recognizer: ConsoleRecognizer,
    gesture_tx: mpsc::Sender<GestureEvent>,
    selection_answers: Option<mpsc::Sender<String>>,
    edges: EdgeDetector,
    hats: Vec<WatchedHat>,
    hats_built_for: Option<ModelState>,
    running: Vec<(String, Completion)>,
    yielded: Vec<CommandCall>,
    last_recognition: Option<Arc<Recognition>>,
    last_speech: String,
}

impl DemoHost {
    /// Ordered as [`LANGUAGE`], [`SPEECH`], gesture.
    fn extensions(&self) -> [&dyn Extension; 3] {
        [&self.language, &self.speech, &self.gesture]
    }

    /// Route one input line.  Returns `false` on `quit`.
    async fn handle_line(&mut self, line: String) -> bool {
        if self.lifecycle.state() == ModelState::Selecting {
            if let Some(answers) = &self.selection_answers {
                let _ = answers.send(line).await;
                return true;
            }
        }

        match parse_command(&line) {
            None => true,
            Some(Err(message)) => {
                println!("{message}");
                true
            }
            Some(Ok(command)) => self.apply(command),
        }
    }

    fn apply(&mut self, command: HostCommand) -> bool {
        match command {
            HostCommand::Hear(text) => {
                if !self.recognizer.hear(&text) {
                    println!("(not listening)");
                }
            }
            HostCommand::Gesture(name) => {
                let class = name
                    .parse::<usize>()
                    .ok()
                    .or_else(|| Gesture::parse(&name).map(Gesture::index));
                match class {
                    Some(gesture_class) => {
                        if let Err(e) = self.gesture_tx.try_send(GestureEvent { gesture_class }) {
                            log::warn!("host: gesture dropped: {e}");
                        }
                    }
                    None => println!("unknown gesture {name:?}"),
                }
            }
            HostCommand::Understand(text) => {
                if self.lifecycle.model_ref().is_none() {
                    println!("(model not ready: {})", self.lifecycle.state());
                }
                self.run_command(CommandCall {
                    extension: LANGUAGE,
                    opcode: "understand",
                    label: format!("understand {text:?}"),
                    args: BlockArgs::from([("SENTENCE".to_string(), text)]),
                });
            }
            HostCommand::Speak(text) => {
                self.run_command(CommandCall {
                    extension: SPEECH,
                    opcode: "speak",
                    label: format!("speak {text:?}"),
                    args: BlockArgs::from([("STRING".to_string(), text)]),
                });
            }
            HostCommand::Voice(name) => {
                let args = BlockArgs::from([("VOICE".to_string(), name)]);
                self.speech.execute("setvoice", &args);
                println!("voice: {}", self.speech.arbiter().voice());
            }
            HostCommand::Status => self.print_status(),
            HostCommand::Reset => {
                if self.lifecycle.reset() {
                    self.edges.clear();
                    println!("program reset");
                } else {
                    println!("cannot reset while the model is {}", self.lifecycle.state());
                }
            }
            HostCommand::Help => println!("{USAGE}"),
            HostCommand::Quit => return false,
        }
        true
    }

    /// Execute `command`, tracking it if it keeps running.  Hands the call
    /// back when it yielded.
    fn execute(&mut self, command: CommandCall) -> Option<CommandCall> {
        let status = self.extensions()[command.extension].execute(command.opcode, &command.args);
        match status {
            CommandStatus::Done => None,
            CommandStatus::Running(completion) => {
                self.running.push((command.label, completion));
                None
            }
            CommandStatus::Yield => Some(command),
        }
    }

    fn run_command(&mut self, command: CommandCall) {
        if let Some(parked) = self.execute(command) {
            log::debug!("host: {} yielded", parked.label);
            self.yielded.push(parked);
        }
    }

    fn print_status(&self) {
        let arbiter = self.speech.arbiter();
        println!("model:     {}", self.lifecycle.state());
        println!("listening: {:?}", arbiter.listening_state());
        println!("voice:     {}", arbiter.voice());
        if let Some(e) = arbiter.last_restart_error() {
            println!("last listening restart error: {e}");
        }
    }

    /// One scheduler tick: evaluate hats and reporters, settle commands.
    fn tick(&mut self) {
        let state = self.lifecycle.state();
        if self.hats_built_for.as_ref() != Some(&state) {
            let hats = watched_hats(&self.extensions(), &self.config.host.hear_phrases);
            self.hats = hats;
            self.hats_built_for = Some(state);
        }

        let values: Vec<bool> = {
            let extensions = self.extensions();
            self.hats
                .iter()
                .map(|hat| extensions[hat.extension].evaluate(&hat.opcode, &hat.args).is_true())
                .collect()
        };
        for (hat, value) in self.hats.iter().zip(values) {
            if self.edges.update(&hat.key, value) {
                println!("▶ {}", hat.key);
            }
        }

        for command in std::mem::take(&mut self.yielded) {
            if let Some(parked) = self.execute(command) {
                self.yielded.push(parked);
            }
        }

        self.report_changes();

        self.running.retain_mut(|(label, completion)| {
            let done = completion.is_done();
            if done {
                println!("✓ {label}");
            }
            !done
        });
    }

    fn report_changes(&mut self) {
        let latest = self.language.latest();
        let changed = match (&latest, &self.last_recognition) {
            (Some(new), Some(old)) => !Arc::ptr_eq(new, old),
            (Some(_), None) => true,
            _ => false,
        };
        if changed {
            if let Some(recognition) = &latest {
                let info = self.language.info();
                let entities: Vec<String> = info
                    .blocks
                    .iter()
                    .filter(|b| b.kind == BlockKind::Reporter)
                    .map(|b| {
                        let value = self.language.evaluate(&b.opcode, &BlockArgs::new());
                        format!("{}={value:?}", b.opcode)
                    })
                    .collect();
                println!(
                    "understood {:?} as {:?} [{}]",
                    recognition.query,
                    recognition.intent(),
                    entities.join(", ")
                );
            }
        }
        self.last_recognition = latest;

        let speech = self.speech.arbiter().latest_speech();
        if speech != self.last_speech {
            println!("heard {speech:?}");
            self.last_speech = speech;
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("sense-blocks starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let paths = AppPaths::new().with_project_file(config.host.project_file.clone());
    rt.block_on(run(config, paths))
}

async fn run(config: AppConfig, paths: AppPaths) -> Result<()> {
    let runtime = tokio::runtime::Handle::current();

    // 4. Program state
    let store = match StageStore::with_file(&paths.project_file) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::warn!(
                "Could not open {} ({e:#}); state will not be saved",
                paths.project_file.display()
            );
            Arc::new(StageStore::in_memory(StageState::default()))
        }
    };

    // 5. Language
    let luis = Arc::new(LuisClient::from_config(&config.classifier));
    let (selector, selection_answers) = if config.lifecycle.interactive {
        let (selector, answers) = ConsoleSelector::new();
        let selector: Arc<dyn ModelSelector> = Arc::new(selector);
        (selector, Some(answers))
    } else {
        let selector: Arc<dyn ModelSelector> =
            Arc::new(ConfiguredSelector::new(config.lifecycle.model_name.clone()));
        (selector, None)
    };
    let lifecycle = ModelLifecycle::new(luis.clone(), selector, store.clone(), runtime.clone());
    let language = LanguageExtension::new(
        luis,
        lifecycle.clone(),
        ResultLatch::new(CLASSIFIER_CHANNEL, runtime.clone()),
    );

    // 6. Speech
    let (speech_tx, speech_rx) = mpsc::channel(64);
    let recognizer = ConsoleRecognizer::new(speech_tx.clone());
    let synthesizer = ConsoleSynthesizer::new(speech_tx, &config.speech, runtime.clone());
    let arbiter = Arc::new(RecognitionSynthesisArbiter::new(
        Box::new(recognizer.clone()),
        Box::new(synthesizer),
        VoicePolicy::from_config(&config.speech),
        config.speech.voice.clone(),
    ));
    if let Err(e) = arbiter.start() {
        log::warn!("Speech recognition unavailable: {e}");
    }
    runtime.spawn(Arc::clone(&arbiter).run(speech_rx));
    let speech = SpeechExtension::new(arbiter, runtime.clone());

    // 7. Gesture
    let (gesture_tx, gesture_rx) = mpsc::channel(64);
    let board = GestureBoard::from_config(&config.gesture);
    runtime.spawn(board.clone().run(gesture_rx));
    log::info!(
        "Gesture remote session {:?} ({}) is simulated from the console",
        config.gesture.session_key,
        config.gesture.service_url
    );
    let gesture = GestureExtension::new(board);

    // 8. Input
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    let _stdin = spawn_stdin_reader(line_tx)?;

    // 9. Poll loop
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(
        1.0 / f64::from(config.host.tick_hz.max(1)),
    ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut host = DemoHost {
        config,
        lifecycle,
        language,
        speech,
        gesture,
        recognizer,
        gesture_tx,
        selection_answers,
        edges: EdgeDetector::new(),
        hats: Vec::new(),
        hats_built_for: None,
        running: Vec::new(),
        yielded: Vec::new(),
        last_recognition: None,
        last_speech: String::new(),
    };
    println!("{USAGE}");

    'poll: loop {
        ticker.tick().await;

        loop {
            match line_rx.try_recv() {
                Ok(line) => {
                    if !host.handle_line(line).await {
                        break 'poll;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break 'poll,
            }
        }

        host.tick();
    }

    if let Err(e) = store.flush() {
        log::warn!("Failed to save program state: {e:#}");
    }
    log::info!("sense-blocks shutting down");
    Ok(())
}
