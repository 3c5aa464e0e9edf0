//! Host scheduler boundary: block metadata and per-block evaluators.
//!
//! A host loads each [`Extension`], reads its [`ExtensionInfo`] to build the
//! palette, registers its hats (all edge-triggered) and then, on every poll
//! tick, calls [`Extension::evaluate`] for hats and reporters.  Commands go
//! through [`Extension::execute`]; a command that keeps running (speech
//! synthesis) hands back a [`Completion`] the host polls instead of blocking.
//!
//! | Extension       | Hats             | Reporters                  | Commands             |
//! |-----------------|------------------|----------------------------|----------------------|
//! | `language`      | `whenrecognized` | one per model entity       | `understand`         |
//! | `speech`        | `whenihear`      | `getlatestspeech`          | `speak`, `setvoice`  |
//! | `gestureRemote` | `whengesture`    |                            |                      |

pub mod gesture;
pub mod language;
pub mod speech;

pub use gesture::GestureExtension;
pub use language::LanguageExtension;
pub use speech::SpeechExtension;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Command,
    Hat,
    Reporter,
}

/// One block argument.  `menu` names an entry of [`ExtensionInfo::menus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub default: String,
    pub menu: Option<&'static str>,
}

impl ArgSpec {
    pub fn text(name: &'static str, default: impl Into<String>) -> Self {
        Self {
            name,
            default: default.into(),
            menu: None,
        }
    }

    pub fn menu(name: &'static str, menu: &'static str, default: impl Into<String>) -> Self {
        Self {
            name,
            default: default.into(),
            menu: Some(menu),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub opcode: String,
    pub kind: BlockKind,
    /// Palette text; `[NAME]` marks where argument `NAME` goes.
    pub text: String,
    pub args: Vec<ArgSpec>,
}

impl BlockSpec {
    pub fn new(opcode: impl Into<String>, kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            kind,
            text: text.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }
}

/// A menu entry: label shown to the user, value passed to the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub text: String,
    pub value: String,
}

impl MenuItem {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }

    /// Entry whose label is its value.
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            text: value.clone(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub blocks: Vec<BlockSpec>,
    pub menus: BTreeMap<&'static str, Vec<MenuItem>>,
}

impl ExtensionInfo {
    pub fn block(&self, opcode: &str) -> Option<&BlockSpec> {
        self.blocks.iter().find(|b| b.opcode == opcode)
    }
}

/// Hat declaration handed to the host once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HatRegistration {
    pub opcode: String,
    /// Fire on a false→true change only; the host must not keep a script
    /// running while the predicate stays true.
    pub edge_triggered: bool,
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Block arguments by name.
pub type BlockArgs = HashMap<String, String>;

/// Argument `name`, or `""` when the host did not pass it.
pub fn arg<'a>(args: &'a BlockArgs, name: &str) -> &'a str {
    args.get(name).map(String::as_str).unwrap_or("")
}

/// What a hat or reporter evaluated to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockValue {
    Bool(bool),
    Text(String),
    Empty,
}

impl BlockValue {
    /// Hat truthiness; anything but `Bool(true)` is false.
    pub fn is_true(&self) -> bool {
        matches!(self, BlockValue::Bool(true))
    }
}

/// Signals when a still-running command has finished.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<()>,
    done: bool,
}

impl Completion {
    /// Run `work` on `runtime`; the completion fires when it returns.
    pub fn spawn<F>(runtime: &Handle, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        runtime.spawn(async move {
            work.await;
            let _ = tx.send(());
        });
        Self { rx, done: false }
    }

    /// Non-blocking check for the poll loop.
    pub fn is_done(&mut self) -> bool {
        if !self.done {
            self.done = !matches!(self.rx.try_recv(), Err(oneshot::error::TryRecvError::Empty));
        }
        self.done
    }

    pub async fn wait(self) {
        if !self.done {
            let _ = self.rx.await;
        }
    }
}

/// Result of [`Extension::execute`].
#[derive(Debug)]
pub enum CommandStatus {
    Done,
    /// The host yields the script until the completion fires.
    Running(Completion),
    /// Nothing happened yet; the host runs the same command again next tick.
    Yield,
}

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

/// One block package as seen by the host.
///
/// `evaluate` and `execute` are called from the host's poll loop and never
/// block; unknown opcodes evaluate to [`BlockValue::Empty`].
pub trait Extension: Send + Sync {
    fn info(&self) -> ExtensionInfo;

    /// Every hat of [`info`](Self::info), edge-triggered.
    fn hats(&self) -> Vec<HatRegistration> {
        self.info()
            .blocks
            .into_iter()
            .filter(|b| b.kind == BlockKind::Hat)
            .map(|b| HatRegistration {
                opcode: b.opcode,
                edge_triggered: true,
            })
            .collect()
    }

    /// Evaluate a hat or reporter.
    fn evaluate(&self, opcode: &str, args: &BlockArgs) -> BlockValue;

    /// Run a command.
    fn execute(&self, opcode: &str, args: &BlockArgs) -> CommandStatus;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Extension>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
