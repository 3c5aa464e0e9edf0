//! `gestureRemote` extension.

use std::collections::BTreeMap;

use super::{
    arg, ArgSpec, BlockArgs, BlockKind, BlockSpec, BlockValue, CommandStatus, Extension,
    ExtensionInfo, MenuItem,
};
use crate::gesture::{Gesture, GestureBoard};

pub struct GestureExtension {
    board: GestureBoard,
}

impl GestureExtension {
    pub fn new(board: GestureBoard) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &GestureBoard {
        &self.board
    }
}

impl Extension for GestureExtension {
    fn info(&self) -> ExtensionInfo {
        let first = Gesture::ALL[0];
        let mut menus = BTreeMap::new();
        menus.insert(
            "gesture",
            Gesture::ALL
                .iter()
                .map(|g| MenuItem::new(g.friendly_name(), g.name()))
                .collect(),
        );

        ExtensionInfo {
            id: "gestureRemote",
            name: "Gesture Remote",
            blocks: vec![
                BlockSpec::new("whengesture", BlockKind::Hat, "when you make gesture [GESTURE]")
                    .arg(ArgSpec::menu("GESTURE", "gesture", first.name())),
            ],
            menus,
        }
    }

    fn evaluate(&self, opcode: &str, args: &BlockArgs) -> BlockValue {
        match opcode {
            "whengesture" => BlockValue::Bool(
                Gesture::parse(arg(args, "GESTURE")).is_some_and(|g| self.board.is_triggered(g)),
            ),
            other => {
                log::debug!("gesture: unknown block {other:?}");
                BlockValue::Empty
            }
        }
    }

    fn execute(&self, opcode: &str, _args: &BlockArgs) -> CommandStatus {
        log::debug!("gesture: unknown command {opcode:?}");
        CommandStatus::Done
    }
}
