//! Interactive model selection on the console.
//!
//! The prompt's answers arrive on a channel rather than from stdin directly:
//! the host owns the single stdin reader and routes lines here while the
//! lifecycle is `Selecting`.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::classifier::ModelSummary;
use crate::lifecycle::{ModelSelector, Selection};

pub struct ConsoleSelector {
    answers: Mutex<mpsc::Receiver<String>>,
}

impl ConsoleSelector {
    /// The selector and the sender the host feeds answer lines into.
    pub fn new() -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                answers: Mutex::new(rx),
            },
            tx,
        )
    }
}

/// Interpret one answer line.  `None` means "ask again".
///
/// `new` / `0` / empty create a model, `1..=n` pick a listed model, `cancel`
/// / `c` give up.
pub fn parse_choice(line: &str, available: &[ModelSummary]) -> Option<Selection> {
    match line.trim().to_lowercase().as_str() {
        "" | "0" | "new" => Some(Selection::CreateNew),
        "c" | "cancel" => Some(Selection::Cancel),
        other => {
            let n: usize = other.parse().ok()?;
            available
                .get(n.checked_sub(1)?)
                .map(|m| Selection::Existing(m.model_ref.clone()))
        }
    }
}

fn print_menu(available: &[ModelSummary]) {
    println!("Choose a language model:");
    println!("  0) create a new model");
    for (i, model) in available.iter().enumerate() {
        println!("  {}) {} ({})", i + 1, model.name, model.model_ref);
    }
    println!("  c) cancel");
}

#[async_trait]
impl ModelSelector for ConsoleSelector {
    async fn choose(&self, available: &[ModelSummary]) -> Selection {
        let mut answers = self.answers.lock().await;
        print_menu(available);

        while let Some(line) = answers.recv().await {
            match parse_choice(&line, available) {
                Some(selection) => return selection,
                None => println!("Not a choice: {line:?}"),
            }
        }
        log::warn!("selector: input closed; cancelling selection");
        Selection::Cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ModelRef;

    fn listing() -> Vec<ModelSummary> {
        vec![ModelSummary {
            model_ref: ModelRef::new("adv-1"),
            name: "adventure".into(),
        }]
    }

    #[test]
    fn parses_choices() {
        let models = listing();
        assert_eq!(parse_choice("", &models), Some(Selection::CreateNew));
        assert_eq!(parse_choice(" New ", &models), Some(Selection::CreateNew));
        assert_eq!(
            parse_choice("1", &models),
            Some(Selection::Existing(ModelRef::new("adv-1")))
        );
        assert_eq!(parse_choice("cancel", &models), Some(Selection::Cancel));
        assert_eq!(parse_choice("2", &models), None);
        assert_eq!(parse_choice("maybe", &models), None);
    }

    #[tokio::test]
    async fn reprompts_until_a_valid_answer() {
        let (selector, answers) = ConsoleSelector::new();
        answers.send("7".into()).await.unwrap();
        answers.send("1".into()).await.unwrap();

        assert_eq!(
            selector.choose(&listing()).await,
            Selection::Existing(ModelRef::new("adv-1"))
        );
    }

    #[tokio::test]
    async fn closed_input_cancels() {
        let (selector, answers) = ConsoleSelector::new();
        drop(answers);
        assert_eq!(selector.choose(&listing()).await, Selection::Cancel);
    }
}
