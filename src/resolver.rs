//! Question view resolver: question type → presentation variant.

use std::fmt;

use serde::Serialize;

use crate::domain::{Question, QuestionType};

/// Free-text answers are capped at this many characters.
pub const FREE_TEXT_MAX_LEN: usize = 200;

/// How a question is presented while its timer runs.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum QuestionView {
  ChoiceGrid {
    prompt: String,
    image_url: Option<String>,
    choices: Vec<String>,
  },
  FreeText {
    prompt: String,
    image_url: Option<String>,
    max_len: usize,
  },
  NumericEntry {
    prompt: String,
    image_url: Option<String>,
  },
  SelectPerChoice {
    prompt: String,
    image_url: Option<String>,
    choices: Vec<String>,
  },
  Unknown {
    question_type: String,
  },
}

/// Pick exactly one presentation for `question`. Total over every type tag.
pub fn resolve(question: &Question) -> QuestionView {
  let prompt = question.text.clone();
  let image_url = question.image().map(str::to_string);
  match &question.question_type {
    QuestionType::MultipleChoice | QuestionType::ThisOrThat => QuestionView::ChoiceGrid {
      prompt,
      image_url,
      choices: question.choice_list(),
    },
    QuestionType::ShortAnswer | QuestionType::RankedAnswer => QuestionView::FreeText {
      prompt,
      image_url,
      max_len: FREE_TEXT_MAX_LEN,
    },
    QuestionType::Numbers => QuestionView::NumericEntry { prompt, image_url },
    QuestionType::Dropdown => QuestionView::SelectPerChoice {
      prompt,
      image_url,
      choices: question.choice_list(),
    },
    QuestionType::Unknown(tag) => QuestionView::Unknown { question_type: tag.clone() },
  }
}

fn write_header(f: &mut fmt::Formatter<'_>, prompt: &str, image_url: &Option<String>) -> fmt::Result {
  writeln!(f, "{prompt}")?;
  if let Some(url) = image_url {
    writeln!(f, "[image: {url}]")?;
  }
  Ok(())
}

impl fmt::Display for QuestionView {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ChoiceGrid { prompt, image_url, choices } => {
        write_header(f, prompt, image_url)?;
        for (i, choice) in choices.iter().enumerate() {
          writeln!(f, "  [{}] {choice}", i + 1)?;
        }
        Ok(())
      }
      Self::FreeText { prompt, image_url, max_len } => {
        write_header(f, prompt, image_url)?;
        writeln!(f, "  Type your answer... (up to {max_len} characters)")
      }
      Self::NumericEntry { prompt, image_url } => {
        write_header(f, prompt, image_url)?;
        writeln!(f, "  Enter a number...")
      }
      Self::SelectPerChoice { prompt, image_url, choices } => {
        write_header(f, prompt, image_url)?;
        for choice in choices {
          writeln!(f, "  ( ) {choice}")?;
        }
        Ok(())
      }
      Self::Unknown { question_type } => writeln!(f, "Unknown question type: {question_type}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn q(kind: QuestionType) -> Question {
    Question {
      text: "Pick one".into(),
      image_url: Some("https://img.example/q.png".into()),
      question_type: kind,
      choices: "Cats,Dogs".into(),
      answer: "Cats".into(),
      weight: 1.0,
    }
  }

  #[test]
  fn choice_types_share_the_grid() {
    for kind in [QuestionType::MultipleChoice, QuestionType::ThisOrThat] {
      let view = resolve(&q(kind));
      assert!(matches!(&view, QuestionView::ChoiceGrid { choices, .. } if choices == &["Cats", "Dogs"]));
    }
  }

  #[test]
  fn text_types_share_free_text() {
    for kind in [QuestionType::ShortAnswer, QuestionType::RankedAnswer] {
      assert!(matches!(resolve(&q(kind)), QuestionView::FreeText { max_len: FREE_TEXT_MAX_LEN, .. }));
    }
  }

  #[test]
  fn numbers_and_dropdown() {
    assert!(matches!(resolve(&q(QuestionType::Numbers)), QuestionView::NumericEntry { .. }));
    let view = resolve(&q(QuestionType::Dropdown));
    assert!(matches!(view, QuestionView::SelectPerChoice { .. }));
    let text = view.to_string();
    assert!(text.contains("( ) Cats"));
    assert!(text.contains("[image: https://img.example/q.png]"));
  }

  #[test]
  fn unknown_type_renders_visibly() {
    let view = resolve(&q(QuestionType::Unknown("essay".into())));
    assert_eq!(view.to_string().trim(), "Unknown question type: essay");
  }
}
