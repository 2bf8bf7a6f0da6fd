//! Response aggregation and correctness classification for the results screen.
//!
//! The display never awards points; `numeric_score` only decides which bars of
//! a numbers question are highlighted as scored.

use std::{collections::HashMap, fmt};

use serde::Serialize;

use crate::domain::{QuestionType, ResponseSet};
use crate::protocol::ResultsPayload;
use crate::util::split_tokens;

/// Points scale of the numbers proximity formula.
const NUMERIC_SCALE: f64 = 15.0;

/// Distinct answers in first-seen order with parallel occurrence counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Aggregated {
  pub labels: Vec<String>,
  pub counts: Vec<usize>,
}

pub fn aggregate(responses: &ResponseSet) -> Aggregated {
  let mut index: HashMap<&str, usize> = HashMap::new();
  let mut out = Aggregated::default();
  for answer in responses.answers() {
    match index.get(answer) {
      Some(&i) => out.counts[i] += 1,
      None => {
        index.insert(answer, out.labels.len());
        out.labels.push(answer.to_string());
        out.counts.push(1);
      }
    }
  }
  out
}

/// Case-sensitive exact membership, used by choice-like and ranked questions.
pub fn is_exact_match(answer: &str, correct: &[String]) -> bool {
  correct.iter().any(|c| c == answer)
}

/// Case-insensitive, trimmed equality against any token. No substring matching.
pub fn is_short_answer_match(answer: &str, correct: &[String]) -> bool {
  let answer = answer.trim().to_lowercase();
  correct.iter().any(|c| c.trim().to_lowercase() == answer)
}

/// `max(0, floor((1 - |answer - correct| / |correct|) * 15 * |weight|))`.
///
/// Unparseable numbers, a zero correct value, and non-finite intermediates all score 0.
pub fn numeric_score(answer: &str, correct: &str, weight: f64) -> u32 {
  let (Ok(answer), Ok(correct)) = (answer.trim().parse::<f64>(), correct.trim().parse::<f64>()) else {
    return 0;
  };
  let denominator = correct.abs();
  if denominator == 0.0 || !denominator.is_finite() {
    return 0;
  }
  let raw = ((1.0 - (answer - correct).abs() / denominator) * NUMERIC_SCALE * weight.abs()).floor();
  if raw.is_finite() && raw > 0.0 {
    raw.min(f64::from(u32::MAX)) as u32
  } else {
    0
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
  Pie,
  Bar,
  WordCloud,
}

/// One displayed answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResponseBar {
  pub label: String,
  pub display_label: String,
  pub count: usize,
  pub correct: bool,
  /// Proximity score (numbers) or vote points (ranked answers).
  pub points: Option<u32>,
  /// Word size for the word cloud.
  pub size: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultsView {
  NoResponses,
  Chart {
    question_type: String,
    chart: ChartKind,
    correct_answers: Vec<String>,
    bars: Vec<ResponseBar>,
  },
  UnknownType {
    question_type: String,
  },
}

/// Turn a results payload into display-ready series.
pub fn build_results(payload: &ResultsPayload) -> ResultsView {
  if payload.responses.is_empty() {
    return ResultsView::NoResponses;
  }
  let correct_answers = split_tokens(&payload.answer);
  let Aggregated { labels, counts } = aggregate(&payload.responses);
  let pairs = labels.into_iter().zip(counts);

  let (chart, bars): (ChartKind, Vec<ResponseBar>) = match &payload.question_type {
    QuestionType::MultipleChoice | QuestionType::ThisOrThat | QuestionType::Dropdown => (
      ChartKind::Pie,
      pairs
        .map(|(label, count)| ResponseBar {
          correct: is_exact_match(&label, &correct_answers),
          display_label: label.clone(),
          label,
          count,
          points: None,
          size: None,
        })
        .collect(),
    ),
    QuestionType::Numbers => {
      let target = correct_answers.first().map(String::as_str).unwrap_or_default();
      (
        ChartKind::Bar,
        pairs
          .map(|(label, count)| {
            let score = numeric_score(&label, target, payload.weight);
            ResponseBar {
              correct: score > 0,
              display_label: label.clone(),
              label,
              count,
              points: Some(score),
              size: None,
            }
          })
          .collect(),
      )
    }
    QuestionType::ShortAnswer => (
      ChartKind::WordCloud,
      pairs
        .map(|(label, count)| ResponseBar {
          correct: is_short_answer_match(&label, &correct_answers),
          display_label: label.clone(),
          label,
          count,
          points: None,
          size: Some(10 + count * 10),
        })
        .collect(),
    ),
    QuestionType::RankedAnswer => (
      ChartKind::Bar,
      pairs
        .map(|(label, count)| ResponseBar {
          correct: is_exact_match(&label, &correct_answers),
          display_label: format!("{label} ({count} points)"),
          label,
          count,
          points: Some(u32::try_from(count).unwrap_or(u32::MAX)),
          size: None,
        })
        .collect(),
    ),
    QuestionType::Unknown(tag) => return ResultsView::UnknownType { question_type: tag.clone() },
  };

  ResultsView::Chart {
    question_type: payload.question_type.as_str().to_string(),
    chart,
    correct_answers,
    bars,
  }
}

impl fmt::Display for ResultsView {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NoResponses => writeln!(f, "No responses available."),
      Self::UnknownType { question_type } => writeln!(f, "Unknown question type: {question_type}"),
      Self::Chart { chart, correct_answers, bars, .. } => {
        writeln!(f, "Answer: {}", correct_answers.join(", "))?;
        let kind = match chart {
          ChartKind::Pie => "pie",
          ChartKind::Bar => "bar",
          ChartKind::WordCloud => "word cloud",
        };
        writeln!(f, "({kind})")?;
        for bar in bars {
          let mark = if bar.correct { '✔' } else { '✘' };
          writeln!(f, "  {mark} {} — {}", bar.display_label, bar.count)?;
        }
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn payload(kind: QuestionType, answer: &str, responses: &[(&str, &str)]) -> ResultsPayload {
    ResultsPayload {
      responses: responses.iter().copied().collect(),
      answer: answer.into(),
      question_type: kind,
      weight: 1.0,
    }
  }

  fn bar<'a>(view: &'a ResultsView, label: &str) -> &'a ResponseBar {
    let ResultsView::Chart { bars, .. } = view else { panic!("expected chart, got {view:?}") };
    bars.iter().find(|b| b.label == label).expect("bar present")
  }

  #[test]
  fn aggregate_counts_in_first_seen_order() {
    let set: ResponseSet = [("p1", "B"), ("p2", "A"), ("p3", "B"), ("p4", "C"), ("p5", "B")]
      .into_iter()
      .collect();
    let agg = aggregate(&set);
    assert_eq!(agg.labels, vec!["B", "A", "C"]);
    assert_eq!(agg.counts, vec![3, 1, 1]);
    assert_eq!(agg.counts.iter().sum::<usize>(), set.len());
  }

  #[test]
  fn aggregate_counts_always_sum_to_size() {
    let answers = ["x", "y", "x", "", " x", "y", "z", "x"];
    for n in 0..=answers.len() {
      let set: ResponseSet = answers[..n].iter().enumerate().map(|(i, a)| (format!("p{i}"), *a)).collect();
      let agg = aggregate(&set);
      assert_eq!(agg.counts.iter().sum::<usize>(), n);
      assert_eq!(agg.labels.len(), agg.counts.len());
    }
  }

  #[test]
  fn numeric_score_examples() {
    assert_eq!(numeric_score("50", "50", 1.0), 15);
    assert_eq!(numeric_score("100", "50", 1.0), 0);
    assert_eq!(numeric_score("45", "50", 1.0), 13);
    assert_eq!(numeric_score("45", "50", -2.0), 27);
    assert_eq!(numeric_score("500", "50", 1.0), 0);
  }

  #[test]
  fn numeric_score_guards_degenerate_inputs() {
    assert_eq!(numeric_score("0", "0", 1.0), 0);
    assert_eq!(numeric_score("3", "0", 1.0), 0);
    assert_eq!(numeric_score("abc", "50", 1.0), 0);
    assert_eq!(numeric_score("50", "", 1.0), 0);
    assert_eq!(numeric_score("inf", "50", 1.0), 0);
    assert_eq!(numeric_score("-50", "-50", 1.0), 15);
  }

  #[test]
  fn short_answer_is_exact_after_trim_and_case_fold() {
    let correct = vec!["Paris".to_string()];
    assert!(is_short_answer_match("  paris ", &correct));
    assert!(!is_short_answer_match("Paris, France", &correct));
    assert!(!is_short_answer_match("Pari", &correct));
  }

  #[test]
  fn choice_results_use_case_sensitive_tokens() {
    let view = build_results(&payload(
      QuestionType::MultipleChoice,
      "Red,Blue",
      &[("a", "Red"), ("b", "red"), ("c", "Blue"), ("d", "Green")],
    ));
    assert!(bar(&view, "Red").correct);
    assert!(!bar(&view, "red").correct);
    assert!(bar(&view, "Blue").correct);
    assert!(!bar(&view, "Green").correct);
    assert!(matches!(view, ResultsView::Chart { chart: ChartKind::Pie, .. }));
  }

  #[test]
  fn numbers_results_mark_scored_bars() {
    let view = build_results(&payload(QuestionType::Numbers, "50", &[("a", "50"), ("b", "100"), ("c", "50")]));
    let exact = bar(&view, "50");
    assert!(exact.correct);
    assert_eq!(exact.points, Some(15));
    assert_eq!(exact.count, 2);
    assert!(!bar(&view, "100").correct);
  }

  #[test]
  fn short_answer_results_are_a_word_cloud() {
    let view = build_results(&payload(
      QuestionType::ShortAnswer,
      "Paris",
      &[("a", "  paris "), ("b", "Paris, France"), ("c", "  paris ")],
    ));
    let hit = bar(&view, "  paris ");
    assert!(hit.correct);
    assert_eq!(hit.size, Some(30));
    assert!(!bar(&view, "Paris, France").correct);
  }

  #[test]
  fn ranked_results_annotate_points() {
    let view = build_results(&payload(QuestionType::RankedAnswer, "Tea", &[("a", "Tea"), ("b", "Tea"), ("c", "Coffee")]));
    let tea = bar(&view, "Tea");
    assert_eq!(tea.display_label, "Tea (2 points)");
    assert!(tea.correct);
    assert_eq!(bar(&view, "Coffee").display_label, "Coffee (1 points)");
  }

  #[test]
  fn empty_and_unknown_render_visibly() {
    let empty = build_results(&payload(QuestionType::Numbers, "5", &[]));
    assert_eq!(empty, ResultsView::NoResponses);
    assert_eq!(empty.to_string().trim(), "No responses available.");

    let unknown = build_results(&payload(QuestionType::Unknown("essay".into()), "x", &[("a", "x")]));
    assert_eq!(unknown.to_string().trim(), "Unknown question type: essay");
  }

  #[test]
  fn banner_joins_correct_answers() {
    let view = build_results(&payload(QuestionType::Dropdown, "A,B", &[("a", "A")]));
    assert!(view.to_string().starts_with("Answer: A, B"));
  }
}
