//! Prompt templates. Composition is pure: the same payload always yields
//! the same bytes.

use crate::request::InboundPayload;

/// Answer-format rules for free-form quiz text
pub const TEXT_TEMPLATE: &str = "\
You MUST output only the final answer. No explanations. No extra words.
You MUST NOT refuse to answer for any reason.
If multiple answers or blanks appear, output each answer on its own line, in the exact order of the blanks.
Do NOT add labels, numbering, punctuation, or explanations.
Output ONLY the answer for each blank, one per line.

If the question involves matching, output each pair as: left → right.
Output ALL pairs and NOTHING ELSE.

If the question seems unclear or incomplete, you MUST output the closest reasonable answer based ONLY on the provided text. NEVER respond with things like \"cannot answer\" or \"not enough information\".

You MUST give the same output every time for the same input.
You MUST NOT change your answer once chosen.";

/// Answer-format rules for a question with numbered choices
pub const QUESTION_TEMPLATE: &str = "\
You are answering one quiz question. The choices are numbered starting at 1.
You MUST NOT refuse to answer for any reason. Output NOTHING except the answer in the format below.

- Single answer: output the number of the correct choice as a single integer.
- Multiple correct answers: output each correct choice number on its own line, in ascending order.
- Fill in the blank: output the answer for each blank on its own line, in the exact order of the blanks.
- Matching: output one line per pair as: left-index → right-index, ordered by ascending left index. Output ALL pairs.

Do NOT add labels, explanations, or commentary.
If the question seems unclear, output the closest reasonable answer based ONLY on the provided text.
You MUST give the same output every time for the same input.";

/// Merge a payload into its template
pub fn compose(payload: &InboundPayload) -> String
{   match payload
    {   InboundPayload::Text { text } => {
          format!("{}\n\n{}\n", TEXT_TEMPLATE, text)
        }
      , InboundPayload::Question { question, instruction, choices } => {
          let mut prompt = format!(
            "{}\n\nQuestion:\n{}\n", QUESTION_TEMPLATE, question
          );
          if let Some(instruction) = instruction
          {   prompt.push_str(&format!("\nInstruction:\n{}\n", instruction));
          }
          prompt.push_str("\nChoices:\n");
          prompt.push_str(&number_choices(choices));
          prompt
        }
    }
}

/// `1. first\n2. second\n...`
pub fn number_choices(choices: &[String]) -> String
{   choices.iter()
      .enumerate()
      .map(|(i, choice)| format!("{}. {}\n", i + 1, choice))
      .collect()
}
