use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

/// A candidate subject proposed by the service.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guess {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Confidence as a percentage in `0.0..=100.0`.
    pub probability: f64,
    pub image_url: String,
}

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// The fixed answer vocabulary of the legacy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, AsRefStr)]
pub enum Reply {
    #[strum(serialize = "Yes")]
    Yes,
    #[strum(serialize = "No")]
    No,
    #[strum(serialize = "Don't know")]
    DontKnow,
    #[strum(serialize = "Probably")]
    Probably,
    #[strum(serialize = "Probably not")]
    ProbablyNot,
}

impl Reply {
    /// Position in [`Reply::labels`], which is also the wire code.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> String {
        self.index().to_string()
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn labels() -> Vec<String> {
        Self::iter().map(|reply| reply.as_ref().to_owned()).collect()
    }
}

/// What the service did with a submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The session continues with this question.
    Question(String),
    /// The service is confident enough to propose a subject.
    AnswerFound(Guess),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reply_codes_follow_label_order() {
        assert_eq!(
            Reply::labels(),
            vec!["Yes", "No", "Don't know", "Probably", "Probably not"]
        );
        assert_eq!(Reply::ProbablyNot.code(), "4");
        assert_eq!(Reply::from_index(2), Some(Reply::DontKnow));
        assert_eq!(Reply::from_index(5), None);
    }
}
