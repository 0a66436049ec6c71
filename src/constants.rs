//! Configuration constants for the quizroom library
//!
//! This module contains the validation limits and fixed values used
//! throughout the library to keep authored content and participant
//! input within sane boundaries.

/// Quiz-level configuration constants
pub mod quiz {
    /// Number of characters in a room code
    pub const ROOM_CODE_LENGTH: usize = 6;
    /// Number of attempts made to generate an unclaimed room code
    pub const ROOM_CODE_ATTEMPTS: usize = 16;
    /// Maximum length of a quiz title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum number of questions in a single quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
}

/// Question configuration constants
pub mod question {
    /// Maximum length of question text in characters
    pub const MAX_TEXT_LENGTH: usize = 500;
    /// Maximum number of options for a multiple choice question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of a single option label
    pub const MAX_OPTION_LENGTH: usize = 200;
    /// Maximum length of the revealed answer text for descriptive questions
    pub const MAX_REVEAL_LENGTH: usize = 500;
    /// Minimum length of a question timer in seconds
    pub const MIN_TIMER: u64 = 5;
    /// Maximum length of a question timer in seconds
    pub const MAX_TIMER: u64 = 600;
}

/// Participant configuration constants
pub mod participant {
    /// Maximum length of a display name in characters
    pub const MAX_NAME_LENGTH: usize = 50;
    /// Maximum number of participants in a single quiz
    pub const MAX_PARTICIPANT_COUNT: usize = 1000;
}

/// Answer configuration constants
pub mod answer {
    /// Maximum length of a descriptive answer in characters
    pub const MAX_TEXT_LENGTH: usize = 2000;
    /// Response text recorded when a participant navigates away without answering
    pub const ABANDONED_RESPONSE: &str = "navigated away";
}

/// Subscription configuration constants
pub mod watch {
    /// Maximum number of concurrent subscriptions per quiz
    pub const MAX_SUBSCRIPTION_COUNT: usize = 2000;
}
