pub mod embeds;
pub mod prompt;

pub use self::prompt::ReactionPrompt;
