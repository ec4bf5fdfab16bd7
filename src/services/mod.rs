pub mod audio_cache;
pub mod history;
pub mod prompt_audio;
pub mod prompts;
pub mod pronunciation;
pub mod providers;
pub mod word_audio;
