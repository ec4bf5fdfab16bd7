/// The fixed reference sentences users read aloud for scored practice.
/// Indexed 0-15; the order is part of the client contract.
pub const PRACTICE_PROMPTS: [&str; 16] = [
    "I like to travel around the world",
    "The weather is beautiful today",
    "She sells seashells by the seashore",
    "Practice makes perfect every single day",
    "Could you please repeat that more slowly",
    "My favorite season is autumn because of the colors",
    "Technology has changed the way we communicate",
    "Reading books helps me relax in the evening",
    "The early bird catches the worm",
    "We should protect the environment for future generations",
    "Learning a new language opens many doors",
    "He plays the guitar better than anyone I know",
    "Breakfast is the most important meal of the day",
    "The museum closes at five on weekdays",
    "Success comes to those who work hard",
    "Thank you very much for all your help",
];

pub const PROMPT_COUNT: i64 = PRACTICE_PROMPTS.len() as i64;

pub fn is_valid_prompt_index(index: i64) -> bool {
    (0..PROMPT_COUNT).contains(&index)
}

pub fn prompt_text(index: i64) -> Option<&'static str> {
    if is_valid_prompt_index(index) {
        Some(PRACTICE_PROMPTS[index as usize])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_bounds() {
        assert!(is_valid_prompt_index(0));
        assert!(is_valid_prompt_index(15));
        assert!(!is_valid_prompt_index(16));
        assert!(!is_valid_prompt_index(20));
        assert!(!is_valid_prompt_index(-1));
    }

    #[test]
    fn test_prompt_text_lookup() {
        assert_eq!(prompt_text(0), Some("I like to travel around the world"));
        assert_eq!(prompt_text(20), None);
    }
}
