//! Built-in conversation starters, used whenever the external generator is
//! unavailable.

pub const COLLEGE_ICEBREAKERS: &[&str] = &[
    "What's your major and what made you choose it? 📚",
    "If you could have any superpower during exams, what would it be? ⚡",
    "What's the most interesting class you've taken this semester? 🤔",
    "Coffee or tea to survive those late-night study sessions? ☕",
    "What's your go-to stress relief activity during finals? 😅",
    "If you could swap lives with any fictional character for a day, who would it be? 🎭",
    "What's your favorite campus spot to hang out? 🏫",
    "What song always gets you hyped up? 🎵",
    "What's the weirdest food combination you actually enjoy? 🍕",
    "If you could only use one app for the rest of college, which would it be? 📱",
    "What's your biggest college achievement so far? 🏆",
    "Dream internship or job - what would it be? 💼",
    "What's something you've learned in college that they don't teach in textbooks? 🎓",
    "If you could design your perfect dorm room, what would it look like? 🏠",
    "What's your favorite late-night snack during study sessions? 🍿",
];

/// Pick a prompt without any network access.
///
/// The same inputs always produce the same prompt. When the two interest
/// lists intersect the prompt mentions a shared interest.
pub fn fallback_icebreaker(a_interests: &[String], b_interests: &[String], seed: &str) -> String {
    let index = stable_index(seed);

    let shared: Vec<&String> = a_interests
        .iter()
        .filter(|i| b_interests.contains(i))
        .collect();

    if !shared.is_empty() {
        let interest = shared[index % shared.len()];
        return format!("I see we both like {interest}! What got you into it?");
    }

    COLLEGE_ICEBREAKERS[index % COLLEGE_ICEBREAKERS.len()].to_string()
}

fn stable_index(seed: &str) -> usize {
    let hash = blake3::hash(seed.as_bytes());
    let mut first = [0u8; 8];
    first.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(first) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let a = list(&["Music"]);
        let b = list(&["Art"]);
        assert_eq!(
            fallback_icebreaker(&a, &b, "call_1_x"),
            fallback_icebreaker(&a, &b, "call_1_x")
        );
        assert!(COLLEGE_ICEBREAKERS.contains(&fallback_icebreaker(&a, &b, "call_1_x").as_str()));
    }

    #[test]
    fn test_shared_interest_prompt() {
        let a = list(&["Music", "Gaming"]);
        let b = list(&["Gaming"]);
        assert_eq!(
            fallback_icebreaker(&a, &b, "anything"),
            "I see we both like Gaming! What got you into it?"
        );
    }
}
