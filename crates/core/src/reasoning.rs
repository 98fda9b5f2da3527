use once_cell::sync::Lazy;
use regex::Regex;

static RE_REASONING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>\n?").expect("static regex is valid"));

// Repeats until nothing matches so reassembled tags (`<th<think></think>ink>`) go too.
pub fn strip_reasoning(text: &str) -> String {
    let mut current = text.to_string();
    while RE_REASONING.is_match(&current) {
        current = RE_REASONING.replace_all(&current, "").into_owned();
    }
    current
}

pub fn contains_reasoning(text: &str) -> bool {
    RE_REASONING.is_match(text)
}
