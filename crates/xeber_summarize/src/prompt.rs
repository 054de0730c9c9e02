//! Prompt construction for article summarization.

/// Longer articles are cut before prompting; the tail rarely changes the
/// summary and it burns tokens.
pub const MAX_CONTENT_CHARS: usize = 8000;

/// Truncates to at most `max_chars` characters, never splitting a
/// multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Builds the Azerbaijani-language prompt asking for a strict-JSON reply.
pub fn build_prompt(title: &str, content: &str) -> String {
    let content = truncate_chars(content, MAX_CONTENT_CHARS);
    format!(
        r#"Aşağıdakı Azərbaycan dilində olan xəbər məqaləsini təhlil et və nəticəni YALNIZ JSON formatında qaytar.

Başlıq: {title}

Mətn:
{content}

Cavabı bu strukturda qaytar (bütün mətn sahələri Azərbaycan dilində olsun):
{{
  "summary_short": "1-2 cümləlik qısa xülasə",
  "summary_medium": "3-4 cümləlik orta xülasə",
  "summary_long": "ətraflı xülasə, bir abzas",
  "key_points": ["əsas məqam 1", "əsas məqam 2", "əsas məqam 3"],
  "entities": {{
    "people": ["adlar"],
    "organizations": ["təşkilatlar"],
    "locations": ["yerlər"]
  }},
  "topics": ["mövzu1", "mövzu2"],
  "sentiment": "positive | negative | neutral"
}}

JSON-dan kənar heç bir mətn yazma."#
    )
}
