/// Append `#<display_name>` to outgoing text.
///
/// A trailing hashtag line gets the tag on the same line; otherwise the tag
/// goes on a new line. An empty name leaves the text untouched.
pub fn append_display_name_tag(text: &str, display_name: &str) -> String {
    if display_name.is_empty() {
        return text.to_string();
    }

    let tag = format!("#{display_name}");
    let (head, last) = match text.rfind('\n') {
        Some(i) => (&text[..=i], &text[i + 1..]),
        None => ("", text),
    };

    if last.trim().starts_with('#') {
        format!("{head}{} {tag}", last.trim_end_matches(' '))
    } else {
        format!("{text}\n{tag}")
    }
}

/// `:thumbsup:` → `thumbsup`.
pub fn normalize_emoji(name: &str) -> &str {
    name.trim_matches(':')
}
