/// Strips a surrounding markdown code fence from a model response, if any.
pub fn extract_json_from_markdown(content: &str) -> &str {
    let trimmed = content.trim();

    if let Some(start_idx) = trimmed.find("```json") {
        let after_fence = &trimmed[start_idx + 7..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    if let Some(start_idx) = trimmed.find("```") {
        let after_fence = &trimmed[start_idx + 3..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json_untouched() {
        assert_eq!(
            extract_json_from_markdown("  {\"dependencies\":[]}\n"),
            "{\"dependencies\":[]}"
        );
    }

    #[test]
    fn test_json_fence() {
        let content = "Here you go:\n```json\n{\"dependencies\":[]}\n```\nDone.";
        assert_eq!(extract_json_from_markdown(content), "{\"dependencies\":[]}");
    }

    #[test]
    fn test_bare_fence() {
        let content = "```\n{\"a\":1}\n```";
        assert_eq!(extract_json_from_markdown(content), "{\"a\":1}");
    }
}
