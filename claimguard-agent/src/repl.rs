//! Interactive shell command parsing

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line
    Empty,
    Exit,
    /// `analyze <claim_id>`
    Analyze(String),
    /// Malformed command with a usage hint
    Usage(&'static str),
    /// Anything else is a free-text question
    Ask(String),
}

const ANALYZE_USAGE: &str = "usage: analyze <claim_id>";

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    let lowered = trimmed.to_lowercase();
    if lowered == "exit" || lowered == "quit" {
        return Command::Exit;
    }

    let mut words = trimmed.split_whitespace();
    if words
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case("analyze"))
    {
        return match words.next() {
            Some(claim_id) => Command::Analyze(claim_id.to_string()),
            None => Command::Usage(ANALYZE_USAGE),
        };
    }

    Command::Ask(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words_case_insensitive() {
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command("  QUIT "), Command::Exit);
    }

    #[test]
    fn test_blank_lines_ignored() {
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("   \t"), Command::Empty);
    }

    #[test]
    fn test_analyze_command() {
        assert_eq!(parse_command("analyze C100000"), Command::Analyze("C100000".to_string()));
        assert_eq!(parse_command("Analyze  C100001 extra"), Command::Analyze("C100001".to_string()));
        assert_eq!(parse_command("analyze"), Command::Usage(ANALYZE_USAGE));
    }

    #[test]
    fn test_free_text_question() {
        assert_eq!(
            parse_command("which providers look suspicious?"),
            Command::Ask("which providers look suspicious?".to_string())
        );
        // Only the first word selects a command
        assert_eq!(
            parse_command("please analyze C100000"),
            Command::Ask("please analyze C100000".to_string())
        );
    }
}
