use colored::Colorize;

pub const NO_TEXT: &str = "[No Text]";
pub const UNKNOWN_SENDER: &str = "[Unknown Sender]";

pub const INITIAL_THREAD_QUESTION: &str = "Choose a group chat to start (enter its ID): ";
pub const SWITCH_THREAD_QUESTION: &str = "Choose another group chat to switch to (enter its ID): ";

pub fn logged_in_line() -> String {
    "Logged in.".green().to_string()
}

pub fn chatting_in_banner(thread_name: &str) -> String {
    format!("{} {}", "You are now chatting in:".cyan(), thread_name.magenta())
}

pub fn message_prompt() -> String {
    format!(
        "{} or type '{}' to switch group chats: ",
        "Type a message".yellow(),
        "switch".yellow()
    )
}

pub fn fatal_line(message: &str) -> String {
    message.red().to_string()
}

pub fn farewell_line() -> String {
    "Terminal closed. Exiting...".magenta().to_string()
}

/// `<thread>: <sender>: <body>`, with an empty body shown as a placeholder.
pub fn inbound_line(thread_name: &str, sender_name: &str, body: Option<&str>) -> String {
    let text = body.filter(|body| !body.is_empty()).unwrap_or(NO_TEXT);
    format!("{}: {}: {}", thread_name.cyan(), sender_name.green(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_line_keeps_segments_in_order() {
        let line = inbound_line("Book Club", "Ada", Some("chapter 3 tonight?"));
        let thread = line.find("Book Club").unwrap();
        let sender = line.find("Ada").unwrap();
        let body = line.find("chapter 3 tonight?").unwrap();
        assert!(thread < sender && sender < body);
    }

    #[test]
    fn empty_or_missing_body_uses_placeholder() {
        assert!(inbound_line("G", "S", Some("")).ends_with(NO_TEXT));
        assert!(inbound_line("G", "S", None).ends_with(NO_TEXT));
    }

    #[test]
    fn banner_names_the_thread() {
        assert!(chatting_in_banner("Weekend Plans").contains("Weekend Plans"));
        assert!(message_prompt().contains("switch"));
    }

    #[test]
    fn fatal_line_keeps_message_text() {
        assert!(fatal_line("Error logging in: refused").contains("Error logging in: refused"));
    }
}
