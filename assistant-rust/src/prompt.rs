use crate::KnowledgeBase;
use commune_sdk::ChatMessage;

/// Persona and answering policy sent as the system message of every chat turn.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a professional virtual assistant with deep knowledge of Vietnamese administrative procedures.
Your task is to answer questions from commune-level civil servants accurately, clearly and concisely, in Vietnamese.
Answer using the knowledge base provided below, reproducing its original wording verbatim wherever possible.
If the question is not covered by the knowledge base, answer from your general understanding of Vietnamese law \
and state explicitly: \"Thông tin này mang tính tham khảo chung\" (this information is for general reference only).";

const KNOWLEDGE_BASE_HEADER: &str = "--- KNOWLEDGE BASE ---";
const KNOWLEDGE_BASE_FOOTER: &str = "-----------------------";

/// The user message of a chat turn: the knowledge base followed by the
/// utterance, quoted as typed.
#[must_use]
pub fn build_user_prompt(knowledge_base: &KnowledgeBase, utterance: &str) -> String {
    format!(
        "{KNOWLEDGE_BASE_HEADER}\n{}\n{KNOWLEDGE_BASE_FOOTER}\nUser question: \"{utterance}\"",
        knowledge_base.text()
    )
}

/// Both messages of a chat request, system instruction first.
#[must_use]
pub fn build_chat_messages(knowledge_base: &KnowledgeBase, utterance: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(build_user_prompt(knowledge_base, utterance)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_sdk::ChatRole;

    #[test]
    fn user_prompt_wraps_knowledge_base_and_quotes_utterance() {
        let kb = KnowledgeBase::from_text("Điều 1. Hồ sơ gồm tờ khai.");
        let prompt = build_user_prompt(&kb, "Hồ sơ gồm gì?");

        assert_eq!(
            prompt,
            "--- KNOWLEDGE BASE ---\nĐiều 1. Hồ sơ gồm tờ khai.\n-----------------------\n\
             User question: \"Hồ sơ gồm gì?\""
        );
    }

    #[test]
    fn utterance_is_inserted_literally() {
        let kb = KnowledgeBase::placeholder();
        let prompt = build_user_prompt(&kb, "{not a template} \"quoted\"");

        assert!(prompt.ends_with("User question: \"{not a template} \"quoted\"\""));
        assert!(prompt.contains(crate::knowledge::NO_KNOWLEDGE_BASE));
    }

    #[test]
    fn chat_messages_are_system_then_user() {
        let kb = KnowledgeBase::from_text("kb");
        let messages = build_chat_messages(&kb, "q");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains("kb"));
    }
}
