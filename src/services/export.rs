use crate::models::{Conversation, Message, Role};

pub fn export_to_markdown(conversation: &Conversation, messages: &[Message]) -> String {
    let mut output = format!("# {}\n\n", conversation.title);
    output.push_str(&format!(
        "> Started: {}\n\n",
        conversation.created_at.format("%Y-%m-%d %H:%M")
    ));

    output.push_str("---\n\n");

    for msg in messages {
        let role_label = match msg.role {
            Role::User => "You",
            Role::Assistant if msg.error => "Assistant (failed)",
            Role::Assistant => "Assistant",
        };
        output.push_str(&format!("### {}\n\n{}\n\n", role_label, msg.content));

        for file in &msg.files {
            output.push_str(&format!(
                "- 📎 {} ({}, {} bytes)\n",
                file.name, file.media_type, file.size
            ));
        }
        if !msg.files.is_empty() {
            output.push('\n');
        }
    }

    output
}
