//! System prompts, UI templates and repair feedback text.

use crate::protocol::DELIMITER;
use crate::schema::UiSchema;

/// Starting-point templates, one per common UI shape.
pub const TEMPLATES: [(&str, &str); 4] = [
    ("FORM_EXAMPLE", include_str!("templates/form.json")),
    ("LIST_EXAMPLE", include_str!("templates/list.json")),
    ("CARD_EXAMPLE", include_str!("templates/card.json")),
    ("CONFIRMATION_EXAMPLE", include_str!("templates/confirmation.json")),
];

const AGENT_ROLE: &str = "You are a UI generation assistant. You create any user interface using A2UI declarative JSON.\n\
    You can build forms (contact, signup, survey, settings), lists (todo, shopping, search results, notifications), \
    cards (profile, product, info, stats) and confirmations (success, error, booking, status).\n";

const TEXT_PROMPT: &str = "You are a helpful UI assistant. Your final output MUST be a text response.\n\
    You can describe UI layouts and components, explain how to structure forms, lists, cards and other UI elements, \
    and give guidance on UI/UX practice.\n\
    Keep your responses clear, helpful, and conversational.";

/// Output format rules, shared by the system prompt and repair feedback.
fn format_rules() -> String {
    format!(
        "1. Your response MUST be in two parts, separated by the delimiter `{DELIMITER}`.\n\
         2. The delimiter appears ONCE, immediately before the JSON. Never repeat it after the JSON.\n\
         3. The first part is your conversational text response.\n\
         4. The second part is a single raw JSON array of A2UI messages, with no markdown fences.\n\
         5. The array MUST contain at least a `beginRendering`, a `surfaceUpdate` and a `dataModelUpdate` message, in that order.\n\
         6. Every message contains exactly ONE of `beginRendering`, `surfaceUpdate`, `dataModelUpdate`, `deleteSurface`.\n\
         7. The JSON MUST validate against the A2UI JSON SCHEMA.\n"
    )
}

/// System prompt for UI mode: role, format rules, templates, and schema.
pub fn ui_system_prompt(schema: &UiSchema) -> String {
    let mut prompt = String::with_capacity(32 * 1024);

    prompt.push_str(AGENT_ROLE);
    prompt.push_str("\n## Output format\n");
    prompt.push_str(&format_rules());

    prompt.push_str("\n## Template defaults\n");
    prompt.push_str("- Forms (contact, signup, survey, settings): start with FORM_EXAMPLE\n");
    prompt.push_str("- Lists (todo, shopping, search results, notifications): start with LIST_EXAMPLE\n");
    prompt.push_str("- Cards (profile, product, info, stats): start with CARD_EXAMPLE\n");
    prompt.push_str("- Confirmations (success, error, status updates): start with CONFIRMATION_EXAMPLE\n");

    prompt.push_str("\n## Dynamic UI generation\n");
    prompt.push_str("Templates are starting points, not strict requirements. Modify them to fit the request:\n");
    prompt.push_str("- New fields: add a TextField, DateTimeInput or other component, list it in the parent's \
        `children.explicitList`, add its key to `dataModelUpdate.contents`, and for forms add its path to the \
        submit button's `action.context`.\n");
    prompt.push_str("- List items: populate `dataModelUpdate` with the requested items.\n");
    prompt.push_str("- Layout: Row for horizontal, Column for vertical, List with a template for repeating items.\n");
    prompt.push_str("- Labels and text: update the `literalString` values.\n");

    prompt.push_str("\n## Available components\n");
    prompt.push_str("- Text: text with optional usageHint (h1, h2, h3, h4, h5, caption, body)\n");
    prompt.push_str("- Icon: named icon (accountCircle, add, check, close, delete, edit, error, favorite, help, home, \
        info, locationOn, mail, menu, notifications, person, phone, search, send, settings, share, star, warning, ...)\n");
    prompt.push_str("- Row / Column: layout containers with children\n");
    prompt.push_str("- List: repeating items bound to the data model through a template\n");
    prompt.push_str("- Card: container with a single child\n");
    prompt.push_str("- Divider: visual separator\n");
    prompt.push_str("- Button: interactive button with a child and an action\n");
    prompt.push_str("- TextField: text input (shortText, longText, number, date, obscured)\n");
    prompt.push_str("- DateTimeInput: date and/or time picker\n");

    prompt.push_str("\n## Templates\n");
    for (name, body) in TEMPLATES {
        prompt.push_str(&format!("---BEGIN {name}---\n{}\n---END {name}---\n\n", body.trim()));
    }

    prompt.push_str("---BEGIN A2UI JSON SCHEMA---\n");
    prompt.push_str(schema.message_schema_text());
    prompt.push_str("\n---END A2UI JSON SCHEMA---\n");
    prompt
}

/// System prompt for text-only mode.
pub fn text_system_prompt() -> &'static str {
    TEXT_PROMPT
}

/// Repair instruction after a rejected response. `errors` holds every
/// failure seen so far in the turn, oldest first.
pub fn corrective_instruction(original: &str, errors: &[String]) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str("Your previous response was invalid.\n");
    if !errors.is_empty() {
        prompt.push_str("\n## Problems found so far:\n");
        for (i, error) in errors.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, error));
        }
    }
    prompt.push_str("\n## You MUST follow these rules:\n");
    prompt.push_str(&format_rules());
    prompt.push_str(&format!("\nPlease retry: '{original}'\n"));
    prompt
}

/// Retry instruction after an empty model response.
pub fn no_response_instruction(original: &str) -> String {
    format!("I received no response. Please retry: '{original}'")
}
