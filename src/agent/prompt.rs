//! System prompts and template builders for the shopping assistant.
//!
//! The chat prompt is built per turn from the user's name and the products
//! shown in the previous turn. The decomposer prompt embeds the current
//! category vocabulary so the model can only filter on known categories.

use std::fmt::Write;

/// Behavior rules appended to every chat system prompt.
pub const CHAT_GUIDELINES: &str = r#"BEHAVIOR GUIDELINES:
- Be warm, conversational, and helpful.
- For greetings or small talk, respond naturally, then guide the conversation toward shopping.
- Use the search tool whenever the user is looking for products. Put price, rating, sale and category constraints in the query.
- After showing products, end with: "Want to go further? **Send these product details to your email** or **purchase one right now**. Just let me know!"
- Keep responses concise (3-5 sentences).
- Never invent products, prices, or order numbers. Only describe what the tools returned.

CONTEXT HANDLING:
- For email and purchase actions you MUST pass a valid product SKU taken from search results or the conversation context.
- If a tool reports a failure, tell the user plainly and suggest what to try next."#;

/// System prompt for query decomposition.
pub const DECOMPOSER_SYSTEM_PROMPT: &str = r#"You translate a shopper's request into a product search.

Return a JSON object with two fields:
- "query": the descriptive part of the request, used for similarity search. Leave out prices, ratings, and sale constraints.
- "filter": a list of conditions, each {"attribute": ..., "op": ..., "value": ...}.

Allowed attributes and operators:
- "sale_price" (current price in CAD): "lte", "gte", "lt", "gt" with a number
- "regular_price" (price before discounts, CAD): "lte", "gte", "lt", "gt" with a number
- "rating" (customer rating, 0 to 5): "lte", "gte", "lt", "gt" with a number
- "on_sale": "eq" with true or false
- "category": "in" with a list of category names, or "eq" with one name

Only use category names from the allowed list. If no condition applies, return an empty filter.

## Example

Request: "a cheap gaming monitor under $300 that's on sale"

```json
{"query": "gaming monitor", "filter": [{"attribute": "sale_price", "op": "lte", "value": 300}, {"attribute": "on_sale", "op": "eq", "value": true}, {"attribute": "category", "op": "in", "value": ["Monitors"]}]}
```

Return ONLY the JSON object, no surrounding text."#;

/// A previously shown product referenced by the chat prompt.
#[derive(Debug, Clone, Copy)]
pub struct ShownProduct<'a> {
    /// Product id.
    pub id: &'a str,
    /// Display name, when it could be resolved.
    pub name: Option<&'a str>,
}

/// Builds the chat system prompt for `user_name`.
///
/// With `shown` products, adds a context section telling the model that
/// "it" or "that" refers to the first one.
#[must_use]
pub fn build_chat_prompt(user_name: &str, shown: &[ShownProduct<'_>]) -> String {
    let mut prompt =
        format!("You are a friendly e-commerce shopping assistant chatting with {user_name}.\n");

    if let Some(first) = shown.first() {
        let names: Vec<String> = shown
            .iter()
            .filter_map(|p| p.name.map(|n| format!("{n} (SKU: {})", p.id)))
            .collect();
        let ids: Vec<&str> = shown.iter().map(|p| p.id).collect();
        let _ = write!(
            prompt,
            "\nCONVERSATION CONTEXT:\n\
             Previously shown products: {}\n\
             Product SKUs for reference: {}\n\
             If the user refers to \"it\", \"that\", or \"the product\", use the first SKU: {}\n",
            if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            },
            ids.join(", "),
            first.id
        );
    }

    prompt.push('\n');
    prompt.push_str(CHAT_GUIDELINES);
    prompt
}

/// Builds the decomposer user message.
#[must_use]
pub fn build_decomposer_prompt(text: &str, vocabulary: &[String]) -> String {
    let categories = if vocabulary.is_empty() {
        "(none known; do not filter by category)".to_string()
    } else {
        vocabulary.join(", ")
    };
    format!(
        "<categories>{categories}</categories>\n\n\
         <request>{text}</request>\n\n\
         Decompose the request."
    )
}
